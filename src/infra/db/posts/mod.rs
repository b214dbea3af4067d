mod read;
mod types;
mod write;

/// Columns selected for a joined post row; expects `posts p`, `users u` and
/// `groups g` in the `FROM` clause.
const POST_COLUMNS: &str = "p.id, p.text, p.created_at, p.author_id, u.username AS author_username, \
     p.group_id, g.slug AS group_slug, g.title AS group_title, p.image";
