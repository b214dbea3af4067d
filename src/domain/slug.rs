//! Group slugs and usernames.
//!
//! Slugs are derived with the `slug` crate, which transliterates non-ASCII
//! input (Cyrillic titles become readable ASCII) before lowercasing and
//! hyphenating. Explicit slugs supplied by an operator are accepted as-is as
//! long as they stay within `[-a-zA-Z0-9_]`.

use slug::slugify;
use thiserror::Error;

/// Longest slug a group can carry.
pub const MAX_SLUG_LEN: usize = 50;

/// Longest username accepted for a provisioned identity.
pub const MAX_USERNAME_LEN: usize = 150;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain letters, digits, hyphens and underscores")]
    InvalidCharacters { slug: String },
    #[error("slug must be at most {MAX_SLUG_LEN} characters")]
    TooLong,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("username is empty")]
    Empty,
    #[error("username must be at most {MAX_USERNAME_LEN} characters")]
    TooLong,
    #[error("username may only contain letters, digits and @ . + - _")]
    InvalidCharacters,
}

/// Derive a slug from a human-readable group title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    if candidate.len() > MAX_SLUG_LEN {
        candidate.truncate(MAX_SLUG_LEN);
        while candidate.ends_with('-') {
            candidate.pop();
        }
    }

    Ok(candidate)
}

/// Check an explicit slug against the URL-safe alphabet.
pub fn validate_slug(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    if !slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(SlugError::InvalidCharacters {
            slug: slug.to_string(),
        });
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), UsernameError> {
    if username.is_empty() {
        return Err(UsernameError::Empty);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UsernameError::TooLong);
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(UsernameError::InvalidCharacters);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("Rust Lovers Club").unwrap(), "rust-lovers-club");
    }

    #[test]
    fn derive_slug_transliterates_cyrillic() {
        let slug = derive_slug("Лев Толстой").expect("slug");
        assert!(validate_slug(&slug).is_ok(), "derived slug `{slug}` must be url safe");
        assert!(!slug.is_empty());
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_truncates_long_titles() {
        let title = "word ".repeat(40);
        let slug = derive_slug(&title).expect("slug");
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn validate_slug_accepts_url_safe_alphabet() {
        assert!(validate_slug("test_group-1").is_ok());
        assert!(matches!(
            validate_slug("has space"),
            Err(SlugError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_slug("слаг"),
            Err(SlugError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn username_alphabet_matches_identity_rules() {
        assert!(validate_username("leo.tolstoy+war@peace_1-2").is_ok());
        assert_eq!(validate_username(""), Err(UsernameError::Empty));
        assert_eq!(
            validate_username("no/slashes"),
            Err(UsernameError::InvalidCharacters)
        );
        assert_eq!(
            validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)),
            Err(UsernameError::TooLong)
        );
    }
}
