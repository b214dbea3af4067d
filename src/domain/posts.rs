use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::domain::entities::PostRecord;

/// Number of characters a post contributes to its short label.
pub const LABEL_CHARS: usize = 15;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");

/// First [`LABEL_CHARS`] characters of the text, split on character (not byte)
/// boundaries.
pub fn short_label(text: &str) -> &str {
    match text.char_indices().nth(LABEL_CHARS) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

impl PostRecord {
    pub fn label(&self) -> &str {
        short_label(&self.text)
    }
}

/// Render a publication timestamp, e.g. "8 January 2023".
pub fn format_pub_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .date()
        .format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| timestamp.date().to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn label_keeps_first_fifteen_characters() {
        assert_eq!(short_label("Тестовый пост длиннее метки"), "Тестовый пост д");
        assert_eq!(short_label("short"), "short");
    }

    #[test]
    fn label_counts_characters_not_bytes() {
        let label = short_label("ёёёёёёёёёёёёёёёёёёёё");
        assert_eq!(label.chars().count(), LABEL_CHARS);
    }

    #[test]
    fn pub_date_is_human_readable() {
        assert_eq!(
            format_pub_date(datetime!(2023-01-08 17:10 UTC)),
            "8 January 2023"
        );
    }
}
