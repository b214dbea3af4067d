//! Declarative form schemas shared by the HTTP handlers, the templates and the
//! tests.
//!
//! A schema is an ordered list of fields. Each field names its kind, whether a
//! value is required, and an optional validator that runs once the value is
//! present. Validation is pure: anything that needs storage (for example
//! "does this group exist") happens in the application layer afterwards.

use std::collections::BTreeMap;

use imagesize::{ImageError, ImageType};

pub const REQUIRED_MESSAGE: &str = "This field is required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Choice,
    Image,
}

/// A submitted value for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Choice(&'a str),
    Image(&'a [u8]),
}

impl FieldValue<'_> {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Choice(_) => FieldKind::Choice,
            Self::Image(_) => FieldKind::Image,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Text(value) | Self::Choice(value) => value.trim().is_empty(),
            Self::Image(bytes) => bytes.is_empty(),
        }
    }
}

pub type Validator = fn(&FieldValue<'_>) -> Result<(), String>;

#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub validator: Option<Validator>,
}

#[derive(Debug, Clone, Copy)]
pub struct FormSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSchema],
}

pub const POST_FORM: FormSchema = FormSchema {
    name: "post",
    fields: &[
        FieldSchema {
            name: "text",
            label: "Text",
            help_text: "Write the text of the post",
            kind: FieldKind::Text,
            required: true,
            validator: None,
        },
        FieldSchema {
            name: "group",
            label: "Group",
            help_text: "Group the post belongs to",
            kind: FieldKind::Choice,
            required: false,
            validator: Some(validate_choice_id),
        },
        FieldSchema {
            name: "image",
            label: "Image",
            help_text: "Upload an image",
            kind: FieldKind::Image,
            required: false,
            validator: Some(validate_image),
        },
    ],
};

pub const COMMENT_FORM: FormSchema = FormSchema {
    name: "comment",
    fields: &[FieldSchema {
        name: "text",
        label: "Comment",
        help_text: "Write your comment",
        kind: FieldKind::Text,
        required: true,
        validator: None,
    }],
};

/// Field name to error messages, in schema order when rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn for_field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.fields
            .iter()
            .map(|(name, messages)| (*name, messages.as_slice()))
    }
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    /// Validate submitted values. Unknown keys are ignored; blank optional
    /// fields are treated as absent.
    pub fn validate(&self, values: &BTreeMap<&str, FieldValue<'_>>) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();

        for field in self.fields {
            let value = values.get(field.name).filter(|value| !value.is_blank());
            let Some(value) = value else {
                if field.required {
                    errors.add(field.name, REQUIRED_MESSAGE);
                }
                continue;
            };

            if value.kind() != field.kind {
                errors.add(field.name, "Unexpected value for this field.");
                continue;
            }

            if let Some(validator) = field.validator {
                if let Err(message) = validator(value) {
                    errors.add(field.name, message);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_choice_id(value: &FieldValue<'_>) -> Result<(), String> {
    let FieldValue::Choice(raw) = value else {
        return Err("Unexpected value for this field.".to_string());
    };
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(()),
        _ => Err("Select a valid choice.".to_string()),
    }
}

fn validate_image(value: &FieldValue<'_>) -> Result<(), String> {
    let FieldValue::Image(bytes) = value else {
        return Err("Unexpected value for this field.".to_string());
    };

    let invalid = || {
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
            .to_string()
    };

    let kind = imagesize::image_type(bytes).map_err(|_| invalid())?;
    if !matches!(
        kind,
        ImageType::Gif | ImageType::Png | ImageType::Jpeg | ImageType::Webp | ImageType::Bmp
    ) {
        return Err(invalid());
    }

    match imagesize::blob_size(bytes) {
        Ok(size) if size.width > 0 && size.height > 0 => Ok(()),
        Ok(_) | Err(ImageError::CorruptedImage) | Err(ImageError::NotSupported) => Err(invalid()),
        Err(ImageError::IoError(err)) => Err(format!("Failed to read the image: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    fn values<'a>(pairs: &[(&'a str, FieldValue<'a>)]) -> BTreeMap<&'a str, FieldValue<'a>> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn post_form_declares_fields_in_order() {
        let names: Vec<_> = POST_FORM.field_names().collect();
        assert_eq!(names, ["text", "group", "image"]);

        let text = POST_FORM.field("text").expect("text field");
        assert_eq!(text.kind, FieldKind::Text);
        assert!(text.required);

        let group = POST_FORM.field("group").expect("group field");
        assert_eq!(group.kind, FieldKind::Choice);
        assert!(!group.required);

        let image = POST_FORM.field("image").expect("image field");
        assert_eq!(image.kind, FieldKind::Image);
        assert!(!image.required);
    }

    #[test]
    fn comment_form_requires_text() {
        let names: Vec<_> = COMMENT_FORM.field_names().collect();
        assert_eq!(names, ["text"]);

        let errors = COMMENT_FORM
            .validate(&values(&[("text", FieldValue::Text("   "))]))
            .expect_err("blank comment");
        assert_eq!(errors.for_field("text"), [REQUIRED_MESSAGE.to_string()]);
    }

    #[test]
    fn post_form_accepts_text_only() {
        assert!(
            POST_FORM
                .validate(&values(&[("text", FieldValue::Text("hello"))]))
                .is_ok()
        );
    }

    #[test]
    fn blank_optional_choice_is_absent() {
        let input = values(&[
            ("text", FieldValue::Text("hello")),
            ("group", FieldValue::Choice("")),
        ]);
        assert!(POST_FORM.validate(&input).is_ok());
    }

    #[test]
    fn non_numeric_choice_is_rejected() {
        let input = values(&[
            ("text", FieldValue::Text("hello")),
            ("group", FieldValue::Choice("first")),
        ]);
        let errors = POST_FORM.validate(&input).expect_err("invalid choice");
        assert_eq!(errors.for_field("group").len(), 1);
        assert!(errors.for_field("text").is_empty());
    }

    #[test]
    fn gif_upload_is_accepted() {
        let input = values(&[
            ("text", FieldValue::Text("with picture")),
            ("image", FieldValue::Image(SMALL_GIF)),
        ]);
        assert!(POST_FORM.validate(&input).is_ok());
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let input = values(&[
            ("text", FieldValue::Text("with picture")),
            ("image", FieldValue::Image(b"definitely not an image")),
        ]);
        let errors = POST_FORM.validate(&input).expect_err("invalid image");
        assert_eq!(errors.for_field("image").len(), 1);
    }

    #[test]
    fn mismatched_kind_is_reported() {
        let input = values(&[("text", FieldValue::Image(SMALL_GIF))]);
        let errors = POST_FORM.validate(&input).expect_err("wrong kind");
        assert_eq!(errors.for_field("text").len(), 1);
    }
}
