use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid slug: {0}")]
    InvalidSlug(String),
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("malformed stored field {field}: {message}")]
    MalformedField {
        field: &'static str,
        message: String,
    },
    #[error("item pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl CoreError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::InvalidField {
            field,
            message: message.into(),
        }
    }
}
