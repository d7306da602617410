use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{field}` is invalid: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("`{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn negative(field: &'static str, value: impl Into<i64>) -> Self {
        Self::Negative {
            field,
            value: value.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::Validation { field, .. } | Self::Negative { field, .. } => field,
        }
    }
}
