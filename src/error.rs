use std::fmt;
use thiserror::Error;

/// A single violated constraint, qualified by the field it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Caller-facing outcomes of every service operation. All variants except
/// `Store` are recoverable and map 1:1 onto a transport-level signal at the
/// boundary (not-found, forbidden, bad-request).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("forbidden")]
    Forbidden,

    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("you cannot delete your own administrator account")]
    SelfDeletion,

    #[error("storage error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Store(format!("{:#}", err))
    }
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        ServiceError::NotFound { entity, id }
    }

    /// Fields named by a Validation error, in reported order.
    pub fn violated_fields(&self) -> Vec<&'static str> {
        match self {
            ServiceError::Validation(errors) => errors.iter().map(|e| e.field).collect(),
            _ => Vec::new(),
        }
    }
}

fn format_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
