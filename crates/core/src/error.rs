/// Result alias that carries the custom [`InterludeError`] type.
pub type Result<T> = std::result::Result<T, InterludeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum InterludeError {
    /// Free-form failure surfaced to the host application.
    #[error("{0}")]
    Message(String),
    /// The experience script failed validation when it was loaded.
    #[error("invalid experience: {0}")]
    InvalidExperience(String),
    /// The submission relay could not deliver the captured data.
    #[error("submission relay failed: {0}")]
    Relay(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl InterludeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidExperience(msg.into())
    }
}

impl From<&str> for InterludeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for InterludeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
