use serde::{Deserialize, Serialize};

/// Shared error type for every crate in the workspace.
///
/// `Validation`/`QueueFull`/`NotFound`/`InvalidTool`/`LlmError`/`ToolError`/
/// `Cancelled`/`NotAwaiting`/`Persistence`/`Listener` map 1:1 onto the
/// orchestration error taxonomy; `Io`/`Json`/`Http`/`Config` are the ambient
/// plumbing errors that surround them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("queue full")]
    QueueFull,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),

    #[error("llm error: {0}")]
    LlmError(String),

    #[error("tool error: {0}")]
    ToolError(String),

    #[error("provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    #[error("auth error: {0}")]
    Auth(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("not awaiting clarification")]
    NotAwaiting,

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("listener error: {0}")]
    Listener(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error-taxonomy kind, independent of the human-readable message. Used
/// by the HTTP layer to pick a status code and by tests that want to assert
/// on *which* kind of failure occurred without matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    QueueFull,
    NotFound,
    InvalidTool,
    LlmError,
    ToolError,
    Provider,
    Auth,
    Timeout,
    Cancelled,
    NotAwaiting,
    Persistence,
    Listener,
    Io,
    Json,
    Http,
    Config,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::QueueFull => ErrorKind::QueueFull,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidTool(_) => ErrorKind::InvalidTool,
            Error::LlmError(_) => ErrorKind::LlmError,
            Error::ToolError(_) => ErrorKind::ToolError,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::NotAwaiting => ErrorKind::NotAwaiting,
            Error::Persistence(_) => ErrorKind::Persistence,
            Error::Listener(_) => ErrorKind::Listener,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
            Error::Http(_) => ErrorKind::Http,
            Error::Config(_) => ErrorKind::Config,
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(Error::QueueFull.kind(), ErrorKind::QueueFull);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(Error::NotAwaiting.kind(), ErrorKind::NotAwaiting);
        assert_eq!(
            Error::Validation("bad".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn display_includes_message() {
        let e = Error::NotFound("job abc".into());
        assert_eq!(e.to_string(), "not found: job abc");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Error = io_err.into();
        assert_eq!(e.kind(), ErrorKind::Io);
    }
}
