use thiserror::Error;

/// Errors shown to the user. The messages are fixed; the cause behind a
/// `RequestFailed` only ever reaches the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("The AI feature is not available in your browser.")]
    Unavailable,
    #[error("Failed to create session or retrieve response. Please try again.")]
    RequestFailed,
}

/// Failures raised by a text-completion backend.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("could not reach the model server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model server answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("model '{0}' is not installed (try: ollama pull {0})")]
    ModelMissing(String),
    #[error("unexpected response from the model server: {0}")]
    Decode(String),
}

impl From<CapabilityError> for OracleError {
    fn from(_: CapabilityError) -> Self {
        OracleError::RequestFailed
    }
}
