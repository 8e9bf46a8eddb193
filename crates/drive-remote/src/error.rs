use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not authenticated with the remote drive")]
    NotAuthenticated,
    #[error("remote service returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

impl RemoteError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}
