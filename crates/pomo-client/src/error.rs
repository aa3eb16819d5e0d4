use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unauthenticated: check the token")]
    Unauthenticated,

    #[error(transparent)]
    Store(#[from] pomo_core::PomoError),

    #[error("background task failed: {0}")]
    Join(String),

    #[error("timer driver has stopped")]
    DriverStopped,
}

impl ClientError {
    /// Failures worth retrying unchanged: network trouble, server-side
    /// errors, throttling and transient store errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http(e) => !e.is_decode() && !e.is_builder(),
            ClientError::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            ClientError::Store(e) => e.is_transient(),
            ClientError::Unauthenticated | ClientError::Join(_) | ClientError::DriverStopped => {
                false
            }
        }
    }
}
