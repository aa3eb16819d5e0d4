use thiserror::Error;

#[derive(Debug, Error)]
pub enum PomoError {
    #[error("not initialized: run 'pomo init'")]
    NotInitialized,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid mode '{0}': expected pomodoro, shortBreak or longBreak")]
    InvalidMode(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task exists but belongs to another owner. Surfaces must report this
    /// exactly like `TaskNotFound`.
    #[error("task not owned by caller: {0}")]
    TaskForbidden(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("unauthorized")]
    Unauthorized,

    /// Storage engine failure. Safe to retry; session writes carry an
    /// idempotency token so a retry never double-inserts.
    #[error("store temporarily unavailable: {0}")]
    TransientStore(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PomoError {
    /// True for failures that a caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, PomoError::TransientStore(_))
    }

    /// True for ownership failures, which callers must not distinguish.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PomoError::TaskNotFound(_) | PomoError::TaskForbidden(_))
    }
}

pub type Result<T> = std::result::Result<T, PomoError>;
