use crate::workflow::OperationKind;

/// Gitum Error Types
#[derive(Debug, thiserror::Error)]
pub enum GitumError {
    /// The backend could not reconcile a step on its own; resolve and continue
    #[error("Conflict during {operation} at step {step}: {}", describe_files(.files))]
    Conflict {
        operation: OperationKind,
        step: usize,
        files: Vec<String>,
    },

    /// A continue/abort request that does not match the recorded operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Missing or corrupt role mapping / operation record
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dirty tree, name collision, lock held and similar refusals
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Version-control failures unrelated to content conflicts
    #[error("Backend error: {0}")]
    Backend(String),

    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GitumError {
    pub fn conflict(operation: OperationKind, step: usize, files: Vec<String>) -> Self {
        GitumError::Conflict {
            operation,
            step,
            files,
        }
    }

    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        GitumError::InvalidState(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        GitumError::Config(msg.into())
    }

    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        GitumError::Precondition(msg.into())
    }

    pub fn backend<S: Into<String>>(msg: S) -> Self {
        GitumError::Backend(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, GitumError::Conflict { .. })
    }

    /// Process exit status for this failure.
    ///
    /// `1` means the workflow is suspended and can be resumed with the
    /// matching `continue_*` verb; `2` is a refusal that left the repository
    /// untouched; `3` is a backend failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            GitumError::Conflict { .. } => 1,
            GitumError::InvalidState(_)
            | GitumError::Config(_)
            | GitumError::Precondition(_) => 2,
            GitumError::Backend(_)
            | GitumError::Git(_)
            | GitumError::Io(_)
            | GitumError::Json(_) => 3,
        }
    }
}

fn describe_files(files: &[String]) -> String {
    if files.is_empty() {
        "unresolved changes".to_string()
    } else {
        files.join(", ")
    }
}

pub type Result<T> = std::result::Result<T, GitumError>;
