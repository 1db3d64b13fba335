//! Cloud provider error types

use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("{operation} is not supported on {provider}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether this error reports a conflict with an existing resource
    pub fn is_already_exists(&self) -> bool {
        match self {
            CloudError::AlreadyExists(_) => true,
            CloudError::CommandFailed { stderr, .. } => {
                stderr.to_ascii_lowercase().contains("already exists")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_detection() {
        assert!(CloudError::AlreadyExists("rule".into()).is_already_exists());

        let conflict = CloudError::CommandFailed {
            command: "gcloud compute firewall-rules create".into(),
            stderr: "ERROR: The resource 'projects/p/global/firewalls/x' already exists".into(),
        };
        assert!(conflict.is_already_exists());

        let denied = CloudError::CommandFailed {
            command: "gcloud compute firewall-rules create".into(),
            stderr: "ERROR: Required 'compute.firewalls.create' permission".into(),
        };
        assert!(!denied.is_already_exists());
        assert!(!CloudError::Timeout("x".into()).is_already_exists());
    }
}
