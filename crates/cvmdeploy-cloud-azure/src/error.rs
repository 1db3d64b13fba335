//! Azure provider error types

use cvmdeploy_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("{0} not found. Please install it and run `az login`")]
    ToolNotFound(String),

    #[error("Azure CLI is not logged in: {0}")]
    NotLoggedIn(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Unexpected Azure CLI output: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AzureError {
    /// Whether the CLI reported a missing resource
    pub fn is_not_found(&self) -> bool {
        match self {
            AzureError::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("resourcenotfound")
                    || stderr.contains("not found")
                    || stderr.contains("could not be found")
            }
            _ => false,
        }
    }
}

impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::ToolNotFound(tool) => CloudError::DependencyMissing(format!(
                "{} not found. Please install it",
                tool
            )),
            AzureError::NotLoggedIn(msg) => CloudError::DependencyMissing(msg),
            AzureError::CommandFailed { command, stderr } => {
                CloudError::CommandFailed { command, stderr }
            }
            AzureError::InvalidResponse(msg) => CloudError::OperationFailed(msg),
            AzureError::JsonError(e) => CloudError::Json(e),
            AzureError::IoError(e) => CloudError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
