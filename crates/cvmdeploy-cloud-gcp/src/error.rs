//! GCP provider error types

use cvmdeploy_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("{0} not found. Please install the Google Cloud SDK")]
    ToolNotFound(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Invalid zone: {0}")]
    InvalidZone(String),

    #[error("Unexpected gcloud output: {0}")]
    InvalidResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl GcpError {
    /// Whether gcloud reported a missing resource
    pub fn is_not_found(&self) -> bool {
        match self {
            GcpError::CommandFailed { stderr, .. } => {
                let stderr = stderr.to_ascii_lowercase();
                stderr.contains("was not found")
                    || stderr.contains("notfound")
                    || stderr.contains("does not exist")
            }
            _ => false,
        }
    }
}

impl From<GcpError> for CloudError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::ToolNotFound(tool) => CloudError::DependencyMissing(format!(
                "'{}' command not found. Please install {}",
                tool, tool
            )),
            GcpError::CommandFailed { command, stderr } => {
                CloudError::CommandFailed { command, stderr }
            }
            GcpError::InvalidZone(zone) => CloudError::Validation(format!("Invalid zone: {}", zone)),
            GcpError::InvalidResponse(msg) => CloudError::OperationFailed(msg),
            GcpError::JsonError(e) => CloudError::Json(e),
            GcpError::IoError(e) => CloudError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = GcpError::CommandFailed {
            command: "gcloud compute disks describe".into(),
            stderr: "ERROR: (gcloud.compute.disks.describe) Could not fetch resource:\n \
                     - The resource 'projects/p/zones/us-central1-a/disks/d' was not found"
                .into(),
        };
        assert!(err.is_not_found());
    }

    #[test]
    fn test_already_exists_survives_conversion() {
        let err: CloudError = GcpError::CommandFailed {
            command: "gcloud compute firewall-rules create".into(),
            stderr: "The resource 'projects/p/global/firewalls/vm-allowssh' already exists".into(),
        }
        .into();
        assert!(err.is_already_exists());
    }
}
