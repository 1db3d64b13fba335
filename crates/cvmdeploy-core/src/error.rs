use cvmdeploy_cloud::CloudError;
use cvmdeploy_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Example of a pre-2025 artifact filename
pub const OLD_ARTIFACT_EXAMPLE: &str = "cvm-image-azure-tdx.rootfs-20241202202935.wic.vhd";
/// Example of a current artifact filename
pub const NEW_ARTIFACT_EXAMPLE: &str = "seismic-dev-azure-20250110120000.vhd";

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Deploy metadata not found: {0}")]
    MetadataNotFound(PathBuf),

    #[error("Malformed deploy metadata {path}: {source}")]
    MalformedMetadata {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(
        "Invalid artifact name: {0}. Should be like \"{old}\" or \"{new}\"",
        old = OLD_ARTIFACT_EXAMPLE,
        new = NEW_ARTIFACT_EXAMPLE
    )]
    InvalidArtifact(String),

    #[error("VM {0} not found in metadata")]
    VmNotFound(String),

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("Failed to obtain public IP for {0}")]
    NoPublicIp(String),

    #[error("Proxy client failed: {0}")]
    Proxy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
