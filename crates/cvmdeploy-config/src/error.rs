use cvmdeploy_cloud::CloudProvider;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Home directory not found. Pass --home or set CVM_HOME")]
    HomeNotFound,

    #[error("Invalid {cloud} region: {region}. Valid {cloud} regions are: {valid}")]
    InvalidRegion {
        cloud: CloudProvider,
        region: String,
        valid: String,
    },

    #[error("Could not determine this machine's public IP ({0}). Pass --source-ip")]
    SourceIpLookup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
