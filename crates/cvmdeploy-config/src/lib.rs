//! Paths, defaults and validation for cvmdeploy
//!
//! Everything is resolved from a single home directory that holds the
//! image build tree, the deploy metadata and the proxy client.

pub mod defaults;
pub mod error;
pub mod network;
pub mod paths;

pub use defaults::*;
pub use error::*;
pub use network::detect_public_ip;
pub use paths::{BuildPaths, LEGACY_ARTIFACT_PREFIX};

use std::path::{Path, PathBuf};

/// Overrides the deployment home
pub const HOME_ENV: &str = "CVM_HOME";

/// Default checkout directory under `$HOME`
pub const DEFAULT_CODE_PATH: &str = "";

/// Resolve the deployment home.
///
/// Order: explicit path, then `CVM_HOME`, then `$HOME/<code_path>`.
pub fn resolve_home(explicit: Option<&Path>, code_path: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(home) = std::env::var(HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(if code_path.is_empty() {
        home
    } else {
        home.join(code_path)
    })
}
