//! Filesystem layout under the deployment home

use cvmdeploy_cloud::CloudProvider;
use std::path::{Path, PathBuf};

/// Prefix of artifacts built before provider-specific naming
pub const LEGACY_ARTIFACT_PREFIX: &str = "cvm-image-azure-tdx.rootfs";

/// Paths derived from the deployment home
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    home: PathBuf,
}

impl BuildPaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn seismic_images(&self) -> PathBuf {
        self.home.join("seismic-images")
    }

    /// Directory holding built images
    pub fn artifacts(&self) -> PathBuf {
        self.seismic_images().join("build")
    }

    pub fn deploy_dir(&self) -> PathBuf {
        self.home.join("deploy")
    }

    pub fn deploy_metadata(&self) -> PathBuf {
        self.deploy_dir().join("deploy_metadata.json")
    }

    pub fn proxy_client(&self) -> PathBuf {
        self.home.join("cvm-reverse-proxy/build/proxy-client")
    }

    /// Glob pattern (relative to [`Self::artifacts`]) for a provider's images
    pub fn artifact_pattern(cloud: CloudProvider, dev: bool) -> String {
        let prefix = if dev { "seismic-dev" } else { "seismic" };
        match cloud {
            CloudProvider::Azure => format!("{}-azure-*.vhd", prefix),
            CloudProvider::Gcp => format!("{}-gcp-*.tar.gz", prefix),
        }
    }

    /// Filename used when a timestamp matches no file on disk
    pub fn legacy_artifact(timestamp: &str) -> String {
        format!("{}-{}.wic.vhd", LEGACY_ARTIFACT_PREFIX, timestamp)
    }
}
