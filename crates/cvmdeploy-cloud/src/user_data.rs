//! Bootstrap parameters handed to the guest at first boot

use crate::config::DeployConfig;
use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Temporary user-data file, removed when dropped
#[derive(Debug)]
pub struct UserDataFile {
    file: NamedTempFile,
    contents: String,
}

impl UserDataFile {
    /// Write `CERTBOT_EMAIL`, `RECORD_NAME` and `DOMAIN` to a fresh temp file
    pub fn create(config: &DeployConfig) -> Result<Self> {
        let contents = render(config);

        let mut file = tempfile::Builder::new()
            .prefix("user-data-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;

        tracing::info!("Created temporary user-data file: {}", file.path().display());
        tracing::debug!("{}", contents);

        Ok(Self { file, contents })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl Drop for UserDataFile {
    fn drop(&mut self) {
        tracing::info!(
            "Deleting temporary user-data file: {}",
            self.file.path().display()
        );
    }
}

fn render(config: &DeployConfig) -> String {
    format!(
        "CERTBOT_EMAIL=\"{}\"\nRECORD_NAME=\"{}\"\nDOMAIN=\"{}\"\n",
        config.email, config.domain.record, config.domain.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainConfig, VmConfig};
    use crate::provider::CloudProvider;

    fn config() -> DeployConfig {
        DeployConfig {
            vm: VmConfig::new(CloudProvider::Azure, "node-1", "eastus", "Standard_DC4es_v6"),
            domain: DomainConfig::new("node-1", "seismictest.net", "yocto-testnet"),
            email: "ops@example.com".to_string(),
            source_ip: "203.0.113.9".to_string(),
            show_logs: false,
        }
    }

    #[test]
    fn test_user_data_contents() {
        let file = UserDataFile::create(&config()).unwrap();
        let on_disk = std::fs::read_to_string(file.path()).unwrap();

        assert_eq!(on_disk, file.contents());
        assert!(on_disk.contains("CERTBOT_EMAIL=\"ops@example.com\"\n"));
        assert!(on_disk.contains("RECORD_NAME=\"node-1\"\n"));
        assert!(on_disk.contains("DOMAIN=\"seismictest.net\"\n"));
    }

    #[test]
    fn test_user_data_removed_on_drop() {
        let file = UserDataFile::create(&config()).unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn test_user_data_removed_on_early_return() {
        fn failing_step(config: &DeployConfig) -> Result<std::path::PathBuf> {
            let file = UserDataFile::create(config)?;
            let path = file.path().to_path_buf();
            Err(crate::CloudError::OperationFailed(path.display().to_string()))
        }

        let err = failing_step(&config()).unwrap_err();
        let crate::CloudError::OperationFailed(path) = err else {
            panic!("unexpected error");
        };
        assert!(!std::path::Path::new(&path).exists());
    }
}
