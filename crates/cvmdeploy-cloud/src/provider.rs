//! Cloud provider contract

use crate::config::{DeployConfig, DomainConfig, PublicIpRef};
use crate::dns::{self, DnsChange, DnsManager};
use crate::error::{CloudError, Result};
use crate::firewall::{self, NsgRule};
use crate::user_data::UserDataFile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Logical unit the persistent data disk is attached at.
///
/// The guest init sequence mounts the data disk from the device path of
/// this LUN. Changing it breaks booting.
pub const DATA_DISK_LUN: u32 = 10;

/// Size of the persistent data disk created for every VM (1 TiB)
pub const DATA_DISK_SIZE_GB: u32 = 1024;

/// Supported providers. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Azure,
    Gcp,
}

impl CloudProvider {
    pub const ALL: [CloudProvider; 2] = [CloudProvider::Azure, CloudProvider::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "azure" => Ok(CloudProvider::Azure),
            "gcp" => Ok(CloudProvider::Gcp),
            other => Err(CloudError::Validation(format!(
                "Unknown cloud provider: {} (expected azure or gcp)",
                other
            ))),
        }
    }
}

/// Persistent data disk to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDisk {
    pub resource_group: String,
    pub name: String,
    pub location: String,
    pub size_gb: u32,
}

/// Arguments for booting the VM
#[derive(Debug, Clone, Copy)]
pub struct CreateVm<'a> {
    pub config: &'a DeployConfig,
    pub image_path: &'a Path,
    pub ip: &'a PublicIpRef,
    pub boot_disk: &'a str,
    /// Set only for providers that attach the data disk at creation time
    pub data_disk: Option<&'a str>,
}

/// Provider abstraction
///
/// Azure and GCP implement this trait. Everything above the provider crates
/// depends only on it.
#[async_trait]
pub trait CloudApi: Send + Sync {
    fn provider(&self) -> CloudProvider;

    /// The DNS backend this provider delegates record management to
    fn dns(&self) -> &dyn DnsManager;

    /// Fail fast when CLIs or credentials are missing. Call before anything else.
    async fn check_dependencies(&self) -> Result<()>;

    // ========== Resource groups ==========

    async fn resource_group_exists(&self, name: &str) -> Result<bool>;

    async fn create_resource_group(&self, name: &str, location: &str) -> Result<()>;

    /// Create the group unless it exists. Providers that cannot create
    /// groups override this to warn instead.
    async fn ensure_created_resource_group(&self, name: &str, location: &str) -> Result<()> {
        if self.resource_group_exists(name).await? {
            tracing::info!("Resource group {} already exists", name);
            return Ok(());
        }
        tracing::info!("Creating resource group {} in {}", name, location);
        self.create_resource_group(name, location).await
    }

    // ========== Public IPs ==========

    async fn create_public_ip(&self, name: &str, resource_group: &str, region: &str)
    -> Result<String>;

    /// `None` when no IP resource with this name exists
    async fn get_existing_public_ip(&self, name: &str, resource_group: &str)
    -> Result<Option<String>>;

    // ========== DNS (delegated) ==========

    async fn get_existing_dns_ips(&self, domain: &DomainConfig) -> Result<Vec<String>> {
        self.dns().get_a_records(domain).await
    }

    async fn remove_dns_ip(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        self.dns().remove_a_record(domain, ip_address).await
    }

    async fn add_dns_ip(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        self.dns().add_a_record(domain, ip_address).await
    }

    async fn update_dns_record(
        &self,
        domain: &DomainConfig,
        ip_address: &str,
        remove_old: bool,
    ) -> Result<DnsChange> {
        dns::converge_a_record(self.dns(), domain, ip_address, remove_old).await
    }

    // ========== Boot disk ==========

    async fn disk_exists(&self, config: &DeployConfig, image_path: &Path) -> Result<bool>;

    /// Create the boot disk for `image_path` and return its name
    async fn create_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<String>;

    /// Write access URI for uploading into a disk
    async fn grant_disk_access(&self, config: &DeployConfig, image_path: &Path)
    -> Result<String>;

    async fn copy_disk(&self, image_path: &Path, access_uri: &str, show_logs: bool) -> Result<()>;

    async fn revoke_disk_access(&self, config: &DeployConfig, image_path: &Path) -> Result<()>;

    /// Push the image bytes. A no-op where `create_disk` already uploads.
    async fn upload_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<()>;

    async fn delete_disk(&self, resource_group: &str, disk_name: &str, location: &str)
    -> Result<()>;

    // ========== Firewall ==========

    async fn create_nsg(&self, config: &DeployConfig) -> Result<()>;

    /// Add one rule. An already existing rule is a warning, not an error.
    async fn add_nsg_rule(&self, config: &DeployConfig, rule: &NsgRule) -> Result<()>;

    async fn create_standard_nsg_rules(&self, config: &DeployConfig) -> Result<()> {
        for rule in firewall::standard_rules(&config.source_ip) {
            tracing::info!("Creating {} rule (port {})", rule.name, rule.port);
            self.add_nsg_rule(config, &rule).await?;
        }
        Ok(())
    }

    // ========== Data disk ==========

    async fn create_data_disk(&self, disk: &DataDisk, show_logs: bool) -> Result<()>;

    async fn attach_data_disk(
        &self,
        resource_group: &str,
        vm_name: &str,
        disk_name: &str,
        zone: &str,
        lun: u32,
        show_logs: bool,
    ) -> Result<()>;

    /// Whether the data disk goes into the create call instead of a later attach
    fn attaches_data_disk_at_create(&self) -> bool;

    // ========== VM ==========

    /// Scoped user-data file; deleted when the returned guard drops
    fn create_user_data_file(&self, config: &DeployConfig) -> Result<UserDataFile> {
        UserDataFile::create(config)
    }

    async fn create_vm(&self, request: CreateVm<'_>) -> Result<()>;

    async fn get_vm_ip(&self, vm_name: &str, resource_group: &str, location: &str)
    -> Result<Option<String>>;

    async fn delete_vm(&self, vm_name: &str, resource_group: &str, location: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_and_display() {
        assert_eq!("azure".parse::<CloudProvider>().unwrap(), CloudProvider::Azure);
        assert_eq!("GCP".parse::<CloudProvider>().unwrap(), CloudProvider::Gcp);
        assert!(matches!(
            "ovh".parse::<CloudProvider>(),
            Err(CloudError::Validation(_))
        ));
        assert_eq!(CloudProvider::Gcp.to_string(), "gcp");
    }

    #[test]
    fn test_provider_serde() {
        assert_eq!(
            serde_json::to_string(&CloudProvider::Azure).unwrap(),
            "\"azure\""
        );
        let parsed: CloudProvider = serde_json::from_str("\"gcp\"").unwrap();
        assert_eq!(parsed, CloudProvider::Gcp);
    }

    #[test]
    fn test_data_disk_contract() {
        assert_eq!(DATA_DISK_LUN, 10);
        assert_eq!(DATA_DISK_SIZE_GB, 1024);
    }
}
