//! Per-provider defaults and region validation

use crate::error::{ConfigError, Result};
use cvmdeploy_cloud::CloudProvider;

pub const DEFAULT_DOMAIN_NAME: &str = "seismictest.net";
pub const DEFAULT_DOMAIN_RESOURCE_GROUP: &str = "yocto-testnet";
pub const DEFAULT_CERTBOT_EMAIL: &str = "c@seismic.systems";

/// Prefix of genesis IP resources: `genesis-node-{n}`
pub const GENESIS_IP_PREFIX: &str = "genesis-node";

const AZURE_REGIONS: &[&str] = &["eastus", "eastus2", "westeurope", "westus3"];
const GCP_ZONES: &[&str] = &["asia-northeast1-b", "us-central1-a"];

/// Region, resource group and size used when the CLI leaves them out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDefaults {
    /// Azure region or GCP zone
    pub region: &'static str,
    /// Azure resource group or GCP project
    pub resource_group: &'static str,
    pub vm_size: &'static str,
    /// Genesis VM name prefix: `{prefix}-{n}`
    pub genesis_vm_prefix: &'static str,
    /// Genesis DNS record prefix: `{prefix}-{n}`
    pub genesis_record_prefix: &'static str,
}

impl ProviderDefaults {
    pub fn for_provider(cloud: CloudProvider) -> Self {
        match cloud {
            CloudProvider::Azure => Self {
                region: "eastus2",
                resource_group: "tdx-testnet",
                vm_size: "Standard_DC4es_v6",
                genesis_vm_prefix: "yocto-genesis",
                genesis_record_prefix: "node",
            },
            CloudProvider::Gcp => Self {
                region: "us-central1-a",
                resource_group: "testnet-477314",
                vm_size: "c3-standard-4",
                genesis_vm_prefix: "gcp-genesis",
                genesis_record_prefix: "gcp",
            },
        }
    }
}

pub fn valid_regions(cloud: CloudProvider) -> &'static [&'static str] {
    match cloud {
        CloudProvider::Azure => AZURE_REGIONS,
        CloudProvider::Gcp => GCP_ZONES,
    }
}

pub fn validate_region(cloud: CloudProvider, region: &str) -> Result<()> {
    let valid = valid_regions(cloud);
    if valid.contains(&region) {
        return Ok(());
    }
    Err(ConfigError::InvalidRegion {
        cloud,
        region: region.to_string(),
        valid: valid.join(", "),
    })
}
