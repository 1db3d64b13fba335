//! Deployment configuration types shared by every provider

use crate::provider::CloudProvider;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default API port exposed by the guest
pub const DEFAULT_API_PORT: u16 = 7878;

/// Default local port for the reverse-proxy client
pub const DEFAULT_CLIENT_PROXY_PORT: u16 = 8080;

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_client_proxy_port() -> u16 {
    DEFAULT_CLIENT_PROXY_PORT
}

/// Virtual machine configuration
///
/// Serializes to the `vm` object of the deploy metadata. The ports are
/// runtime-only and never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmConfig {
    /// Azure resource group or GCP project
    pub resource_group: String,

    pub name: String,

    pub nsg_name: String,

    pub cloud: CloudProvider,

    /// Azure region or GCP zone
    pub region: String,

    /// Azure VM size or GCP machine type
    pub size: String,

    #[serde(skip, default = "default_api_port")]
    pub api_port: u16,

    #[serde(skip, default = "default_client_proxy_port")]
    pub client_proxy_port: u16,
}

impl VmConfig {
    /// A VM that owns its resource group: name, group and NSG share one string
    pub fn new(
        cloud: CloudProvider,
        resource_group: impl Into<String>,
        region: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        let resource_group = resource_group.into();
        Self {
            name: resource_group.clone(),
            nsg_name: resource_group.clone(),
            resource_group,
            cloud,
            region: region.into(),
            size: size.into(),
            api_port: DEFAULT_API_PORT,
            client_proxy_port: DEFAULT_CLIENT_PROXY_PORT,
        }
    }

    /// Override the VM (and NSG) name while keeping the resource group
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.nsg_name = name.clone();
        self.name = name;
        self
    }

    /// Location used for zonal/regional calls
    pub fn location(&self) -> &str {
        &self.region
    }

    /// Boot disk name for a VM and an artifact filename
    pub fn boot_disk_name(vm_name: &str, artifact: &str) -> String {
        format!("{}_{}", vm_name, artifact)
    }

    /// Boot disk name derived from this VM and an image path
    pub fn disk_name(&self, image_path: &Path) -> String {
        let artifact = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::boot_disk_name(&self.name, &artifact)
    }

    /// Name of the persistent data disk that survives VM recreation
    pub fn data_disk_name(&self) -> String {
        format!("{}-persistent", self.name)
    }
}

/// DNS record configuration
///
/// DNS always lives with the designated DNS provider, whichever cloud
/// hosts the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Record name inside the zone (e.g. `node-1`)
    pub record: String,

    /// DNS zone name (e.g. `seismictest.net`)
    pub name: String,

    /// Resource group holding the DNS zone
    pub resource_group: String,
}

impl DomainConfig {
    pub fn new(
        record: impl Into<String>,
        name: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            record: record.into(),
            name: name.into(),
            resource_group: resource_group.into(),
        }
    }

    /// Fully qualified host name
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.record, self.name)
    }

    pub fn url(&self) -> String {
        format!("https://{}", self.fqdn())
    }

    /// Same zone, different record
    pub fn with_record(&self, record: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            ..self.clone()
        }
    }
}

/// Everything a single deployment needs. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub vm: VmConfig,
    pub domain: DomainConfig,
    /// Certbot contact address
    pub email: String,
    /// Address allowed through the SSH rule
    pub source_ip: String,
    /// Stream provider CLI output instead of capturing it
    pub show_logs: bool,
}

/// A named static public IP and the group/project that holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicIpRef {
    pub name: String,
    pub resource_group: String,
}

impl PublicIpRef {
    pub fn new(name: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
        }
    }
}
