//! End-to-end deploy flows
//!
//! Both flows run the same sequence: dependencies, resource group, public
//! IP, DNS, then [`Deployer`] and the metadata record. They differ in where
//! the IP comes from. A single VM gets an IP named after itself; a genesis
//! node gets the persistent `genesis-node-{n}` IP from the shared group.

use crate::confirm::Confirm;
use crate::deployer::{DeployOutput, Deployer};
use crate::error::{DeployError, Result};
use crate::genesis::GenesisIpManager;
use cvmdeploy_cloud::{
    CloudApi, CloudProvider, DEFAULT_API_PORT, DeployConfig, DomainConfig, PublicIpRef, VmConfig,
};
use cvmdeploy_config::ProviderDefaults;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Placeholder printed when no SSH public key can be read
pub const SSH_KEY_PLACEHOLDER: &str = "YOUR_SSH_KEY_HERE";

/// Tooling check and the VM's resource group
async fn prepare(api: &dyn CloudApi, config: &DeployConfig) -> Result<()> {
    api.check_dependencies().await?;
    api.ensure_created_resource_group(&config.vm.resource_group, config.vm.location())
        .await?;
    Ok(())
}

/// Converge `{record}` and `metrics.{record}` on `ip`
pub async fn converge_dns(api: &dyn CloudApi, domain: &DomainConfig, ip: &str) -> Result<()> {
    let metrics = domain.with_record(format!("metrics.{}", domain.record));
    api.update_dns_record(&metrics, ip, true).await?;
    api.update_dns_record(domain, ip, true).await?;
    Ok(())
}

/// Deploy one VM with its own static IP
pub async fn deploy_single(
    api: &dyn CloudApi,
    config: &DeployConfig,
    image_path: &Path,
    home: &Path,
) -> Result<DeployOutput> {
    tracing::info!("Starting {} VM deployment of {}", config.vm.cloud, config.vm.name);
    prepare(api, config).await?;

    let ip_ref = PublicIpRef::new(&config.vm.name, &config.vm.resource_group);
    let ip = match api
        .get_existing_public_ip(&ip_ref.name, &ip_ref.resource_group)
        .await?
    {
        Some(ip) => {
            tracing::info!("Reusing public IP {} ({})", ip, ip_ref.name);
            ip
        }
        None => {
            api.create_public_ip(&ip_ref.name, &ip_ref.resource_group, config.vm.location())
                .await?
        }
    };
    converge_dns(api, &config.domain, &ip).await?;

    let deployer = Deployer::new(api, config.clone(), image_path, ip_ref, home);
    let output = deployer.deploy().await?;
    output.update_deploy_metadata().await?;
    tracing::info!("Deployment of {} completed", config.vm.name);
    Ok(output)
}

/// VM configuration for genesis node `node`.
///
/// Azure VMs get a resource group of their own; GCP VMs live in the
/// project given as `resource_group`.
pub fn genesis_vm_config(
    cloud: CloudProvider,
    node: u32,
    resource_group: &str,
    region: &str,
    size: &str,
    name: Option<&str>,
) -> VmConfig {
    let prefix = ProviderDefaults::for_provider(cloud).genesis_vm_prefix;
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-{}", prefix, node));
    match cloud {
        CloudProvider::Azure => VmConfig::new(cloud, name, region, size),
        CloudProvider::Gcp => VmConfig::new(cloud, resource_group, region, size).with_name(name),
    }
}

/// DNS record of genesis node `node`
pub fn genesis_record(cloud: CloudProvider, node: u32) -> String {
    format!("{}-{}", ProviderDefaults::for_provider(cloud).genesis_record_prefix, node)
}

/// One genesis node to deploy
#[derive(Debug, Clone)]
pub struct GenesisRequest {
    pub node: u32,
    pub config: DeployConfig,
    /// Required unless `ip_only`
    pub image_path: Option<PathBuf>,
    /// Group/project holding the `genesis-node-{n}` IPs
    pub ip_resource_group: String,
    /// Reserve the IP and DNS only
    pub ip_only: bool,
    /// Peer IPs; empty makes this the first genesis node
    pub peers: Vec<String>,
    pub home: PathBuf,
}

/// What a genesis run did
#[derive(Debug, Clone)]
pub struct GenesisReport {
    pub node: u32,
    pub ip: String,
    pub ip_name: String,
    pub domain: DomainConfig,
    /// `None` with `--ip-only`
    pub output: Option<DeployOutput>,
}

/// Reserve the node's IP, converge DNS and, unless `ip_only`, deploy
pub async fn deploy_genesis_node(
    api: &dyn CloudApi,
    request: &GenesisRequest,
    confirm: &dyn Confirm,
) -> Result<GenesisReport> {
    let config = &request.config;
    tracing::info!("Deploying genesis node {} ({})", request.node, config.vm.name);

    if request.image_path.is_none() && !request.ip_only {
        return Err(DeployError::MissingArgument("--artifact"));
    }

    prepare(api, config).await?;

    let ips = GenesisIpManager::new(api, &request.ip_resource_group, confirm);
    let (ip, ip_name) = ips
        .get_or_create_node_ip(request.node, config.vm.location())
        .await?;
    converge_dns(api, &config.domain, &ip).await?;

    let mut report = GenesisReport {
        node: request.node,
        ip,
        ip_name,
        domain: config.domain.clone(),
        output: None,
    };

    let Some(image_path) = request.image_path.as_ref().filter(|_| !request.ip_only) else {
        tracing::info!("Not creating machines (--ip-only)");
        return Ok(report);
    };

    let ip_ref = PublicIpRef::new(&report.ip_name, ips.ip_resource_group());
    let deployer = Deployer::new(api, config.clone(), image_path, ip_ref, &request.home);
    let output = deployer.deploy().await?;
    output.update_deploy_metadata().await?;

    if output.public_ip != report.ip {
        tracing::warn!(
            "VM {} reports IP {} but node {} reserved {}",
            config.vm.name,
            output.public_ip,
            request.node,
            report.ip
        );
    }
    tracing::info!("Genesis deployment of node {} completed", request.node);
    report.output = Some(output);
    Ok(report)
}

/// `--genesis-node` for the first node, `--peers http://{ip}:7878 ...` otherwise
pub fn enclave_args(peers: &[String]) -> String {
    if peers.is_empty() {
        return "--genesis-node".to_string();
    }
    let urls: Vec<String> = peers
        .iter()
        .map(|ip| format!("http://{}:{}", ip.trim(), DEFAULT_API_PORT))
        .collect();
    format!("--peers {}", urls.join(" "))
}

/// Key material of an OpenSSH public key line (`type key comment`)
pub fn read_ssh_key(path: &Path) -> String {
    let key = std::fs::read_to_string(path)
        .ok()
        .and_then(|line| line.split_whitespace().nth(1).map(str::to_string));
    match key {
        Some(key) => key,
        None => {
            tracing::warn!("Could not read SSH key from {}", path.display());
            SSH_KEY_PLACEHOLDER.to_string()
        }
    }
}

/// `~/.ssh/id_ed25519.pub`
pub fn default_ssh_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("id_ed25519.pub"))
}

/// Bootstrap document POSTed to a fresh node's config port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenesisPayload {
    pub ssh_keys: Vec<String>,
    pub domain: PayloadDomain,
    pub log: PayloadServices,
    pub args: PayloadServices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadDomain {
    pub email: String,
    pub name: String,
}

/// One value per guest service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadServices {
    pub enclave: String,
    pub summit: String,
    pub reth: String,
}

impl GenesisPayload {
    pub fn new(config: &DeployConfig, ssh_key: impl Into<String>, enclave_args: String) -> Self {
        let debug = || "debug".to_string();
        Self {
            ssh_keys: vec![ssh_key.into()],
            domain: PayloadDomain {
                email: config.email.clone(),
                name: config.domain.fqdn(),
            },
            log: PayloadServices {
                enclave: debug(),
                summit: debug(),
                reth: debug(),
            },
            args: PayloadServices {
                enclave: enclave_args,
                summit: String::new(),
                reth: String::new(),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclave_args() {
        assert_eq!(enclave_args(&[]), "--genesis-node");
        assert_eq!(
            enclave_args(&["10.0.0.1".to_string(), " 10.0.0.2".to_string()]),
            "--peers http://10.0.0.1:7878 http://10.0.0.2:7878"
        );
    }

    #[test]
    fn test_genesis_names() {
        let azure = genesis_vm_config(
            CloudProvider::Azure,
            2,
            "tdx-testnet",
            "eastus2",
            "Standard_DC4es_v6",
            None,
        );
        assert_eq!(azure.name, "yocto-genesis-2");
        assert_eq!(azure.resource_group, "yocto-genesis-2");

        let gcp = genesis_vm_config(
            CloudProvider::Gcp,
            3,
            "testnet-477314",
            "us-central1-a",
            "c3-standard-4",
            None,
        );
        assert_eq!(gcp.name, "gcp-genesis-3");
        assert_eq!(gcp.resource_group, "testnet-477314");

        let named =
            genesis_vm_config(CloudProvider::Gcp, 3, "p", "us-central1-a", "c3-standard-4", Some("custom"));
        assert_eq!(named.name, "custom");

        assert_eq!(genesis_record(CloudProvider::Azure, 4), "node-4");
        assert_eq!(genesis_record(CloudProvider::Gcp, 4), "gcp-4");
    }

    #[test]
    fn test_read_ssh_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_ed25519.pub");
        std::fs::write(&path, "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAA ops@laptop\n").unwrap();
        assert_eq!(read_ssh_key(&path), "AAAAC3NzaC1lZDI1NTE5AAAA");
        assert_eq!(read_ssh_key(&dir.path().join("missing")), SSH_KEY_PLACEHOLDER);
    }

    #[test]
    fn test_payload_json() {
        let config = DeployConfig {
            vm: VmConfig::new(CloudProvider::Azure, "yocto-genesis-1", "eastus2", "Standard_DC4es_v6"),
            domain: DomainConfig::new("node-1", "seismictest.net", "yocto-testnet"),
            email: "c@seismic.systems".to_string(),
            source_ip: "203.0.113.9".to_string(),
            show_logs: false,
        };
        let payload = GenesisPayload::new(&config, "KEY", enclave_args(&[]));
        let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(json["ssh_keys"][0], "KEY");
        assert_eq!(json["domain"]["name"], "node-1.seismictest.net");
        assert_eq!(json["log"]["reth"], "debug");
        assert_eq!(json["args"]["enclave"], "--genesis-node");
        assert_eq!(json["args"]["summit"], "");
    }
}
