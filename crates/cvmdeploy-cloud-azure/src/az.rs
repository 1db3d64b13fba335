//! az / azcopy CLI wrapper
//!
//! Every Azure operation goes through the Azure CLI. Argument lists are
//! built by plain functions so they can be checked without a subscription.

use crate::error::{AzureError, Result};
use cvmdeploy_cloud::{DeployConfig, NsgRule, Protocol, PublicIpRef};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Resource ID prefix for public IPs living in another resource group
const PUBLIC_IP_PROVIDER: &str = "providers/Microsoft.Network/publicIPAddresses";

/// SAS validity for the image upload (24h)
pub const SAS_DURATION_SECS: u32 = 86_400;

/// Azure CLI wrapper
#[derive(Debug, Clone, Default)]
pub struct AzCli;

impl AzCli {
    pub fn new() -> Self {
        Self
    }

    /// Check that `az` and `azcopy` are installed and `az` is logged in
    pub async fn check_installed(&self) -> Result<()> {
        for tool in ["az", "azcopy"] {
            let which = Command::new("which").arg(tool).output().await?;
            if !which.status.success() {
                return Err(AzureError::ToolNotFound(tool.to_string()));
            }
        }

        self.az(&["account", "show", "--output", "none"])
            .await
            .map_err(|e| match e {
                AzureError::CommandFailed { stderr, .. } => AzureError::NotLoggedIn(stderr),
                other => other,
            })?;
        Ok(())
    }

    /// Run `az` and return trimmed stdout
    pub async fn az<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        run_command("az", args, false).await
    }

    /// Run `az`, streaming its output when `show_logs` is set
    pub async fn az_logged<S: AsRef<str>>(&self, args: &[S], show_logs: bool) -> Result<String> {
        run_command("az", args, show_logs).await
    }

    pub async fn azcopy<S: AsRef<str>>(&self, args: &[S], show_logs: bool) -> Result<String> {
        run_command("azcopy", args, show_logs).await
    }

    /// Subscription ID of the logged-in account
    pub async fn subscription_id(&self) -> Result<String> {
        let id = self
            .az(&["account", "show", "--query", "id", "-o", "tsv"])
            .await?;
        if id.is_empty() {
            return Err(AzureError::InvalidResponse(
                "az account show returned no subscription id".to_string(),
            ));
        }
        Ok(id)
    }
}

/// Run a command, capturing its output unless `show_logs` is set.
///
/// Streamed commands return an empty string.
async fn run_command<S: AsRef<str>>(program: &str, args: &[S], show_logs: bool) -> Result<String> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    // SAS URIs carry a signature
    let shown: Vec<&str> = args
        .iter()
        .map(|a| if a.contains("sig=") { "<sas-uri>" } else { *a })
        .collect();
    tracing::debug!("Running: {} {}", program, shown.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(&args);
    if show_logs {
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    }

    let output = cmd.output().await?;

    if !output.status.success() {
        let stderr = if show_logs {
            format!("exited with {}", output.status)
        } else {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        };
        return Err(AzureError::CommandFailed {
            command: format!("{} {}", program, args[..args.len().min(3)].join(" ")),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

pub fn public_ip_create_args(name: &str, resource_group: &str, region: &str) -> Vec<String> {
    strings(&[
        "network",
        "public-ip",
        "create",
        "--resource-group",
        resource_group,
        "--name",
        name,
        "--location",
        region,
        "--sku",
        "Standard",
        "--allocation-method",
        "Static",
        "--query",
        "publicIp.ipAddress",
        "-o",
        "tsv",
    ])
}

/// Empty managed disk sized for a direct upload of `size_bytes`
pub fn upload_disk_create_args(
    resource_group: &str,
    disk_name: &str,
    location: &str,
    size_bytes: u64,
) -> Vec<String> {
    let size = size_bytes.to_string();
    strings(&[
        "disk",
        "create",
        "--name",
        disk_name,
        "--resource-group",
        resource_group,
        "--location",
        location,
        "--os-type",
        "Linux",
        "--upload-type",
        "Upload",
        "--upload-size-bytes",
        &size,
        "--sku",
        "Standard_LRS",
        "--security-type",
        "ConfidentialVM_NonPersistedTPM",
        "--hyper-v-generation",
        "V2",
    ])
}

pub fn grant_access_args(resource_group: &str, disk_name: &str) -> Vec<String> {
    let duration = SAS_DURATION_SECS.to_string();
    strings(&[
        "disk",
        "grant-access",
        "--name",
        disk_name,
        "--resource-group",
        resource_group,
        "--access-level",
        "Write",
        "--duration-in-seconds",
        &duration,
        "--query",
        "accessSas",
        "-o",
        "tsv",
    ])
}

pub fn azcopy_args(image_path: &Path, sas_uri: &str) -> Vec<String> {
    vec![
        "copy".to_string(),
        image_path.display().to_string(),
        sas_uri.to_string(),
        "--blob-type".to_string(),
        "PageBlob".to_string(),
    ]
}

pub fn nsg_rule_args(config: &DeployConfig, rule: &NsgRule) -> Vec<String> {
    let priority = rule.priority.to_string();
    let port = rule.port.to_string();
    let protocol = match rule.protocol {
        Protocol::Tcp => "Tcp",
        Protocol::All => "*",
    };
    strings(&[
        "network",
        "nsg",
        "rule",
        "create",
        "--resource-group",
        &config.vm.resource_group,
        "--nsg-name",
        &config.vm.nsg_name,
        "--name",
        &rule.name,
        "--priority",
        &priority,
        "--direction",
        "Inbound",
        "--access",
        "Allow",
        "--protocol",
        protocol,
        "--source-address-prefixes",
        &rule.source,
        "--destination-port-ranges",
        &port,
    ])
}

pub fn data_disk_create_args(
    resource_group: &str,
    disk_name: &str,
    location: &str,
    size_gb: u32,
) -> Vec<String> {
    let size = size_gb.to_string();
    strings(&[
        "disk",
        "create",
        "--resource-group",
        resource_group,
        "--name",
        disk_name,
        "--location",
        location,
        "--size-gb",
        &size,
        "--sku",
        "Premium_LRS",
        "--no-wait",
    ])
}

/// Public IP argument for `az vm create`.
///
/// A name is enough inside the VM's own group; anything else needs the
/// full resource ID.
pub fn public_ip_reference(
    ip: &PublicIpRef,
    vm_resource_group: &str,
    subscription_id: Option<&str>,
) -> String {
    match subscription_id {
        Some(sub) if ip.resource_group != vm_resource_group => format!(
            "/subscriptions/{}/resourceGroups/{}/{}/{}",
            sub, ip.resource_group, PUBLIC_IP_PROVIDER, ip.name
        ),
        _ => ip.name.clone(),
    }
}

pub fn vm_create_args(
    config: &DeployConfig,
    boot_disk: &str,
    public_ip: &str,
    user_data: &Path,
) -> Vec<String> {
    let custom_data = user_data.display().to_string();
    strings(&[
        "vm",
        "create",
        "--name",
        &config.vm.name,
        "--resource-group",
        &config.vm.resource_group,
        "--location",
        config.vm.location(),
        "--size",
        &config.vm.size,
        "--attach-os-disk",
        boot_disk,
        "--os-type",
        "Linux",
        "--security-type",
        "ConfidentialVM",
        "--os-disk-security-encryption-type",
        "NonPersistedTPM",
        "--enable-secure-boot",
        "false",
        "--enable-vtpm",
        "true",
        "--nsg",
        &config.vm.nsg_name,
        "--public-ip-address",
        public_ip,
        "--custom-data",
        &custom_data,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvmdeploy_cloud::{CloudProvider, DomainConfig, VmConfig, standard_rules};

    fn config() -> DeployConfig {
        DeployConfig {
            vm: VmConfig::new(CloudProvider::Azure, "yocto-genesis-1", "eastus2", "Standard_DC4es_v6"),
            domain: DomainConfig::new("node-1", "seismictest.net", "yocto-testnet"),
            email: "ops@example.com".to_string(),
            source_ip: "203.0.113.9".to_string(),
            show_logs: false,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_nsg_rule_args() {
        let config = config();
        let rules = standard_rules(&config.source_ip);

        let ssh = nsg_rule_args(&config, &rules[0]);
        assert_eq!(value_after(&ssh, "--name"), Some("AllowSSH"));
        assert_eq!(value_after(&ssh, "--protocol"), Some("Tcp"));
        assert_eq!(value_after(&ssh, "--source-address-prefixes"), Some("203.0.113.9"));
        assert_eq!(value_after(&ssh, "--destination-port-ranges"), Some("22"));

        let consensus = rules.iter().find(|r| r.port == 18551).unwrap();
        let args = nsg_rule_args(&config, consensus);
        assert_eq!(value_after(&args, "--protocol"), Some("*"));
        assert_eq!(value_after(&args, "--priority"), Some("114"));
    }

    #[test]
    fn test_vm_create_args() {
        let config = config();
        let args = vm_create_args(
            &config,
            "yocto-genesis-1_seismic-azure-20250110120000.vhd",
            "genesis-node-1",
            Path::new("/tmp/user-data-abc.yaml"),
        );
        assert_eq!(
            value_after(&args, "--attach-os-disk"),
            Some("yocto-genesis-1_seismic-azure-20250110120000.vhd")
        );
        assert_eq!(value_after(&args, "--security-type"), Some("ConfidentialVM"));
        assert_eq!(value_after(&args, "--custom-data"), Some("/tmp/user-data-abc.yaml"));
        assert_eq!(value_after(&args, "--nsg"), Some("yocto-genesis-1"));
    }

    #[test]
    fn test_public_ip_reference() {
        let same_group = PublicIpRef::new("yocto-genesis-1", "yocto-genesis-1");
        assert_eq!(
            public_ip_reference(&same_group, "yocto-genesis-1", Some("sub")),
            "yocto-genesis-1"
        );

        let shared = PublicIpRef::new("genesis-node-1", "tdx-testnet");
        assert_eq!(
            public_ip_reference(&shared, "yocto-genesis-1", Some("sub-123")),
            "/subscriptions/sub-123/resourceGroups/tdx-testnet/providers/Microsoft.Network/publicIPAddresses/genesis-node-1"
        );
    }

    #[test]
    fn test_upload_and_data_disk_args() {
        let upload = upload_disk_create_args("rg", "vm_image.vhd", "eastus2", 1_073_742_336);
        assert_eq!(value_after(&upload, "--upload-size-bytes"), Some("1073742336"));
        assert_eq!(value_after(&upload, "--upload-type"), Some("Upload"));

        let data = data_disk_create_args("rg", "vm-persistent", "eastus2", 1024);
        assert_eq!(value_after(&data, "--size-gb"), Some("1024"));
        assert!(data.contains(&"--no-wait".to_string()));

        let grant = grant_access_args("rg", "vm_image.vhd");
        assert_eq!(value_after(&grant, "--duration-in-seconds"), Some("86400"));
    }
}
