//! Provisioning pipeline
//!
//! Steps run strictly in order and each one checks for an existing
//! resource before creating it. Nothing is rolled back when a step fails:
//! re-running the same deployment picks up where it stopped.

use crate::error::{DeployError, Result};
use crate::metadata::{DomainRecord, MetadataStore, VmRecord};
use cvmdeploy_cloud::{
    CloudApi, CreateVm, DATA_DISK_LUN, DATA_DISK_SIZE_GB, DataDisk, DeployConfig, PublicIpRef,
    VmConfig,
};
use cvmdeploy_config::BuildPaths;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Time the guest gets to boot before the proxy connects
pub const PROXY_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Result of [`deploy_image`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDeployment {
    pub public_ip: Option<String>,
    pub data_disk: String,
}

/// Boot disk, firewall, data disk and VM for `image_path`.
///
/// The data disk goes into the create call on providers that support it
/// and is attached at [`DATA_DISK_LUN`] afterwards everywhere else.
pub async fn deploy_image(
    api: &dyn CloudApi,
    image_path: &Path,
    config: &DeployConfig,
    ip: &PublicIpRef,
) -> Result<ImageDeployment> {
    if !image_path.exists() {
        return Err(DeployError::ImageNotFound(format!(
            "image path not found: {}",
            image_path.display()
        )));
    }

    let artifact = artifact_name(image_path);
    let boot_disk = if api.disk_exists(config, image_path).await? {
        tracing::warn!(
            "Disk for artifact {} already exists for {}, skipping creation",
            artifact,
            config.vm.name
        );
        config.vm.disk_name(image_path)
    } else {
        let disk = api.create_disk(config, image_path).await?;
        api.upload_disk(config, image_path).await?;
        disk
    };

    api.create_nsg(config).await?;
    api.create_standard_nsg_rules(config).await?;

    let data_disk = DataDisk {
        resource_group: config.vm.resource_group.clone(),
        name: config.vm.data_disk_name(),
        location: config.vm.location().to_string(),
        size_gb: DATA_DISK_SIZE_GB,
    };
    tracing::info!("Creating persistent data disk: {}", data_disk.name);
    api.create_data_disk(&data_disk, config.show_logs).await?;

    if api.attaches_data_disk_at_create() {
        api.create_vm(CreateVm {
            config,
            image_path,
            ip,
            boot_disk: &boot_disk,
            data_disk: Some(&data_disk.name),
        })
        .await?;
    } else {
        api.create_vm(CreateVm {
            config,
            image_path,
            ip,
            boot_disk: &boot_disk,
            data_disk: None,
        })
        .await?;
        api.attach_data_disk(
            &config.vm.resource_group,
            &config.vm.name,
            &data_disk.name,
            config.vm.location(),
            DATA_DISK_LUN,
            config.show_logs,
        )
        .await?;
    }

    let public_ip = api
        .get_vm_ip(
            &config.vm.name,
            &config.vm.resource_group,
            config.vm.location(),
        )
        .await?;

    Ok(ImageDeployment {
        public_ip,
        data_disk: data_disk.name,
    })
}

fn artifact_name(image_path: &Path) -> String {
    image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A finished deployment, ready to be recorded
#[derive(Debug, Clone)]
pub struct DeployOutput {
    pub config: DeployConfig,
    pub artifact: String,
    pub public_ip: String,
    pub home: PathBuf,
    pub data_disk: Option<String>,
}

impl DeployOutput {
    pub fn record(&self) -> VmRecord {
        VmRecord {
            artifact: self.artifact.clone(),
            public_ip: self.public_ip.clone(),
            domain: DomainRecord::from(&self.config.domain),
            vm: self.config.vm.clone(),
            data_disk: self.data_disk.clone(),
        }
    }

    /// Upsert this VM into the deploy metadata, creating the file if needed
    pub async fn update_deploy_metadata(&self) -> Result<()> {
        let store = MetadataStore::for_home(&self.home);
        store.create_if_missing().await?;
        store
            .upsert(self.config.vm.cloud, &self.config.vm.name, self.record())
            .await?;
        tracing::info!(
            "Recorded {} ({}) in {}",
            self.config.vm.name,
            self.config.vm.cloud,
            store.path().display()
        );
        Ok(())
    }
}

/// Deploys one image with one configuration
pub struct Deployer<'a> {
    api: &'a dyn CloudApi,
    config: DeployConfig,
    image_path: PathBuf,
    ip: PublicIpRef,
    home: PathBuf,
}

impl<'a> Deployer<'a> {
    pub fn new(
        api: &'a dyn CloudApi,
        config: DeployConfig,
        image_path: impl Into<PathBuf>,
        ip: PublicIpRef,
        home: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            config,
            image_path: image_path.into(),
            ip,
            home: home.into(),
        }
    }

    pub async fn deploy(&self) -> Result<DeployOutput> {
        let deployment = deploy_image(self.api, &self.image_path, &self.config, &self.ip).await?;
        let public_ip = deployment
            .public_ip
            .ok_or_else(|| DeployError::NoPublicIp(self.config.vm.name.clone()))?;

        Ok(DeployOutput {
            config: self.config.clone(),
            artifact: artifact_name(&self.image_path),
            public_ip,
            home: self.home.clone(),
            data_disk: Some(deployment.data_disk),
        })
    }

    pub async fn start_proxy_server(&self, public_ip: &str) -> Result<ProxyClient> {
        start_proxy_server(&self.home, public_ip, &self.config.vm).await
    }
}

/// Start the reverse-proxy client once the guest had time to boot
pub async fn start_proxy_server(home: &Path, public_ip: &str, vm: &VmConfig) -> Result<ProxyClient> {
    tokio::time::sleep(PROXY_GRACE_PERIOD).await;
    let binary = BuildPaths::new(home).proxy_client();
    ProxyClient::start(&binary, public_ip, vm)
}

/// Running reverse-proxy client, killed when dropped
#[derive(Debug)]
pub struct ProxyClient {
    child: Child,
}

impl ProxyClient {
    pub fn args(public_ip: &str, vm: &VmConfig) -> Vec<String> {
        vec![
            "--server-url".to_string(),
            format!("http://{}:{}", public_ip, vm.api_port),
            "--listen-port".to_string(),
            vm.client_proxy_port.to_string(),
        ]
    }

    pub fn start(binary: &Path, public_ip: &str, vm: &VmConfig) -> Result<Self> {
        if !binary.exists() {
            return Err(DeployError::Proxy(format!(
                "proxy client not found at {}",
                binary.display()
            )));
        }

        let args = Self::args(public_ip, vm);
        tracing::debug!("Running: {} {}", binary.display(), args.join(" "));
        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::Proxy(format!("{}: {}", binary.display(), e)))?;

        tracing::info!(
            "Proxy client listening on port {} for {}",
            vm.client_proxy_port,
            public_ip
        );
        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait until the proxy exits on its own
    pub async fn wait(mut self) -> Result<()> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(DeployError::Proxy(format!("exited with {}", status)))
        }
    }

    pub async fn stop(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}
