//! Azure provider implementation

use crate::az::{self, AzCli};
use crate::dns::AzureDns;
use async_trait::async_trait;
use cvmdeploy_cloud::{
    CloudApi, CloudError, CloudProvider, CreateVm, DataDisk, DeployConfig, DnsManager, NsgRule,
    OperationStatus, Result, WaitConfig, wait_for_operation,
};
use std::path::Path;
use std::sync::Arc;

/// Azure implementation of [`CloudApi`]
pub struct AzureApi {
    cli: AzCli,
    dns: Arc<dyn DnsManager>,
}

impl AzureApi {
    pub fn new() -> Self {
        Self::with_dns(Arc::new(AzureDns::new()))
    }

    pub fn with_dns(dns: Arc<dyn DnsManager>) -> Self {
        Self {
            cli: AzCli::new(),
            dns,
        }
    }

    /// `provisioningState` of a managed disk, `None` when it does not exist
    async fn disk_state(&self, resource_group: &str, disk_name: &str) -> Result<Option<String>> {
        let args = [
            "disk",
            "show",
            "--resource-group",
            resource_group,
            "--name",
            disk_name,
            "--query",
            "provisioningState",
            "-o",
            "tsv",
        ];
        match self.cli.az(&args).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for AzureApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudApi for AzureApi {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Azure
    }

    fn dns(&self) -> &dyn DnsManager {
        self.dns.as_ref()
    }

    async fn check_dependencies(&self) -> Result<()> {
        self.cli.check_installed().await?;
        Ok(())
    }

    async fn resource_group_exists(&self, name: &str) -> Result<bool> {
        let output = self.cli.az(&["group", "exists", "--name", name]).await?;
        Ok(output.eq_ignore_ascii_case("true"))
    }

    async fn create_resource_group(&self, name: &str, location: &str) -> Result<()> {
        self.cli
            .az(&[
                "group",
                "create",
                "--name",
                name,
                "--location",
                location,
                "--output",
                "none",
            ])
            .await?;
        Ok(())
    }

    async fn create_public_ip(
        &self,
        name: &str,
        resource_group: &str,
        region: &str,
    ) -> Result<String> {
        tracing::info!("Creating static public IP address: {}", name);
        let ip = self
            .cli
            .az(&az::public_ip_create_args(name, resource_group, region))
            .await?;
        if ip.is_empty() {
            return Err(CloudError::OperationFailed(format!(
                "public IP {} was created without an address",
                name
            )));
        }
        Ok(ip)
    }

    async fn get_existing_public_ip(
        &self,
        name: &str,
        resource_group: &str,
    ) -> Result<Option<String>> {
        let args = [
            "network",
            "public-ip",
            "show",
            "--resource-group",
            resource_group,
            "--name",
            name,
            "--query",
            "ipAddress",
            "-o",
            "tsv",
        ];
        match self.cli.az(&args).await {
            Ok(ip) if ip.is_empty() => Ok(None),
            Ok(ip) => Ok(Some(ip)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn disk_exists(&self, config: &DeployConfig, image_path: &Path) -> Result<bool> {
        let disk_name = config.vm.disk_name(image_path);
        Ok(self
            .disk_state(&config.vm.resource_group, &disk_name)
            .await?
            .is_some())
    }

    async fn create_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<String> {
        let disk_name = config.vm.disk_name(image_path);
        let size_bytes = tokio::fs::metadata(image_path).await?.len();
        tracing::info!(
            "Creating disk {} ({} bytes) for upload",
            disk_name,
            size_bytes
        );

        self.cli
            .az_logged(
                &az::upload_disk_create_args(
                    &config.vm.resource_group,
                    &disk_name,
                    config.vm.location(),
                    size_bytes,
                ),
                config.show_logs,
            )
            .await?;
        Ok(disk_name)
    }

    async fn grant_disk_access(&self, config: &DeployConfig, image_path: &Path) -> Result<String> {
        let disk_name = config.vm.disk_name(image_path);
        tracing::info!("Granting write access to {}", disk_name);
        let sas = self
            .cli
            .az(&az::grant_access_args(&config.vm.resource_group, &disk_name))
            .await?;
        if sas.is_empty() {
            return Err(CloudError::OperationFailed(format!(
                "no SAS URI returned for {}",
                disk_name
            )));
        }
        Ok(sas)
    }

    async fn copy_disk(&self, image_path: &Path, access_uri: &str, show_logs: bool) -> Result<()> {
        tracing::info!("Copying {} to Azure", image_path.display());
        self.cli
            .azcopy(&az::azcopy_args(image_path, access_uri), show_logs)
            .await?;
        Ok(())
    }

    async fn revoke_disk_access(&self, config: &DeployConfig, image_path: &Path) -> Result<()> {
        let disk_name = config.vm.disk_name(image_path);
        tracing::info!("Revoking access to {}", disk_name);
        self.cli
            .az(&[
                "disk",
                "revoke-access",
                "--name",
                &disk_name,
                "--resource-group",
                &config.vm.resource_group,
            ])
            .await?;
        Ok(())
    }

    /// Grant, copy, then revoke. Access is revoked even when the copy fails.
    async fn upload_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<()> {
        let sas = self.grant_disk_access(config, image_path).await?;
        let copied = self.copy_disk(image_path, &sas, config.show_logs).await;
        self.revoke_disk_access(config, image_path).await?;
        copied
    }

    async fn delete_disk(&self, resource_group: &str, disk_name: &str, _location: &str) -> Result<()> {
        tracing::info!("Deleting disk {} from {}", disk_name, resource_group);
        self.cli
            .az(&[
                "disk",
                "delete",
                "--resource-group",
                resource_group,
                "--name",
                disk_name,
                "--yes",
            ])
            .await?;
        Ok(())
    }

    async fn create_nsg(&self, config: &DeployConfig) -> Result<()> {
        tracing::info!("Creating network security group {}", config.vm.nsg_name);
        self.cli
            .az(&[
                "network",
                "nsg",
                "create",
                "--resource-group",
                &config.vm.resource_group,
                "--name",
                &config.vm.nsg_name,
                "--location",
                config.vm.location(),
                "--output",
                "none",
            ])
            .await?;
        Ok(())
    }

    async fn add_nsg_rule(&self, config: &DeployConfig, rule: &NsgRule) -> Result<()> {
        match self.cli.az(&az::nsg_rule_args(config, rule)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = CloudError::from(e);
                if err.is_already_exists() {
                    tracing::warn!("NSG rule {} already exists", rule.name);
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_data_disk(&self, disk: &DataDisk, show_logs: bool) -> Result<()> {
        if self.disk_state(&disk.resource_group, &disk.name).await?.is_some() {
            tracing::info!("Data disk {} already exists, reusing it", disk.name);
            return Ok(());
        }

        tracing::info!("Creating data disk: {} ({}GB)", disk.name, disk.size_gb);
        self.cli
            .az_logged(
                &az::data_disk_create_args(
                    &disk.resource_group,
                    &disk.name,
                    &disk.location,
                    disk.size_gb,
                ),
                show_logs,
            )
            .await?;

        let operation = format!("data disk creation for {}", disk.name);
        wait_for_operation(&operation, &WaitConfig::default(), || async move {
            Ok(
                match self.disk_state(&disk.resource_group, &disk.name).await? {
                    Some(state) if state.eq_ignore_ascii_case("succeeded") => {
                        OperationStatus::Done
                    }
                    Some(state) if state.eq_ignore_ascii_case("failed") => {
                        OperationStatus::Failed(state)
                    }
                    _ => OperationStatus::Pending,
                },
            )
        })
        .await?;

        tracing::info!("Data disk {} created successfully", disk.name);
        Ok(())
    }

    async fn attach_data_disk(
        &self,
        resource_group: &str,
        vm_name: &str,
        disk_name: &str,
        _zone: &str,
        lun: u32,
        show_logs: bool,
    ) -> Result<()> {
        tracing::info!("Attaching data disk {} to {} at LUN {}", disk_name, vm_name, lun);
        let lun = lun.to_string();
        self.cli
            .az_logged(
                &[
                    "vm",
                    "disk",
                    "attach",
                    "--resource-group",
                    resource_group,
                    "--vm-name",
                    vm_name,
                    "--name",
                    disk_name,
                    "--lun",
                    &lun,
                ],
                show_logs,
            )
            .await?;
        Ok(())
    }

    fn attaches_data_disk_at_create(&self) -> bool {
        false
    }

    async fn create_vm(&self, request: CreateVm<'_>) -> Result<()> {
        let config = request.config;
        let user_data = self.create_user_data_file(config)?;

        let subscription = if request.ip.resource_group != config.vm.resource_group {
            Some(self.cli.subscription_id().await?)
        } else {
            None
        };
        let public_ip =
            az::public_ip_reference(request.ip, &config.vm.resource_group, subscription.as_deref());

        tracing::info!("Booting VM {}...", config.vm.name);
        self.cli
            .az_logged(
                &az::vm_create_args(config, request.boot_disk, &public_ip, user_data.path()),
                config.show_logs,
            )
            .await?;
        tracing::info!("VM {} created successfully", config.vm.name);
        Ok(())
    }

    async fn get_vm_ip(
        &self,
        vm_name: &str,
        resource_group: &str,
        _location: &str,
    ) -> Result<Option<String>> {
        let ip = self
            .cli
            .az(&[
                "vm",
                "show",
                "--show-details",
                "--resource-group",
                resource_group,
                "--name",
                vm_name,
                "--query",
                "publicIps",
                "-o",
                "tsv",
            ])
            .await?;
        Ok(if ip.is_empty() { None } else { Some(ip) })
    }

    async fn delete_vm(&self, vm_name: &str, resource_group: &str, _location: &str) -> Result<()> {
        tracing::info!("Deleting VM {} from {}", vm_name, resource_group);
        self.cli
            .az(&[
                "vm",
                "delete",
                "--resource-group",
                resource_group,
                "--name",
                vm_name,
                "--yes",
            ])
            .await?;
        Ok(())
    }
}
