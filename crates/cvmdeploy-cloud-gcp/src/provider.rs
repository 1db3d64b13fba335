//! GCP provider implementation
//!
//! Projects stand in for resource groups and zones for regions. Disk
//! creation and upload are fused: the image is pushed to Cloud Storage,
//! imported as a TDX-capable image, then turned into a disk.

use crate::error::GcpError;
use crate::gcloud::{self, Gcloud, OperationScope};
use async_trait::async_trait;
use cvmdeploy_cloud::{
    CloudApi, CloudError, CloudProvider, CreateVm, DataDisk, DeployConfig, DnsManager, NsgRule,
    Result, WaitConfig, wait_for_operation,
};
use std::path::Path;
use std::sync::Arc;

/// Region used for regional lookups when no zone is known
pub const DEFAULT_REGION: &str = "us-central1";

/// GCP implementation of [`CloudApi`]
///
/// DNS is delegated to the injected manager.
pub struct GcpApi {
    dns: Arc<dyn DnsManager>,
    region: String,
    wait: WaitConfig,
}

impl GcpApi {
    pub fn new(dns: Arc<dyn DnsManager>) -> Self {
        Self {
            dns,
            region: DEFAULT_REGION.to_string(),
            wait: WaitConfig::default(),
        }
    }

    /// Region for address lookups, derived from a zone
    pub fn with_zone(mut self, zone: &str) -> Result<Self> {
        self.region = gcloud::region_of_zone(zone)?.to_string();
        Ok(self)
    }

    /// Wait for an async operation started in `project`
    async fn await_operation(
        &self,
        cli: &Gcloud,
        operation: &str,
        scope: OperationScope,
        label: &str,
    ) -> Result<()> {
        wait_for_operation(label, &self.wait, || {
            let scope = scope.clone();
            async move {
                let op = cli.describe_operation(operation, &scope).await?;
                Ok(op.status())
            }
        })
        .await
    }

    async fn exists<S: AsRef<str>>(cli: &Gcloud, args: &[S]) -> Result<bool> {
        match cli.run(args, false).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_bucket(&self, project: &str, show_logs: bool) -> Result<String> {
        let bucket = format!("gs://{}", gcloud::bucket_name(project));
        let listed = gcloud::gsutil(&["ls", "-b", &bucket], false).await;
        if bucket_listed(listed)? {
            tracing::info!("Using existing bucket: {}", bucket);
        } else {
            tracing::info!("Creating new bucket: {}", bucket);
            gcloud::gsutil(&["mb", "-p", project, "-l", &self.region, &bucket], show_logs).await?;
        }
        Ok(bucket)
    }

    async fn create_image(&self, cli: &Gcloud, image: &str, source_uri: &str) -> Result<()> {
        let describe = ["compute", "images", "describe", image, "--format=value(name)"];
        if Self::exists(cli, &describe).await? {
            tracing::info!("Image {} already exists, skipping creation", image);
            return Ok(());
        }

        tracing::info!("Creating image {} from Cloud Storage", image);
        let started = cli
            .start(&[
                "compute",
                "images",
                "create",
                image,
                "--source-uri",
                source_uri,
                "--guest-os-features",
                "TDX",
            ])
            .await;
        let operation = match started {
            Ok(operation) => operation,
            Err(e) => {
                let err = CloudError::from(e);
                if err.is_already_exists() {
                    tracing::warn!("Image {} already exists", image);
                    return Ok(());
                }
                return Err(err);
            }
        };
        self.await_operation(cli, &operation, OperationScope::Global, "image creation")
            .await?;
        tracing::info!("Image {} created successfully", image);
        Ok(())
    }
}

/// Outcome of `gsutil ls -b`: a missing bucket is `false`, other failures propagate
fn bucket_listed(listed: crate::error::Result<String>) -> Result<bool> {
    match listed {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CloudApi for GcpApi {
    fn provider(&self) -> CloudProvider {
        CloudProvider::Gcp
    }

    fn dns(&self) -> &dyn DnsManager {
        self.dns.as_ref()
    }

    async fn check_dependencies(&self) -> Result<()> {
        gcloud::check_installed().await?;
        Ok(())
    }

    async fn resource_group_exists(&self, name: &str) -> Result<bool> {
        let cli = Gcloud::new(name);
        // Missing and inaccessible projects look the same to gcloud
        match cli
            .run(&["projects", "describe", name, "--format=value(projectId)"], false)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::debug!("Project {} not accessible: {}", name, e);
                Ok(false)
            }
        }
    }

    async fn create_resource_group(&self, name: &str, _location: &str) -> Result<()> {
        tracing::warn!(
            "GCP projects cannot be created without organization access. \
             Please create project {} manually if it doesn't exist.",
            name
        );
        Ok(())
    }

    /// Projects cannot be created here; a missing one is only reported
    async fn ensure_created_resource_group(&self, name: &str, _location: &str) -> Result<()> {
        if self.resource_group_exists(name).await? {
            tracing::info!("Project {} already exists", name);
        } else {
            tracing::warn!(
                "Project {} does not exist. Please create it manually in the GCP console.",
                name
            );
        }
        Ok(())
    }

    async fn create_public_ip(
        &self,
        name: &str,
        resource_group: &str,
        region: &str,
    ) -> Result<String> {
        let region = gcloud::region_of_zone(region).unwrap_or(region);
        tracing::info!("Creating static public IP address: {} in {}", name, region);

        let cli = Gcloud::new(resource_group);
        cli.run(
            &[
                "compute",
                "addresses",
                "create",
                name,
                "--region",
                region,
                "--network-tier",
                gcloud::NETWORK_TIER,
            ],
            false,
        )
        .await?;

        let ip = cli
            .run(
                &[
                    "compute",
                    "addresses",
                    "describe",
                    name,
                    "--region",
                    region,
                    "--format=get(address)",
                ],
                false,
            )
            .await?;
        if ip.is_empty() {
            return Err(GcpError::InvalidResponse(format!("address {} has no IP", name)).into());
        }
        Ok(ip)
    }

    async fn get_existing_public_ip(
        &self,
        name: &str,
        resource_group: &str,
    ) -> Result<Option<String>> {
        let cli = Gcloud::new(resource_group);
        let args = [
            "compute",
            "addresses",
            "describe",
            name,
            "--region",
            self.region.as_str(),
            "--format=get(address)",
        ];
        match cli.run(&args, false).await {
            Ok(ip) if ip.is_empty() => Ok(None),
            Ok(ip) => Ok(Some(ip)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn disk_exists(&self, config: &DeployConfig, image_path: &Path) -> Result<bool> {
        let disk_name = gcloud::resource_name(&config.vm.disk_name(image_path));
        let cli = Gcloud::new(&config.vm.resource_group);
        Self::exists(
            &cli,
            &[
                "compute",
                "disks",
                "describe",
                disk_name.as_str(),
                "--zone",
                config.vm.location(),
                "--format=value(name)",
            ],
        )
        .await
    }

    async fn create_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<String> {
        let project = config.vm.resource_group.as_str();
        let cli = Gcloud::new(project);
        let disk_name = gcloud::resource_name(&config.vm.disk_name(image_path));
        let image = gcloud::image_name(&config.vm.name, image_path);
        let blob = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CloudError::Validation(format!("not a file: {}", image_path.display()))
            })?;

        tracing::info!("Creating disk {}", disk_name);

        let bucket = self.ensure_bucket(project, config.show_logs).await?;
        let object = format!("{}/{}", bucket, blob);
        tracing::info!("Uploading {} to {}", blob, object);
        gcloud::gsutil(
            &["cp", &image_path.display().to_string(), &object],
            config.show_logs,
        )
        .await?;
        tracing::info!("Upload complete: {}", object);

        self.create_image(&cli, &image, &object).await?;

        tracing::info!("Creating disk {} from image", disk_name);
        let operation = cli
            .start(&[
                "compute",
                "disks",
                "create",
                disk_name.as_str(),
                "--zone",
                config.vm.location(),
                "--image",
                image.as_str(),
                "--type",
                gcloud::BOOT_DISK_TYPE,
            ])
            .await?;
        self.await_operation(
            &cli,
            &operation,
            OperationScope::Zone(config.vm.location().to_string()),
            "disk creation",
        )
        .await?;
        tracing::info!("Disk {} created successfully", disk_name);
        Ok(disk_name)
    }

    async fn grant_disk_access(&self, _config: &DeployConfig, _image_path: &Path) -> Result<String> {
        Err(CloudError::Unsupported {
            provider: "gcp".to_string(),
            operation: "grant_disk_access",
        })
    }

    async fn copy_disk(&self, _image_path: &Path, _access_uri: &str, _show_logs: bool) -> Result<()> {
        Err(CloudError::Unsupported {
            provider: "gcp".to_string(),
            operation: "copy_disk",
        })
    }

    async fn revoke_disk_access(&self, _config: &DeployConfig, _image_path: &Path) -> Result<()> {
        Err(CloudError::Unsupported {
            provider: "gcp".to_string(),
            operation: "revoke_disk_access",
        })
    }

    async fn upload_disk(&self, _config: &DeployConfig, _image_path: &Path) -> Result<()> {
        tracing::info!("Disk upload is handled during disk creation for GCP");
        Ok(())
    }

    async fn delete_disk(&self, resource_group: &str, disk_name: &str, location: &str) -> Result<()> {
        let disk_name = gcloud::resource_name(disk_name);
        tracing::info!("Deleting disk {} from project {}", disk_name, resource_group);
        Gcloud::new(resource_group)
            .run(
                &[
                    "compute",
                    "disks",
                    "delete",
                    disk_name.as_str(),
                    "--zone",
                    location,
                    "--quiet",
                ],
                false,
            )
            .await?;
        tracing::info!("Disk {} deleted successfully", disk_name);
        Ok(())
    }

    async fn create_nsg(&self, _config: &DeployConfig) -> Result<()> {
        tracing::info!("Creating firewall rules");
        Ok(())
    }

    async fn add_nsg_rule(&self, config: &DeployConfig, rule: &NsgRule) -> Result<()> {
        let cli = Gcloud::new(&config.vm.resource_group);
        match cli
            .run(&gcloud::firewall_rule_args(config, rule), config.show_logs)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err = CloudError::from(e);
                // Streamed output hides stderr, so any failure is taken as a conflict
                if err.is_already_exists() || config.show_logs {
                    tracing::warn!("Firewall rule for {} may already exist", rule.name);
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_data_disk(&self, disk: &DataDisk, show_logs: bool) -> Result<()> {
        let cli = Gcloud::new(&disk.resource_group);
        let name = gcloud::resource_name(&disk.name);
        let describe = [
            "compute",
            "disks",
            "describe",
            name.as_str(),
            "--zone",
            disk.location.as_str(),
            "--format=value(name)",
        ];
        if Self::exists(&cli, &describe).await? {
            tracing::info!("Data disk {} already exists, reusing it", name);
            return Ok(());
        }

        tracing::info!("Creating data disk: {} ({}GB)", name, disk.size_gb);
        let size = format!("{}GB", disk.size_gb);
        let operation = cli
            .start(&[
                "compute",
                "disks",
                "create",
                name.as_str(),
                "--zone",
                disk.location.as_str(),
                "--size",
                size.as_str(),
                "--type",
                gcloud::DATA_DISK_TYPE,
            ])
            .await?;
        if show_logs {
            tracing::info!("Operation: {}", operation);
        }
        self.await_operation(
            &cli,
            &operation,
            OperationScope::Zone(disk.location.clone()),
            &format!("data disk creation for {}", name),
        )
        .await?;
        tracing::info!("Data disk {} created successfully", name);
        Ok(())
    }

    /// Hot-plug fallback. Deployments attach at create time instead.
    async fn attach_data_disk(
        &self,
        resource_group: &str,
        vm_name: &str,
        disk_name: &str,
        zone: &str,
        lun: u32,
        show_logs: bool,
    ) -> Result<()> {
        let disk_name = gcloud::resource_name(disk_name);
        tracing::info!(
            "Attaching data disk {} to {} (LUN {} has no GCP equivalent)",
            disk_name,
            vm_name,
            lun
        );
        Gcloud::new(resource_group)
            .run(
                &[
                    "compute",
                    "instances",
                    "attach-disk",
                    vm_name,
                    "--disk",
                    disk_name.as_str(),
                    "--device-name",
                    disk_name.as_str(),
                    "--zone",
                    zone,
                ],
                show_logs,
            )
            .await?;
        tracing::info!("Disk {} attached to {} successfully", disk_name, vm_name);
        Ok(())
    }

    fn attaches_data_disk_at_create(&self) -> bool {
        true
    }

    async fn create_vm(&self, request: CreateVm<'_>) -> Result<()> {
        let config = request.config;
        let user_data = self.create_user_data_file(config)?;
        let cli = Gcloud::new(&config.vm.resource_group);

        let boot_disk = gcloud::resource_name(request.boot_disk);
        let data_disk = request.data_disk.map(gcloud::resource_name);

        tracing::info!("Booting VM {}...", config.vm.name);
        let operation = cli
            .start(&gcloud::instance_create_args(
                config,
                &boot_disk,
                &request.ip.name,
                data_disk.as_deref(),
                user_data.path(),
            ))
            .await?;
        self.await_operation(
            &cli,
            &operation,
            OperationScope::Zone(config.vm.location().to_string()),
            "VM creation",
        )
        .await?;
        tracing::info!("VM {} created successfully", config.vm.name);
        Ok(())
    }

    async fn get_vm_ip(
        &self,
        vm_name: &str,
        resource_group: &str,
        location: &str,
    ) -> Result<Option<String>> {
        let ip = Gcloud::new(resource_group)
            .run(
                &[
                    "compute",
                    "instances",
                    "describe",
                    vm_name,
                    "--zone",
                    location,
                    "--format=get(networkInterfaces[0].accessConfigs[0].natIP)",
                ],
                false,
            )
            .await?;
        Ok(if ip.is_empty() { None } else { Some(ip) })
    }

    async fn delete_vm(&self, vm_name: &str, resource_group: &str, location: &str) -> Result<()> {
        tracing::info!("Deleting VM {} from project {}", vm_name, resource_group);
        Gcloud::new(resource_group)
            .run(
                &[
                    "compute",
                    "instances",
                    "delete",
                    vm_name,
                    "--zone",
                    location,
                    "--quiet",
                ],
                false,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvmdeploy_cloud::{DomainConfig, VmConfig};

    struct NoDns;

    #[async_trait]
    impl DnsManager for NoDns {
        async fn get_a_records(&self, _domain: &DomainConfig) -> Result<Vec<String>> {
            Ok(vec!["198.51.100.1".to_string()])
        }

        async fn remove_a_record(&self, _domain: &DomainConfig, _ip: &str) -> Result<()> {
            Ok(())
        }

        async fn add_a_record(&self, _domain: &DomainConfig, _ip: &str) -> Result<()> {
            Ok(())
        }
    }

    fn api() -> GcpApi {
        GcpApi::new(Arc::new(NoDns))
    }

    fn gsutil_failure(stderr: &str) -> GcpError {
        GcpError::CommandFailed {
            command: "gsutil ls -b gs://testnet-477314-images".into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_bucket_listing() {
        assert!(bucket_listed(Ok("gs://testnet-477314-images/\n".into())).unwrap());
        assert!(!bucket_listed(Err(gsutil_failure(
            "BucketNotFoundException: 404 gs://testnet-477314-images bucket does not exist."
        )))
        .unwrap());

        let err = bucket_listed(Err(gsutil_failure(
            "AccessDeniedException: 403 ops@example.com does not have storage.buckets.get access",
        )))
        .unwrap_err();
        assert!(matches!(err, CloudError::CommandFailed { .. }));
    }

    fn config() -> DeployConfig {
        DeployConfig {
            vm: VmConfig::new(CloudProvider::Gcp, "testnet-477314", "us-central1-a", "c3-standard-4"),
            domain: DomainConfig::new("gcp-1", "seismictest.net", "yocto-testnet"),
            email: "ops@example.com".to_string(),
            source_ip: "203.0.113.9".to_string(),
            show_logs: false,
        }
    }

    #[test]
    fn test_with_zone_sets_region() {
        let api = api().with_zone("asia-northeast1-b").unwrap();
        assert_eq!(api.region, "asia-northeast1");
        assert!(api.attaches_data_disk_at_create());
        assert!(matches!(
            GcpApi::new(Arc::new(NoDns)).with_zone("eastus"),
            Err(CloudError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sas_operations_unsupported() {
        let api = api();
        let config = config();
        let image = Path::new("seismic-gcp-20250110120000.tar.gz");

        assert!(matches!(
            api.grant_disk_access(&config, image).await,
            Err(CloudError::Unsupported { .. })
        ));
        assert!(matches!(
            api.copy_disk(image, "https://example.invalid", false).await,
            Err(CloudError::Unsupported { .. })
        ));
        assert!(matches!(
            api.revoke_disk_access(&config, image).await,
            Err(CloudError::Unsupported { .. })
        ));
        assert!(api.upload_disk(&config, image).await.is_ok());
    }

    #[tokio::test]
    async fn test_dns_is_delegated() {
        let api = api();
        let ips = api.get_existing_dns_ips(&config().domain).await.unwrap();
        assert_eq!(ips, vec!["198.51.100.1"]);
    }
}
