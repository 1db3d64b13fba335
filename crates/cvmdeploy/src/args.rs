//! Flags shared by the deploy commands

use anyhow::Context;
use clap::Args;
use cvmdeploy_cloud::{CloudProvider, DeployConfig, DomainConfig, VmConfig};
use cvmdeploy_config::{
    BuildPaths, DEFAULT_CERTBOT_EMAIL, DEFAULT_DOMAIN_NAME, DEFAULT_DOMAIN_RESOURCE_GROUP,
    ProviderDefaults, detect_public_ip, validate_region,
};
use cvmdeploy_core::{find_latest_image, parse_artifact};
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct CloudArgs {
    /// Cloud provider (azure, gcp)
    #[arg(long, env = "CVM_CLOUD", default_value = "azure")]
    pub cloud: CloudProvider,

    /// Azure region or GCP zone [default: per provider]
    #[arg(short, long)]
    pub region: Option<String>,

    /// Azure resource group or GCP project [default: per provider]
    #[arg(long)]
    pub resource_group: Option<String>,

    /// Azure VM size or GCP machine type [default: per provider]
    #[arg(long)]
    pub vm_size: Option<String>,

    /// DNS zone
    #[arg(long, default_value = DEFAULT_DOMAIN_NAME)]
    pub domain_name: String,

    /// Resource group holding the DNS zone
    #[arg(long, default_value = DEFAULT_DOMAIN_RESOURCE_GROUP)]
    pub domain_resource_group: String,

    /// Certbot contact email
    #[arg(long, default_value = DEFAULT_CERTBOT_EMAIL)]
    pub certbot_email: String,

    /// Address allowed through SSH [default: this machine's public IP]
    #[arg(long)]
    pub source_ip: Option<String>,
}

impl CloudArgs {
    pub fn defaults(&self) -> ProviderDefaults {
        ProviderDefaults::for_provider(self.cloud)
    }

    pub fn region(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| self.defaults().region.to_string())
    }

    pub fn resource_group(&self) -> String {
        self.resource_group
            .clone()
            .unwrap_or_else(|| self.defaults().resource_group.to_string())
    }

    pub fn vm_size(&self) -> String {
        self.vm_size
            .clone()
            .unwrap_or_else(|| self.defaults().vm_size.to_string())
    }

    pub async fn source_ip(&self) -> anyhow::Result<String> {
        match &self.source_ip {
            Some(ip) => Ok(ip.clone()),
            None => Ok(detect_public_ip().await?),
        }
    }

    /// Validated configuration for `vm` published at `record`
    pub async fn deploy_config(
        &self,
        vm: VmConfig,
        record: &str,
        show_logs: bool,
    ) -> anyhow::Result<DeployConfig> {
        validate_region(self.cloud, &vm.region)?;
        let source_ip = self.source_ip().await?;
        self.config_for(vm, record, &source_ip, show_logs)
    }

    /// Like [`Self::deploy_config`] with an already resolved source IP
    pub fn config_for(
        &self,
        vm: VmConfig,
        record: &str,
        source_ip: &str,
        show_logs: bool,
    ) -> anyhow::Result<DeployConfig> {
        validate_region(self.cloud, &vm.region)?;
        Ok(DeployConfig {
            vm,
            domain: DomainConfig::new(record, &self.domain_name, &self.domain_resource_group),
            email: self.certbot_email.clone(),
            source_ip: source_ip.to_string(),
            show_logs,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Artifact filename or its 14-digit build timestamp
    #[arg(short, long, conflicts_with = "latest")]
    pub artifact: Option<String>,

    /// Use the most recently built image
    #[arg(long)]
    pub latest: bool,

    /// Prefer dev builds (seismic-dev-*)
    #[arg(long)]
    pub dev: bool,
}

impl ArtifactArgs {
    /// Local image path, `None` when neither `--artifact` nor `--latest` was given
    pub fn image_path(&self, home: &Path, cloud: CloudProvider) -> anyhow::Result<Option<PathBuf>> {
        if self.latest {
            return Ok(Some(find_latest_image(home, cloud, self.dev)?));
        }
        match &self.artifact {
            Some(arg) => {
                let name = parse_artifact(arg, Some(home), self.dev)?;
                Ok(Some(BuildPaths::new(home).artifacts().join(name)))
            }
            None => Ok(None),
        }
    }

    pub fn require_image_path(&self, home: &Path, cloud: CloudProvider) -> anyhow::Result<PathBuf> {
        self.image_path(home, cloud)?
            .context("Missing --artifact (or pass --latest)")
    }
}
