use async_trait::async_trait;
use cvmdeploy_cloud::{
    CloudApi, CloudProvider, CreateVm, DataDisk, DeployConfig, DnsManager, DomainConfig, NsgRule,
    Result, VmConfig,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Deployment home in a temp dir
pub struct TestHome {
    pub root: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn artifacts(&self) -> PathBuf {
        self.path().join("seismic-images/build")
    }

    /// Create an (empty) artifact file and return its path
    pub fn write_artifact(&self, name: &str) -> PathBuf {
        fs::create_dir_all(self.artifacts()).unwrap();
        let path = self.artifacts().join(name);
        fs::write(&path, b"image").unwrap();
        path
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.path().join("deploy/deploy_metadata.json")
    }

    #[allow(dead_code)]
    pub fn write_metadata(&self, json: &str) {
        let path = self.metadata_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, json).unwrap();
    }
}

#[allow(dead_code)]
pub fn deploy_config(cloud: CloudProvider, name: &str) -> DeployConfig {
    DeployConfig {
        vm: VmConfig::new(cloud, name, "eastus2", "Standard_DC4es_v6"),
        domain: DomainConfig::new(name, "seismictest.net", "yocto-testnet"),
        email: "ops@example.com".to_string(),
        source_ip: "203.0.113.9".to_string(),
        show_logs: false,
    }
}

/// In-memory A records keyed by FQDN
#[derive(Default)]
pub struct MockDns {
    pub records: Mutex<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl DnsManager for MockDns {
    async fn get_a_records(&self, domain: &DomainConfig) -> Result<Vec<String>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&domain.fqdn())
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        if let Some(ips) = self.records.lock().unwrap().get_mut(&domain.fqdn()) {
            ips.retain(|ip| ip != ip_address);
        }
        Ok(())
    }

    async fn add_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .entry(domain.fqdn())
            .or_default()
            .push(ip_address.to_string());
        Ok(())
    }
}

/// Cloud that records every call and keeps just enough state to be
/// re-run against
pub struct MockCloud {
    pub provider: CloudProvider,
    pub dns: MockDns,
    pub calls: Mutex<Vec<String>>,
    pub disks: Mutex<HashSet<String>>,
    /// `(resource_group, name)` -> address
    pub ips: Mutex<HashMap<(String, String), String>>,
    pub vm_ip: Option<String>,
    next_ip: Mutex<u8>,
}

#[allow(dead_code)]
impl MockCloud {
    pub fn new(provider: CloudProvider) -> Self {
        Self {
            provider,
            dns: MockDns::default(),
            calls: Mutex::new(Vec::new()),
            disks: Mutex::new(HashSet::new()),
            ips: Mutex::new(HashMap::new()),
            vm_ip: Some("198.51.100.20".to_string()),
            next_ip: Mutex::new(1),
        }
    }

    pub fn without_vm_ip(mut self) -> Self {
        self.vm_ip = None;
        self
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    fn provider(&self) -> CloudProvider {
        self.provider
    }

    fn dns(&self) -> &dyn DnsManager {
        &self.dns
    }

    async fn check_dependencies(&self) -> Result<()> {
        self.record("check_dependencies");
        Ok(())
    }

    async fn resource_group_exists(&self, name: &str) -> Result<bool> {
        self.record(format!("resource_group_exists {}", name));
        Ok(true)
    }

    async fn create_resource_group(&self, name: &str, _location: &str) -> Result<()> {
        self.record(format!("create_resource_group {}", name));
        Ok(())
    }

    async fn create_public_ip(&self, name: &str, resource_group: &str, _region: &str) -> Result<String> {
        self.record(format!("create_public_ip {}", name));
        let mut next = self.next_ip.lock().unwrap();
        let ip = format!("192.0.2.{}", *next);
        *next += 1;
        self.ips
            .lock()
            .unwrap()
            .insert((resource_group.to_string(), name.to_string()), ip.clone());
        Ok(ip)
    }

    async fn get_existing_public_ip(&self, name: &str, resource_group: &str) -> Result<Option<String>> {
        self.record(format!("get_existing_public_ip {}", name));
        Ok(self
            .ips
            .lock()
            .unwrap()
            .get(&(resource_group.to_string(), name.to_string()))
            .cloned())
    }

    async fn disk_exists(&self, config: &DeployConfig, image_path: &Path) -> Result<bool> {
        self.record("disk_exists");
        Ok(self.disks.lock().unwrap().contains(&config.vm.disk_name(image_path)))
    }

    async fn create_disk(&self, config: &DeployConfig, image_path: &Path) -> Result<String> {
        let name = config.vm.disk_name(image_path);
        self.record(format!("create_disk {}", name));
        self.disks.lock().unwrap().insert(name.clone());
        Ok(name)
    }

    async fn grant_disk_access(&self, _config: &DeployConfig, _image_path: &Path) -> Result<String> {
        self.record("grant_disk_access");
        Ok("https://example.invalid/disk?sig=x".to_string())
    }

    async fn copy_disk(&self, _image_path: &Path, _access_uri: &str, _show_logs: bool) -> Result<()> {
        self.record("copy_disk");
        Ok(())
    }

    async fn revoke_disk_access(&self, _config: &DeployConfig, _image_path: &Path) -> Result<()> {
        self.record("revoke_disk_access");
        Ok(())
    }

    async fn upload_disk(&self, _config: &DeployConfig, _image_path: &Path) -> Result<()> {
        self.record("upload_disk");
        Ok(())
    }

    async fn delete_disk(&self, _resource_group: &str, disk_name: &str, _location: &str) -> Result<()> {
        self.record(format!("delete_disk {}", disk_name));
        self.disks.lock().unwrap().remove(disk_name);
        Ok(())
    }

    async fn create_nsg(&self, config: &DeployConfig) -> Result<()> {
        self.record(format!("create_nsg {}", config.vm.nsg_name));
        Ok(())
    }

    async fn add_nsg_rule(&self, _config: &DeployConfig, rule: &NsgRule) -> Result<()> {
        self.record(format!("add_nsg_rule {}", rule.name));
        Ok(())
    }

    async fn create_data_disk(&self, disk: &DataDisk, _show_logs: bool) -> Result<()> {
        self.record(format!("create_data_disk {} {}", disk.name, disk.size_gb));
        Ok(())
    }

    async fn attach_data_disk(
        &self,
        _resource_group: &str,
        _vm_name: &str,
        disk_name: &str,
        _zone: &str,
        lun: u32,
        _show_logs: bool,
    ) -> Result<()> {
        self.record(format!("attach_data_disk {} {}", disk_name, lun));
        Ok(())
    }

    fn attaches_data_disk_at_create(&self) -> bool {
        self.provider == CloudProvider::Gcp
    }

    async fn create_vm(&self, request: CreateVm<'_>) -> Result<()> {
        self.record(format!(
            "create_vm {} boot={} ip={}/{} data={}",
            request.config.vm.name,
            request.boot_disk,
            request.ip.resource_group,
            request.ip.name,
            request.data_disk.unwrap_or("-")
        ));
        Ok(())
    }

    async fn get_vm_ip(&self, _vm_name: &str, _resource_group: &str, _location: &str) -> Result<Option<String>> {
        self.record("get_vm_ip");
        Ok(self.vm_ip.clone())
    }

    async fn delete_vm(&self, vm_name: &str, _resource_group: &str, _location: &str) -> Result<()> {
        self.record(format!("delete_vm {}", vm_name));
        Ok(())
    }
}
