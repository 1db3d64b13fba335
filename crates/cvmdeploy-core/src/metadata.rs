//! Deploy metadata store
//!
//! A single JSON document records every deployed VM, keyed by provider and
//! then by VM name:
//!
//! ```json
//! { "resources": { "azure": { "node-1": { "artifact": "...", "public_ip": "...",
//!     "domain": { ... }, "vm": { ... }, "data_disk": "node-1-persistent" } },
//!   "gcp": {} } }
//! ```
//!
//! Every mutation runs as a transaction: take the lock file, load the
//! document, mutate it in memory, write it to a temp file and rename it
//! over the original. The previous document is kept as `.backup`.

use crate::error::{DeployError, Result};
use cvmdeploy_cloud::{CloudError, CloudProvider, DomainConfig, VmConfig};
use cvmdeploy_config::BuildPaths;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;

/// A lock file older than this is left over from a killed process
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

const LOCK_RETRIES: u32 = 50;
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// `domain` entry of a VM record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainRecord {
    pub url: String,
    pub record: String,
    pub name: String,
    pub resource_group: String,
}

impl From<&DomainConfig> for DomainRecord {
    fn from(domain: &DomainConfig) -> Self {
        Self {
            url: domain.url(),
            record: domain.record.clone(),
            name: domain.name.clone(),
            resource_group: domain.resource_group.clone(),
        }
    }
}

/// One deployed VM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmRecord {
    /// Artifact filename the VM booted from
    #[serde(default)]
    pub artifact: String,
    #[serde(default)]
    pub public_ip: String,
    #[serde(default)]
    pub domain: DomainRecord,
    pub vm: VmConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_disk: Option<String>,
}

/// The whole metadata file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub resources: BTreeMap<String, BTreeMap<String, VmRecord>>,

    /// Build records keyed by artifact filename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Map<String, Value>>,

    /// Keys written by other tools, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataDocument {
    /// Document with an empty bucket per provider
    pub fn initial() -> Self {
        let mut doc = Self::default();
        doc.ensure_buckets();
        doc
    }

    pub fn ensure_buckets(&mut self) {
        for cloud in CloudProvider::ALL {
            self.resources.entry(cloud.to_string()).or_default();
        }
    }

    /// Insert or replace a single VM entry, leaving every other entry alone
    pub fn upsert(&mut self, cloud: CloudProvider, vm_name: &str, record: VmRecord) {
        self.ensure_buckets();
        self.resources
            .entry(cloud.to_string())
            .or_default()
            .insert(vm_name.to_string(), record);
    }

    /// First bucket holding `vm_name`
    pub fn find_vm(&self, vm_name: &str) -> Option<(&str, &VmRecord)> {
        self.resources.iter().find_map(|(cloud, vms)| {
            vms.get(vm_name).map(|record| (cloud.as_str(), record))
        })
    }

    /// Remove `vm_name` from whichever bucket holds it
    pub fn remove_vm(&mut self, vm_name: &str) -> Option<VmRecord> {
        self.resources
            .values_mut()
            .find_map(|vms| vms.remove(vm_name))
    }

    pub fn remove_artifact(&mut self, artifact: &str) -> bool {
        self.artifacts
            .as_mut()
            .is_some_and(|artifacts| artifacts.remove(artifact).is_some())
    }

    /// VMs whose recorded `vm.cloud` is `cloud`, whatever bucket they sit in
    pub fn filter_by_cloud(&self, cloud: CloudProvider) -> BTreeMap<String, VmRecord> {
        self.resources
            .values()
            .flat_map(|vms| vms.iter())
            .filter(|(_, record)| record.vm.cloud == cloud)
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    /// `"{vm} ({cloud})"` for every VM booted from `artifact`
    pub fn deployments_of(&self, artifact: &str) -> Vec<String> {
        self.resources
            .iter()
            .flat_map(|(cloud, vms)| {
                vms.iter()
                    .filter(|(_, record)| record.artifact == artifact)
                    .map(move |(name, _)| format!("{} ({})", name, cloud))
            })
            .collect()
    }
}

/// File-backed metadata store
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<home>/deploy/deploy_metadata.json`
    pub fn for_home(home: &Path) -> Self {
        Self::new(BuildPaths::new(home).deploy_metadata())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "backup")
    }

    /// Read the document. A missing or malformed file is an error.
    pub fn load(&self) -> Result<MetadataDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DeployError::MetadataNotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(|source| DeployError::MalformedMetadata {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the initial document unless a file already exists.
    ///
    /// Returns whether a file was created.
    pub async fn create_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        let _lock = MetadataLock::acquire(self.lock_path()).await?;
        if self.path.exists() {
            return Ok(false);
        }
        tracing::info!("Creating deploy metadata at {}", self.path.display());
        self.write(&MetadataDocument::initial())?;
        Ok(true)
    }

    /// Replace the whole file atomically
    pub fn write(&self, doc: &MetadataDocument) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut json = serde_json::to_string_pretty(doc)?;
        json.push('\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        tmp.persist(&self.path).map_err(|e| DeployError::Io(e.error))?;
        tracing::debug!("Wrote deploy metadata to {}", self.path.display());
        Ok(())
    }

    /// Load, mutate and write back under the lock file
    pub async fn transaction<T>(
        &self,
        mutate: impl FnOnce(&mut MetadataDocument) -> T,
    ) -> Result<T> {
        let _lock = MetadataLock::acquire(self.lock_path()).await?;
        let mut doc = self.load()?;
        let out = mutate(&mut doc);
        self.write(&doc)?;
        Ok(out)
    }

    pub async fn upsert(&self, cloud: CloudProvider, vm_name: &str, record: VmRecord) -> Result<()> {
        self.transaction(|doc| doc.upsert(cloud, vm_name, record)).await
    }

    pub async fn remove_vm(&self, vm_name: &str) -> Result<Option<VmRecord>> {
        self.transaction(|doc| doc.remove_vm(vm_name)).await
    }

    pub async fn remove_artifact(&self, artifact: &str) -> Result<bool> {
        self.transaction(|doc| doc.remove_artifact(artifact)).await
    }

    pub fn filter_by_cloud(&self, cloud: CloudProvider) -> Result<BTreeMap<String, VmRecord>> {
        Ok(self.load()?.filter_by_cloud(cloud))
    }
}

/// `deploy_metadata.json` -> `deploy_metadata.json.{suffix}`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive lock file, removed on drop
#[derive(Debug)]
struct MetadataLock {
    path: PathBuf,
}

impl MetadataLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        for _ in 0..LOCK_RETRIES {
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(mut file) => {
                    let lock = Self { path };
                    file.write_all(format!("{}\n", std::process::id()).as_bytes())
                        .await?;
                    tracing::debug!("Acquired metadata lock {}", lock.path.display());
                    return Ok(lock);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        tracing::warn!("Removing stale metadata lock {}", path.display());
                        match tokio::fs::remove_file(&path).await {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CloudError::Lock(format!(
            "{} is held by another process; remove it if no deploy is running",
            path.display()
        ))
        .into())
    }
}

impl Drop for MetadataLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove metadata lock {}: {}", self.path.display(), e);
        }
    }
}

async fn is_stale(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > LOCK_STALE_AFTER)
}
