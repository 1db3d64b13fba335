//! VM teardown
//!
//! Deletes the VM and its boot disk, then forgets it. The persistent data
//! disk is left in place so a redeploy finds its state again.

use crate::error::{DeployError, Result};
use crate::metadata::{MetadataStore, VmRecord};
use crate::providers;
use cvmdeploy_cloud::{CloudApi, VmConfig};
use std::path::Path;

/// Record of `vm_name` from whichever provider bucket holds it
pub fn find_vm(store: &MetadataStore, vm_name: &str) -> Result<VmRecord> {
    store
        .load()?
        .find_vm(vm_name)
        .map(|(_, record)| record.clone())
        .ok_or_else(|| DeployError::VmNotFound(vm_name.to_string()))
}

/// Delete `vm_name` on the provider recorded in the metadata
pub async fn delete_vm(vm_name: &str, home: &Path) -> Result<()> {
    let store = MetadataStore::for_home(home);
    let record = find_vm(&store, vm_name)?;
    let api = providers::cloud_api(record.vm.cloud, record.vm.location())?;
    delete_recorded_vm(api.as_ref(), &store, vm_name, &record).await
}

pub async fn delete_recorded_vm(
    api: &dyn CloudApi,
    store: &MetadataStore,
    vm_name: &str,
    record: &VmRecord,
) -> Result<()> {
    let vm = &record.vm;
    api.delete_vm(vm_name, &vm.resource_group, vm.location()).await?;

    let boot_disk = VmConfig::boot_disk_name(vm_name, &record.artifact);
    if let Err(e) = api
        .delete_disk(&vm.resource_group, &boot_disk, vm.location())
        .await
    {
        tracing::warn!("Could not delete boot disk {}: {}", boot_disk, e);
    }

    if let Some(data_disk) = &record.data_disk {
        tracing::info!("Keeping persistent data disk {}", data_disk);
    }

    store.remove_vm(vm_name).await?;
    tracing::info!("Deleted VM {} ({})", vm_name, vm.cloud);
    Ok(())
}
