mod common;

use common::TestHome;
use cvmdeploy_cloud::{CloudProvider, DomainConfig, VmConfig};
use cvmdeploy_core::{
    AutoConfirm, DeleteOutcome, DomainRecord, MetadataStore, VmRecord, artifact_timestamp,
    delete_artifact, find_latest_image, list_artifacts, parse_artifact,
};
use std::fs;
use std::time::{Duration, SystemTime};

const TS: &str = "20250110120000";

#[test]
fn test_timestamp_resolves_to_dev_artifact() {
    let home = TestHome::new();
    home.write_artifact("seismic-dev-azure-20250110120000.vhd");

    let name = parse_artifact(TS, Some(&home.path()), true).unwrap();
    assert_eq!(name, "seismic-dev-azure-20250110120000.vhd");
    assert_eq!(artifact_timestamp(&name).unwrap(), 1_736_510_400);
}

#[test]
fn test_timestamp_resolution_preferences() {
    let home = TestHome::new();
    home.write_artifact("seismic-dev-azure-20250110120000.vhd");
    home.write_artifact("seismic-gcp-20250110120000.tar.gz");
    home.write_artifact("seismic-azure-20250110120000.vhd");
    home.write_artifact("seismic-azure-20250110120000.vhd.sha256");

    // non-dev wins without --dev, .vhd wins over .tar.gz
    assert_eq!(
        parse_artifact(TS, Some(&home.path()), false).unwrap(),
        "seismic-azure-20250110120000.vhd"
    );
    assert_eq!(
        parse_artifact(TS, Some(&home.path()), true).unwrap(),
        "seismic-dev-azure-20250110120000.vhd"
    );
}

#[test]
fn test_dev_falls_back_to_release_build() {
    let home = TestHome::new();
    home.write_artifact("seismic-gcp-20250110120000.tar.gz");
    assert_eq!(
        parse_artifact(TS, Some(&home.path()), true).unwrap(),
        "seismic-gcp-20250110120000.tar.gz"
    );
}

#[test]
fn test_unknown_timestamp_uses_legacy_name() {
    let home = TestHome::new();
    fs::create_dir_all(home.artifacts()).unwrap();
    assert_eq!(
        parse_artifact("20241202202935", Some(&home.path()), false).unwrap(),
        "cvm-image-azure-tdx.rootfs-20241202202935.wic.vhd"
    );
}

#[test]
fn test_latest_image_by_mtime() {
    let home = TestHome::new();
    let older = home.write_artifact("seismic-azure-20250201000000.vhd");
    let newer = home.write_artifact("seismic-azure-20250101000000.vhd");
    home.write_artifact("seismic-dev-azure-20250301000000.vhd");

    let past = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&older)
        .unwrap()
        .set_modified(past)
        .unwrap();

    assert_eq!(
        find_latest_image(&home.path(), CloudProvider::Azure, false).unwrap(),
        newer
    );
    assert!(find_latest_image(&home.path(), CloudProvider::Gcp, false).is_err());
}

#[test]
fn test_list_newest_first() {
    let home = TestHome::new();
    home.write_artifact("seismic-gcp-20250101000000.tar.gz");
    home.write_artifact("seismic-dev-gcp-20250301000000.tar.gz");
    home.write_artifact("seismic-azure-20250201000000.vhd");

    assert_eq!(
        list_artifacts(&home.path(), CloudProvider::Gcp).unwrap(),
        vec![
            "seismic-dev-gcp-20250301000000.tar.gz",
            "seismic-gcp-20250101000000.tar.gz"
        ]
    );
}

async fn deployed_home(artifact: &str) -> TestHome {
    let home = TestHome::new();
    home.write_artifact(artifact);
    home.write_artifact(&format!("{}.measurements.json", artifact));
    home.write_artifact("seismic-azure-20250202000000.vhd");

    let store = MetadataStore::for_home(&home.path());
    store.create_if_missing().await.unwrap();
    let mut artifacts = serde_json::Map::new();
    artifacts.insert(artifact.to_string(), serde_json::json!({ "image": {} }));
    store
        .transaction(|doc| doc.artifacts = Some(artifacts))
        .await
        .unwrap();
    store
        .upsert(
            CloudProvider::Azure,
            "node-1",
            VmRecord {
                artifact: artifact.to_string(),
                public_ip: "192.0.2.1".to_string(),
                domain: DomainRecord::from(&DomainConfig::new("node-1", "seismictest.net", "yocto-testnet")),
                vm: VmConfig::new(CloudProvider::Azure, "node-1", "eastus2", "Standard_DC4es_v6"),
                data_disk: None,
            },
        )
        .await
        .unwrap();
    home
}

#[tokio::test]
async fn test_declined_delete_changes_nothing() {
    let artifact = "seismic-azure-20250110120000.vhd";
    let home = deployed_home(artifact).await;
    let before = fs::read_to_string(home.metadata_path()).unwrap();

    let outcome = delete_artifact(artifact, &home.path(), &AutoConfirm(false))
        .await
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Declined);
    assert_eq!(fs::read_dir(home.artifacts()).unwrap().count(), 3);
    assert_eq!(fs::read_to_string(home.metadata_path()).unwrap(), before);
}

#[tokio::test]
async fn test_accepted_delete_removes_matching_files() {
    let artifact = "seismic-azure-20250110120000.vhd";
    let home = deployed_home(artifact).await;

    let outcome = delete_artifact(artifact, &home.path(), &AutoConfirm(true))
        .await
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted(2));
    let left: Vec<_> = fs::read_dir(home.artifacts())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(left, vec!["seismic-azure-20250202000000.vhd"]);

    let doc = MetadataStore::for_home(&home.path()).load().unwrap();
    assert!(doc.artifacts.unwrap().is_empty());
    // deployed VMs are not touched
    assert!(doc.resources["azure"].contains_key("node-1"));
}

#[tokio::test]
async fn test_delete_without_files() {
    let home = TestHome::new();
    fs::create_dir_all(home.artifacts()).unwrap();
    MetadataStore::for_home(&home.path())
        .create_if_missing()
        .await
        .unwrap();

    let outcome = delete_artifact(
        "seismic-azure-20250110120000.vhd",
        &home.path(),
        &AutoConfirm(true),
    )
    .await
    .unwrap();
    assert_eq!(outcome, DeleteOutcome::NoFilesFound);
}
