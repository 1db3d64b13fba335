//! Deployment orchestration for TDX confidential VMs
//!
//! Drives a [`cvmdeploy_cloud::CloudApi`] implementation through the
//! provisioning pipeline and keeps the deploy metadata in sync:
//!
//! - [`artifact`]: image filenames, build timestamps and local files
//! - [`metadata`]: the `deploy_metadata.json` store
//! - [`genesis`]: persistent per-node public IPs
//! - [`deployer`]: the ordered, re-runnable provisioning pipeline
//! - [`pipeline`]: single-VM and genesis flows on top of the deployer
//! - [`teardown`]: VM deletion
//! - [`providers`]: provider dispatch

pub mod artifact;
pub mod confirm;
pub mod deployer;
pub mod error;
pub mod genesis;
pub mod metadata;
pub mod pipeline;
pub mod providers;
pub mod teardown;

pub use artifact::{
    DeleteOutcome, artifact_timestamp, delete_artifact, find_latest_image, list_artifacts,
    parse_artifact,
};
pub use confirm::{AutoConfirm, Confirm, StdinConfirm};
pub use deployer::{
    DeployOutput, Deployer, ImageDeployment, ProxyClient, deploy_image, start_proxy_server,
};
pub use error::{DeployError, Result};
pub use genesis::{GenesisIpManager, node_ip_name};
pub use metadata::{DomainRecord, MetadataDocument, MetadataStore, VmRecord};
pub use pipeline::{
    GenesisPayload, GenesisReport, GenesisRequest, deploy_genesis_node, deploy_single,
    enclave_args, genesis_record, genesis_vm_config,
};
pub use providers::cloud_api;
pub use teardown::delete_vm;
