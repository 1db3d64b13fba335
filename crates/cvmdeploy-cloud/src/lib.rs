//! Cloud provider contract for confidential VM deployments
//!
//! This crate defines what a cloud backend must provide so the deployer can
//! provision a TDX confidential VM without knowing which cloud it talks to.
//!
//! # Supported Providers
//!
//! - **Azure**: resource groups, NSGs, managed disks (via `az` / `azcopy`)
//! - **GCP**: projects, VPC firewall rules, image import (via `gcloud` / `gsutil`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 cvm CLI / Deployer               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                cvmdeploy-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │         trait CloudApi { ... }            │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  DnsManager  │  │  NSG rules   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │     azure     │ │      gcp      │
//! │ (+ DNS owner) │ │ (DNS via az)  │
//! └───────────────┘ └───────────────┘
//! ```

pub mod config;
pub mod dns;
pub mod error;
pub mod firewall;
pub mod provider;
pub mod user_data;
pub mod wait;

// Re-exports
pub use config::{
    DEFAULT_API_PORT, DEFAULT_CLIENT_PROXY_PORT, DeployConfig, DomainConfig, PublicIpRef, VmConfig,
};
pub use dns::{DnsChange, DnsManager, converge_a_record};
pub use error::{CloudError, Result};
pub use firewall::{CONSENSUS_PORT, NsgRule, Protocol, standard_rules};
pub use provider::{
    CloudApi, CloudProvider, CreateVm, DATA_DISK_LUN, DATA_DISK_SIZE_GB, DataDisk,
};
pub use user_data::UserDataFile;
pub use wait::{OperationStatus, WaitConfig, wait_for_operation};
