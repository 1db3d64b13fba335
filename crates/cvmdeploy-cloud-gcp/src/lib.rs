//! Google Cloud provider for cvmdeploy
//!
//! Implements [`cvmdeploy_cloud::CloudApi`] with the `gcloud` and `gsutil`
//! CLIs. TDX confidential instances need an image imported with the `TDX`
//! guest-OS feature, so boot disks are created from Cloud Storage uploads.
//!
//! DNS is not managed here. The [`GcpApi`] is constructed with the
//! deployment's DNS owner and delegates every record operation to it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cvmdeploy_cloud_azure::AzureDns;
//! use cvmdeploy_cloud_gcp::GcpApi;
//!
//! let api = GcpApi::new(Arc::new(AzureDns::new())).with_zone("us-central1-a")?;
//! ```

pub mod error;
pub mod gcloud;
pub mod provider;

pub use error::{GcpError, Result};
pub use gcloud::{Gcloud, region_of_zone, resource_name};
pub use provider::GcpApi;
