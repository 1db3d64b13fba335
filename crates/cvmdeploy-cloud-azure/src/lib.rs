//! Azure provider for cvmdeploy
//!
//! Implements [`cvmdeploy_cloud::CloudApi`] on top of the Azure CLI and owns
//! DNS for every deployment through [`AzureDns`].
//!
//! # Requirements
//!
//! - `az` installed and logged in (`az login`)
//! - `azcopy` installed, used for the page-blob image upload
//!
//! # Example
//!
//! ```ignore
//! use cvmdeploy_cloud::CloudApi;
//! use cvmdeploy_cloud_azure::AzureApi;
//!
//! let api = AzureApi::new();
//! api.check_dependencies().await?;
//! let ip = api.get_existing_public_ip("genesis-node-1", "tdx-testnet").await?;
//! ```

pub mod az;
pub mod dns;
pub mod error;
pub mod provider;

pub use az::AzCli;
pub use dns::AzureDns;
pub use error::{AzureError, Result};
pub use provider::AzureApi;
