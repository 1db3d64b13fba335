//! Provider dispatch
//!
//! The provider set is closed: each [`CloudProvider`] maps to one
//! implementation. Azure DNS owns every record, so both implementations get
//! the same [`AzureDns`] manager.

use crate::error::Result;
use cvmdeploy_cloud::{CloudApi, CloudProvider, DnsManager};
use cvmdeploy_cloud_azure::{AzureApi, AzureDns};
use cvmdeploy_cloud_gcp::GcpApi;
use std::sync::Arc;

/// The DNS owner shared by every provider
pub fn dns_manager() -> Arc<dyn DnsManager> {
    Arc::new(AzureDns::new())
}

/// Implementation for `provider`. `location` is the Azure region or GCP zone.
pub fn cloud_api(provider: CloudProvider, location: &str) -> Result<Box<dyn CloudApi>> {
    let dns = dns_manager();
    let api: Box<dyn CloudApi> = match provider {
        CloudProvider::Azure => Box::new(AzureApi::with_dns(dns)),
        CloudProvider::Gcp => Box::new(GcpApi::new(dns).with_zone(location)?),
    };
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_matches_provider() {
        for provider in CloudProvider::ALL {
            let location = match provider {
                CloudProvider::Azure => "eastus2",
                CloudProvider::Gcp => "us-central1-a",
            };
            let api = cloud_api(provider, location).unwrap();
            assert_eq!(api.provider(), provider);
        }
    }

    #[test]
    fn test_gcp_needs_a_zone() {
        assert!(cloud_api(CloudProvider::Gcp, "us-central1").is_err());
    }
}
