//! DNS A-record management
//!
//! Exactly one backend owns DNS. Every `CloudApi` implementation is handed
//! that backend as a [`DnsManager`] and delegates to it.

use crate::config::DomainConfig;
use crate::error::Result;
use async_trait::async_trait;

/// A-record operations on the designated DNS zone
#[async_trait]
pub trait DnsManager: Send + Sync {
    /// IPs currently in the record set (empty if the set does not exist)
    async fn get_a_records(&self, domain: &DomainConfig) -> Result<Vec<String>>;

    async fn remove_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()>;

    async fn add_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()>;
}

/// What a convergence pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsChange {
    pub removed: Vec<String>,
    pub added: bool,
}

/// Point `domain` at `ip_address`.
///
/// With `remove_old`, every other address in the record set is removed
/// first. The new address is only added when it is not already present, so
/// re-running against a converged record is a no-op.
pub async fn converge_a_record(
    dns: &dyn DnsManager,
    domain: &DomainConfig,
    ip_address: &str,
    remove_old: bool,
) -> Result<DnsChange> {
    let existing = dns.get_a_records(domain).await?;
    let mut change = DnsChange::default();

    if remove_old {
        for stale in existing.iter().filter(|ip| !ip.is_empty() && *ip != ip_address) {
            tracing::info!("Removing stale A record {} -> {}", domain.fqdn(), stale);
            dns.remove_a_record(domain, stale).await?;
            change.removed.push(stale.clone());
        }
    }

    if existing.iter().any(|ip| ip == ip_address) {
        tracing::debug!("A record {} already points at {}", domain.fqdn(), ip_address);
    } else {
        tracing::info!("Adding A record {} -> {}", domain.fqdn(), ip_address);
        dns.add_a_record(domain, ip_address).await?;
        change.added = true;
    }

    Ok(change)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryDns {
        records: Mutex<HashMap<String, Vec<String>>>,
    }

    #[async_trait]
    impl DnsManager for MemoryDns {
        async fn get_a_records(&self, domain: &DomainConfig) -> Result<Vec<String>> {
            let records = self.records.lock().unwrap();
            Ok(records.get(&domain.fqdn()).cloned().unwrap_or_default())
        }

        async fn remove_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            if let Some(ips) = records.get_mut(&domain.fqdn()) {
                ips.retain(|ip| ip != ip_address);
            }
            Ok(())
        }

        async fn add_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
            let mut records = self.records.lock().unwrap();
            records
                .entry(domain.fqdn())
                .or_default()
                .push(ip_address.to_string());
            Ok(())
        }
    }

    fn domain() -> DomainConfig {
        DomainConfig::new("node-1", "seismictest.net", "yocto-testnet")
    }

    #[tokio::test]
    async fn test_converge_replaces_stale_addresses() {
        let dns = MemoryDns::default();
        dns.records.lock().unwrap().insert(
            domain().fqdn(),
            vec!["198.51.100.1".into(), "198.51.100.2".into()],
        );

        let change = converge_a_record(&dns, &domain(), "203.0.113.5", true)
            .await
            .unwrap();

        assert_eq!(change.removed, vec!["198.51.100.1", "198.51.100.2"]);
        assert!(change.added);
        assert_eq!(
            dns.get_a_records(&domain()).await.unwrap(),
            vec!["203.0.113.5"]
        );
    }

    #[tokio::test]
    async fn test_converge_is_idempotent() {
        let dns = MemoryDns::default();
        converge_a_record(&dns, &domain(), "203.0.113.5", true)
            .await
            .unwrap();

        let second = converge_a_record(&dns, &domain(), "203.0.113.5", true)
            .await
            .unwrap();

        assert_eq!(second, DnsChange::default());
        assert_eq!(dns.get_a_records(&domain()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_converge_keeps_old_addresses_when_asked() {
        let dns = MemoryDns::default();
        dns.records
            .lock()
            .unwrap()
            .insert(domain().fqdn(), vec!["198.51.100.1".into()]);

        let change = converge_a_record(&dns, &domain(), "203.0.113.5", false)
            .await
            .unwrap();

        assert!(change.removed.is_empty());
        assert_eq!(dns.get_a_records(&domain()).await.unwrap().len(), 2);
    }
}
