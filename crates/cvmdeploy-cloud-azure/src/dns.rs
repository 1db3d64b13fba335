//! Azure DNS zone management
//!
//! Azure DNS is the single DNS owner. GCP deployments are handed this
//! manager too.

use crate::az::AzCli;
use async_trait::async_trait;
use cvmdeploy_cloud::{DnsManager, DomainConfig, Result};
use serde::Deserialize;

/// A record set as returned by `az network dns record-set a show`
#[derive(Debug, Default, Deserialize)]
struct RecordSet {
    #[serde(rename = "aRecords", alias = "ARecords", alias = "arecords", default)]
    a_records: Vec<ARecord>,
}

#[derive(Debug, Deserialize)]
struct ARecord {
    #[serde(rename = "ipv4Address")]
    ipv4_address: String,
}

/// A-record manager backed by the Azure CLI
#[derive(Debug, Clone, Default)]
pub struct AzureDns {
    cli: AzCli,
}

impl AzureDns {
    pub fn new() -> Self {
        Self { cli: AzCli::new() }
    }
}

fn record_set_args<'a>(verb: &'a str, domain: &'a DomainConfig) -> Vec<&'a str> {
    vec![
        "network",
        "dns",
        "record-set",
        "a",
        verb,
        "--resource-group",
        &domain.resource_group,
        "--zone-name",
        &domain.name,
        "--record-set-name",
        &domain.record,
    ]
}

/// IPs in a record-set JSON document
fn parse_record_set(json: &str) -> serde_json::Result<Vec<String>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let set: RecordSet = serde_json::from_str(json)?;
    Ok(set.a_records.into_iter().map(|r| r.ipv4_address).collect())
}

#[async_trait]
impl DnsManager for AzureDns {
    async fn get_a_records(&self, domain: &DomainConfig) -> Result<Vec<String>> {
        let mut args = record_set_args("show", domain);
        args.extend(["-o", "json"]);

        match self.cli.az(&args).await {
            Ok(output) => Ok(parse_record_set(&output)?),
            Err(e) if e.is_not_found() => {
                tracing::debug!("No A record set for {}", domain.fqdn());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        let mut args = record_set_args("remove-record", domain);
        args.extend(["--ipv4-address", ip_address, "--keep-empty-record-set"]);
        self.cli.az(&args).await?;
        tracing::info!("Removed {} from {}", ip_address, domain.fqdn());
        Ok(())
    }

    async fn add_a_record(&self, domain: &DomainConfig, ip_address: &str) -> Result<()> {
        let mut args = record_set_args("add-record", domain);
        args.extend(["--ipv4-address", ip_address]);
        self.cli.az(&args).await?;
        tracing::info!("Added {} to {}", ip_address, domain.fqdn());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_set_current_cli() {
        let json = r#"{
            "name": "node-1",
            "aRecords": [{"ipv4Address": "203.0.113.5"}, {"ipv4Address": "198.51.100.7"}],
            "ttl": 3600
        }"#;
        assert_eq!(
            parse_record_set(json).unwrap(),
            vec!["203.0.113.5", "198.51.100.7"]
        );
    }

    #[test]
    fn test_parse_record_set_legacy_key_and_empty() {
        let json = r#"{"ARecords": [{"ipv4Address": "203.0.113.5"}]}"#;
        assert_eq!(parse_record_set(json).unwrap(), vec!["203.0.113.5"]);

        assert!(parse_record_set(r#"{"name": "node-1"}"#).unwrap().is_empty());
        assert!(parse_record_set("").unwrap().is_empty());
    }

    #[test]
    fn test_record_set_args() {
        let domain = DomainConfig::new("metrics.node-1", "seismictest.net", "yocto-testnet");
        let args = record_set_args("add-record", &domain);
        assert_eq!(args[4], "add-record");
        assert!(args.windows(2).any(|w| w == ["--record-set-name", "metrics.node-1"]));
        assert!(args.windows(2).any(|w| w == ["--zone-name", "seismictest.net"]));
    }
}
