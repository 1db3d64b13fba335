//! Public IP detection for the SSH allow rule

use crate::error::{ConfigError, Result};
use std::net::IpAddr;
use std::time::Duration;

const LOOKUP_URL: &str = "https://api.ipify.org";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// This machine's public IPv4/IPv6 address, as seen from the internet
pub async fn detect_public_ip() -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(LOOKUP_TIMEOUT)
        .build()
        .map_err(|e| ConfigError::SourceIpLookup(e.to_string()))?;

    let response = client
        .get(LOOKUP_URL)
        .header("User-Agent", "cvmdeploy")
        .send()
        .await
        .map_err(|e| ConfigError::SourceIpLookup(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ConfigError::SourceIpLookup(format!(
            "{} returned {}",
            LOOKUP_URL,
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ConfigError::SourceIpLookup(e.to_string()))?;
    let ip = parse_ip(&body)?;
    tracing::debug!("Detected public IP {}", ip);
    Ok(ip)
}

fn parse_ip(body: &str) -> Result<String> {
    let trimmed = body.trim();
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| ConfigError::SourceIpLookup(format!("unexpected response: {:?}", trimmed)))
}
