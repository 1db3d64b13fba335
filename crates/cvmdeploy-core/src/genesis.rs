//! Stable public IPs for genesis nodes
//!
//! The cloud's named static-IP resource is the only record: node `n` owns
//! `genesis-node-{n}` in the IP resource group, and that name is never
//! reused for another node.

use crate::confirm::Confirm;
use crate::error::{DeployError, Result};
use cvmdeploy_cloud::CloudApi;
use cvmdeploy_config::GENESIS_IP_PREFIX;

/// Name of the IP resource held by genesis node `node`
pub fn node_ip_name(node: u32) -> String {
    format!("{}-{}", GENESIS_IP_PREFIX, node)
}

pub struct GenesisIpManager<'a> {
    api: &'a dyn CloudApi,
    ip_resource_group: String,
    confirm: &'a dyn Confirm,
}

impl<'a> GenesisIpManager<'a> {
    pub fn new(
        api: &'a dyn CloudApi,
        ip_resource_group: impl Into<String>,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            api,
            ip_resource_group: ip_resource_group.into(),
            confirm,
        }
    }

    pub fn ip_resource_group(&self) -> &str {
        &self.ip_resource_group
    }

    /// Existing IP of `node`, or a new one after confirmation.
    ///
    /// Returns `(ip, ip_resource_name)`.
    pub async fn get_or_create_node_ip(&self, node: u32, region: &str) -> Result<(String, String)> {
        self.api
            .ensure_created_resource_group(&self.ip_resource_group, region)
            .await?;

        let ip_name = node_ip_name(node);
        if let Some(ip) = self
            .api
            .get_existing_public_ip(&ip_name, &self.ip_resource_group)
            .await?
        {
            tracing::info!("Using existing IP {} for node {}", ip, node);
            return Ok((ip, ip_name));
        }

        tracing::info!("Creating new IP for node {}", node);
        let action = format!("create new IP for node {} @ {}", node, ip_name);
        if !self.confirm.confirm(&format!("Are you sure you want to {}?", action)) {
            return Err(DeployError::Aborted(action));
        }

        let ip = self
            .api
            .create_public_ip(&ip_name, &self.ip_resource_group, region)
            .await?;
        tracing::info!("Created IP {} for node {}", ip, node);
        Ok((ip, ip_name))
    }
}
