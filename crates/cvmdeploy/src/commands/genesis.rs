use crate::args::{ArtifactArgs, CloudArgs};
use colored::Colorize;
use cvmdeploy_cloud::DeployConfig;
use cvmdeploy_config::validate_region;
use cvmdeploy_core::pipeline::{SSH_KEY_PLACEHOLDER, default_ssh_key_path, read_ssh_key};
use cvmdeploy_core::{
    AutoConfirm, Confirm, GenesisPayload, GenesisReport, GenesisRequest, StdinConfirm, cloud_api,
    deploy_genesis_node, enclave_args, genesis_record, genesis_vm_config,
};
use std::path::Path;

/// Config port of a freshly booted node
const CONFIG_PORT: u16 = 8080;

pub struct GenesisOptions {
    pub name: Option<String>,
    pub peers: Vec<String>,
    pub ip_only: bool,
    pub yes: bool,
    pub dev: bool,
    pub show_logs: bool,
}

pub async fn handle(
    home: &Path,
    nodes: &[u32],
    cloud: &CloudArgs,
    artifact: &ArtifactArgs,
    options: &GenesisOptions,
) -> anyhow::Result<()> {
    let image_path = if options.ip_only {
        None
    } else {
        Some(artifact.require_image_path(home, cloud.cloud)?)
    };
    let confirm: Box<dyn Confirm> = if options.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(StdinConfirm)
    };

    let region = cloud.region();
    let resource_group = cloud.resource_group();
    validate_region(cloud.cloud, &region)?;
    let source_ip = cloud.source_ip().await?;
    let configs = genesis_configs(cloud, nodes, options, &source_ip)?;
    let api = cloud_api(cloud.cloud, &region)?;

    println!(
        "{} {} genesis node(s) on {} ({})",
        "Deploying".blue().bold(),
        nodes.len(),
        cloud.cloud,
        region
    );
    if options.dev {
        println!("  {}", "Using dev artifacts".dimmed());
    }

    for (node, config) in configs {
        let request = GenesisRequest {
            node,
            config,
            image_path: image_path.clone(),
            ip_resource_group: resource_group.clone(),
            ip_only: options.ip_only,
            peers: options.peers.clone(),
            home: home.to_path_buf(),
        };
        let report = deploy_genesis_node(api.as_ref(), &request, confirm.as_ref()).await?;
        print_report(&request, &report)?;
    }
    Ok(())
}

/// One validated configuration per node, all sharing `source_ip`
fn genesis_configs(
    cloud: &CloudArgs,
    nodes: &[u32],
    options: &GenesisOptions,
    source_ip: &str,
) -> anyhow::Result<Vec<(u32, DeployConfig)>> {
    let region = cloud.region();
    let resource_group = cloud.resource_group();
    nodes
        .iter()
        .map(|&node| {
            let vm = genesis_vm_config(
                cloud.cloud,
                node,
                &resource_group,
                &region,
                &cloud.vm_size(),
                options.name.as_deref(),
            );
            let record = genesis_record(cloud.cloud, node);
            let config = cloud.config_for(vm, &record, source_ip, options.show_logs)?;
            Ok((node, config))
        })
        .collect()
}

fn print_report(request: &GenesisRequest, report: &GenesisReport) -> anyhow::Result<()> {
    println!();
    println!("{}", "=".repeat(60).green());
    println!("{}", "DEPLOYMENT COMPLETE".green().bold());
    println!("{}", "=".repeat(60).green());
    println!("  Node:      {}", report.node.to_string().cyan());
    println!("  Public IP: {} ({})", report.ip.cyan(), report.ip_name);
    println!("  Domain:    {}", report.domain.fqdn().cyan());

    let Some(output) = &report.output else {
        println!("  {}", "IP and DNS reserved, no VM created".yellow());
        return Ok(());
    };
    println!("  VM:        {}", output.config.vm.name);
    println!("  Artifact:  {}", output.artifact);

    let key = match default_ssh_key_path() {
        Some(path) => read_ssh_key(&path),
        None => SSH_KEY_PLACEHOLDER.to_string(),
    };
    let payload = GenesisPayload::new(&request.config, key, enclave_args(&request.peers));

    println!();
    println!("{}", "Bootstrap the node with:".bold());
    println!(
        "curl -X POST -H 'Content-Type: application/json' -d '{}' http://{}:{}",
        payload.to_json()?,
        report.ip,
        CONFIG_PORT
    );
    println!();
    println!("{}", "Endpoints:".bold());
    let fqdn = report.domain.fqdn();
    println!("  https://{}/rpc", fqdn);
    println!("  wss://{}/ws", fqdn);
    println!("  https://{}/summit", fqdn);
    Ok(())
}
