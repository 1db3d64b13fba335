use crate::args::{ArtifactArgs, CloudArgs};
use colored::Colorize;
use cvmdeploy_cloud::VmConfig;
use cvmdeploy_core::{cloud_api, deploy_single, start_proxy_server};
use std::path::Path;

pub async fn handle(
    home: &Path,
    name: &str,
    record: Option<String>,
    cloud: &CloudArgs,
    artifact: &ArtifactArgs,
    proxy: bool,
    show_logs: bool,
) -> anyhow::Result<()> {
    let image_path = artifact.require_image_path(home, cloud.cloud)?;
    let vm = VmConfig::new(cloud.cloud, name, cloud.region(), cloud.vm_size());
    let record = record.unwrap_or_else(|| name.to_string());
    let config = cloud.deploy_config(vm, &record, show_logs).await?;

    println!(
        "{} {} ({}, {})",
        "Deploying".blue().bold(),
        name.cyan(),
        config.vm.cloud,
        config.vm.region
    );
    println!("  Artifact: {}", image_path.display());

    let api = cloud_api(cloud.cloud, &config.vm.region)?;
    let output = deploy_single(api.as_ref(), &config, &image_path, home).await?;

    println!();
    println!("{}", "✓ Deployment complete".green().bold());
    println!("  VM:        {}", output.config.vm.name.cyan());
    println!("  Public IP: {}", output.public_ip.cyan());
    println!("  Domain:    {}", output.config.domain.fqdn().cyan());

    if !proxy {
        return Ok(());
    }

    println!();
    println!("{}", "Starting proxy client (Ctrl+C to stop)...".blue());
    let client = start_proxy_server(home, &output.public_ip, &output.config.vm).await?;
    tokio::select! {
        result = client.wait() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("{}", "Stopping proxy client".yellow());
        }
    }
    Ok(())
}
