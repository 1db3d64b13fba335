use colored::Colorize;
use cvmdeploy_cloud::CloudProvider;
use cvmdeploy_core::{MetadataStore, VmRecord};
use std::path::Path;

pub fn list(home: &Path, cloud: Option<CloudProvider>) -> anyhow::Result<()> {
    let store = MetadataStore::for_home(home);
    let providers: Vec<CloudProvider> = match cloud {
        Some(cloud) => vec![cloud],
        None => CloudProvider::ALL.to_vec(),
    };

    for provider in providers {
        let vms = store.filter_by_cloud(provider)?;
        println!("{} ({})", provider.to_string().bold(), vms.len());
        if vms.is_empty() {
            println!("  {}", "No VMs".dimmed());
        }
        for (name, record) in &vms {
            print_vm(name, record);
        }
    }
    Ok(())
}

fn print_vm(name: &str, record: &VmRecord) {
    println!("  {}", name.cyan());
    println!("    IP:       {}", record.public_ip);
    println!("    Domain:   {}", record.domain.url);
    println!("    Artifact: {}", record.artifact);
    if let Some(disk) = &record.data_disk {
        println!("    Data:     {}", disk);
    }
}
