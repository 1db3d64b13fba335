use colored::Colorize;
use std::path::Path;

pub async fn handle(home: &Path, name: &str) -> anyhow::Result<()> {
    println!("{} {}", "Deleting VM".yellow().bold(), name.cyan());
    cvmdeploy_core::delete_vm(name, home).await?;
    println!("{}", format!("✓ Deleted {}", name).green());
    Ok(())
}
