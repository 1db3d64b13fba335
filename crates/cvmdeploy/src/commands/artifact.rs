use colored::Colorize;
use cvmdeploy_cloud::CloudProvider;
use cvmdeploy_core::{
    AutoConfirm, Confirm, DeleteOutcome, StdinConfirm, delete_artifact, list_artifacts,
    parse_artifact,
};
use std::path::Path;

pub fn resolve(home: &Path, artifact: &str, dev: bool) -> anyhow::Result<()> {
    println!("{}", parse_artifact(artifact, Some(home), dev)?);
    Ok(())
}

pub fn list(home: &Path, cloud: Option<CloudProvider>) -> anyhow::Result<()> {
    let providers: Vec<CloudProvider> = match cloud {
        Some(cloud) => vec![cloud],
        None => CloudProvider::ALL.to_vec(),
    };
    for provider in providers {
        let names = list_artifacts(home, provider)?;
        println!("{} ({})", provider.to_string().bold(), names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub async fn delete(home: &Path, artifact: &str, yes: bool) -> anyhow::Result<()> {
    let confirm: Box<dyn Confirm> = if yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(StdinConfirm)
    };

    match delete_artifact(artifact, home, confirm.as_ref()).await? {
        DeleteOutcome::Declined => println!("{}", "Aborted".yellow()),
        DeleteOutcome::NoFilesFound => {
            println!("{}", format!("No files found for {}", artifact).yellow())
        }
        DeleteOutcome::Deleted(n) => {
            println!("{}", format!("✓ Deleted {} file(s) of {}", n, artifact).green())
        }
    }
    Ok(())
}
