//! Artifact names, timestamps and local files
//!
//! Artifacts are image files named with a 14-digit `YYYYMMDDHHMMSS` build
//! timestamp, e.g. `seismic-dev-azure-20250110120000.vhd` or the older
//! `cvm-image-azure-tdx.rootfs-20241202202935.wic.vhd`.

use crate::confirm::Confirm;
use crate::error::{DeployError, Result};
use crate::metadata::MetadataStore;
use chrono::NaiveDateTime;
use cvmdeploy_cloud::CloudProvider;
use cvmdeploy_config::BuildPaths;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Extensions tried in order when a timestamp matches several files
const PREFERRED_EXTENSIONS: [&str; 3] = [".vhd", ".tar.gz", ".efi"];

/// The first 14-digit run in `artifact`
pub fn extract_timestamp(artifact: &str) -> Result<&str> {
    let re = Regex::new(r"\d{14}")
        .map_err(|e| DeployError::InvalidArtifact(format!("{} ({})", artifact, e)))?;
    re.find(artifact)
        .map(|m| m.as_str())
        .ok_or_else(|| DeployError::InvalidArtifact(artifact.to_string()))
}

/// Build time of `artifact` as Unix seconds, read as UTC
pub fn artifact_timestamp(artifact: &str) -> Result<i64> {
    let ts = extract_timestamp(artifact)?;
    let dt = NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
        .map_err(|_| DeployError::InvalidArtifact(artifact.to_string()))?;
    Ok(dt.and_utc().timestamp())
}

fn is_bare_timestamp(arg: &str) -> bool {
    arg.len() == 14 && arg.bytes().all(|b| b.is_ascii_digit())
}

/// Resolve a CLI artifact argument.
///
/// A bare timestamp is looked up in the artifacts directory. Anything else
/// must embed a timestamp and is returned unchanged.
pub fn parse_artifact(arg: &str, home: Option<&Path>, dev: bool) -> Result<String> {
    if arg.is_empty() {
        return Err(DeployError::MissingArgument("--artifact"));
    }
    if is_bare_timestamp(arg) {
        let home = home.ok_or(DeployError::MissingArgument("home"))?;
        return artifact_from_timestamp(arg, home, dev);
    }
    extract_timestamp(arg)?;
    Ok(arg.to_string())
}

/// Files in the artifacts directory whose name contains `timestamp`
fn files_with_timestamp(home: &Path, timestamp: &str) -> Result<Vec<PathBuf>> {
    let dir = BuildPaths::new(home).artifacts();
    let pattern = format!("{}/*{}*", dir.display(), timestamp);
    let paths = glob::glob(&pattern)
        .map_err(|e| DeployError::ImageNotFound(format!("{}: {}", pattern, e)))?;
    let mut files: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn artifact_from_timestamp(timestamp: &str, home: &Path, dev: bool) -> Result<String> {
    let names: Vec<String> = files_with_timestamp(home, timestamp)?
        .iter()
        .map(|p| file_name(p))
        .collect();

    if names.is_empty() {
        let legacy = BuildPaths::legacy_artifact(timestamp);
        tracing::warn!("No file found for {}, assuming {}", timestamp, legacy);
        return Ok(legacy);
    }

    let preferred: Vec<&String> = names
        .iter()
        .filter(|n| n.contains("-dev-") == dev)
        .collect();
    let candidates: Vec<&String> = if preferred.is_empty() {
        names.iter().collect()
    } else {
        preferred
    };

    let chosen = PREFERRED_EXTENSIONS
        .iter()
        .find_map(|ext| candidates.iter().find(|n| n.ends_with(ext)))
        .or_else(|| candidates.first())
        .map(|n| n.to_string())
        .unwrap_or_default();
    Ok(chosen)
}

/// Most recently modified image for `cloud`
pub fn find_latest_image(home: &Path, cloud: CloudProvider, dev: bool) -> Result<PathBuf> {
    let pattern = BuildPaths::new(home)
        .artifacts()
        .join(BuildPaths::artifact_pattern(cloud, dev))
        .display()
        .to_string();

    let latest = glob::glob(&pattern)
        .map_err(|e| DeployError::ImageNotFound(format!("{}: {}", pattern, e)))?
        .filter_map(|p| p.ok())
        .filter_map(|p| {
            let modified = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            Some((modified, p))
        })
        .max_by_key(|(modified, _): &(SystemTime, PathBuf)| *modified)
        .map(|(_, p)| p);

    match latest {
        Some(path) => {
            tracing::info!("Found latest image: {}", path.display());
            Ok(path)
        }
        None => Err(DeployError::ImageNotFound(format!(
            "no images found matching pattern: {}",
            pattern
        ))),
    }
}

/// Artifacts on disk for `cloud`, newest first
pub fn list_artifacts(home: &Path, cloud: CloudProvider) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for dev in [false, true] {
        let pattern = BuildPaths::new(home)
            .artifacts()
            .join(BuildPaths::artifact_pattern(cloud, dev))
            .display()
            .to_string();
        let paths = glob::glob(&pattern)
            .map_err(|e| DeployError::ImageNotFound(format!("{}: {}", pattern, e)))?;
        names.extend(paths.filter_map(|p| p.ok()).map(|p| file_name(&p)));
    }
    names.sort_by_key(|name| std::cmp::Reverse(artifact_timestamp(name).unwrap_or(i64::MIN)));
    Ok(names)
}

/// What [`delete_artifact`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The operator declined; nothing changed
    Declined,
    /// No local file matched the timestamp; nothing changed
    NoFilesFound,
    Deleted(usize),
}

/// Delete every local file of `artifact` and drop it from the metadata.
///
/// Deployed artifacts need confirmation first. Cloud resources are never
/// touched.
pub async fn delete_artifact(
    artifact: &str,
    home: &Path,
    confirm: &dyn Confirm,
) -> Result<DeleteOutcome> {
    let timestamp = extract_timestamp(artifact)?;
    let store = MetadataStore::for_home(home);
    let deployed_to = store.load()?.deployments_of(artifact);

    if !deployed_to.is_empty() {
        let prompt = format!(
            "\nThe artifact \"{}\" is deployed to {} VM(s):\n - {}\n\n\
             Are you really sure you want to delete it? This will not delete the resources",
            artifact,
            deployed_to.len(),
            deployed_to.join("\n - ")
        );
        if !confirm.confirm(&prompt) {
            tracing::info!("Not deleting artifact {}", artifact);
            return Ok(DeleteOutcome::Declined);
        }
    }

    let files = files_with_timestamp(home, timestamp)?;
    if files.is_empty() {
        tracing::warn!("Found no files associated with artifact {}", artifact);
        return Ok(DeleteOutcome::NoFilesFound);
    }

    for file in &files {
        fs::remove_file(file)?;
        tracing::debug!("Deleted {}", file.display());
    }
    tracing::info!(
        "Deleted {} files associated with artifact {}",
        files.len(),
        artifact
    );

    store.remove_artifact(artifact).await?;
    Ok(DeleteOutcome::Deleted(files.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_timestamp_is_utc() {
        assert_eq!(
            artifact_timestamp("seismic-dev-azure-20250110120000.vhd").unwrap(),
            1_736_510_400
        );
        assert_eq!(
            artifact_timestamp("cvm-image-azure-tdx.rootfs-20241202202935.wic.vhd").unwrap(),
            1_733_171_375
        );
    }

    #[test]
    fn test_first_run_wins() {
        assert_eq!(
            extract_timestamp("x-20250110120000-20260101000000.vhd").unwrap(),
            "20250110120000"
        );
        // a longer digit run still yields its first 14 digits
        assert_eq!(
            extract_timestamp("seismic-gcp-2025011012000099.tar.gz").unwrap(),
            "20250110120000"
        );
    }

    #[test]
    fn test_invalid_artifact_message() {
        let err = artifact_timestamp("seismic-azure.vhd").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("seismic-azure.vhd"));
        assert!(msg.contains("cvm-image-azure-tdx.rootfs-20241202202935.wic.vhd"));
        assert!(msg.contains("seismic-dev-azure-20250110120000.vhd"));
    }

    #[test]
    fn test_impossible_date_is_invalid() {
        assert!(artifact_timestamp("seismic-azure-20251399000000.vhd").is_err());
    }

    #[test]
    fn test_parse_full_name_unchanged() {
        let name = "seismic-gcp-20250110120000.tar.gz";
        assert_eq!(parse_artifact(name, None, false).unwrap(), name);
        assert!(parse_artifact("latest.vhd", None, false).is_err());
        assert!(matches!(
            parse_artifact("20250110120000", None, false),
            Err(DeployError::MissingArgument("home"))
        ));
    }
}
