//! gcloud / gsutil CLI wrapper

use crate::error::{GcpError, Result};
use cvmdeploy_cloud::{DeployConfig, NsgRule, OperationStatus, Protocol};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub const NETWORK_TIER: &str = "PREMIUM";
pub const NIC_TYPE: &str = "GVNIC";
pub const PROVISIONING_MODEL: &str = "STANDARD";
pub const BOOT_DISK_TYPE: &str = "pd-balanced";
pub const DATA_DISK_TYPE: &str = "pd-ssd";

/// Where a Compute Engine operation lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    Global,
    Region(String),
    Zone(String),
}

/// `gcloud compute operations describe` output
#[derive(Debug, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    pub fn status(&self) -> OperationStatus {
        if self.status != "DONE" {
            return OperationStatus::Pending;
        }
        match &self.error {
            Some(error) if !error.errors.is_empty() => OperationStatus::Failed(
                error
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => OperationStatus::Done,
        }
    }
}

/// gcloud CLI wrapper bound to one project
#[derive(Debug, Clone)]
pub struct Gcloud {
    project: String,
}

impl Gcloud {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Run `gcloud <args> --project <project>`
    pub async fn run<S: AsRef<str>>(&self, args: &[S], show_logs: bool) -> Result<String> {
        let mut full: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        full.push("--project");
        full.push(&self.project);
        run_command("gcloud", &full, show_logs).await
    }

    /// Start an `--async` operation and return its name
    pub async fn start<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let mut full: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        full.extend(["--async", "--format=value(name)"]);
        let output = self.run(&full, false).await?;
        output
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GcpError::InvalidResponse("no operation name returned".to_string()))
    }

    pub async fn describe_operation(&self, name: &str, scope: &OperationScope) -> Result<Operation> {
        let mut args = vec!["compute", "operations", "describe", name, "--format=json"];
        match scope {
            OperationScope::Global => args.push("--global"),
            OperationScope::Region(region) => args.extend(["--region", region.as_str()]),
            OperationScope::Zone(zone) => args.extend(["--zone", zone.as_str()]),
        }
        let output = self.run(&args, false).await?;
        Ok(serde_json::from_str(&output)?)
    }
}

/// Plain `gsutil` invocation
pub async fn gsutil<S: AsRef<str>>(args: &[S], show_logs: bool) -> Result<String> {
    run_command("gsutil", args, show_logs).await
}

pub async fn check_installed() -> Result<()> {
    for tool in ["gcloud", "gsutil"] {
        let which = Command::new("which").arg(tool).output().await?;
        if !which.status.success() {
            return Err(GcpError::ToolNotFound(tool.to_string()));
        }
    }
    Ok(())
}

async fn run_command<S: AsRef<str>>(program: &str, args: &[S], show_logs: bool) -> Result<String> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    tracing::debug!("Running: {} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(&args);
    if show_logs {
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    }

    let output = cmd.output().await?;

    if !output.status.success() {
        let stderr = if show_logs {
            format!("exited with {}", output.status)
        } else {
            String::from_utf8_lossy(&output.stderr).trim().to_string()
        };
        tracing::info!("Command failed: {} {}", program, args.join(" "));
        return Err(GcpError::CommandFailed {
            command: format!("{} {}", program, args[..args.len().min(3)].join(" ")),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Region of a zone: `us-central1-a` -> `us-central1`
pub fn region_of_zone(zone: &str) -> Result<&str> {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if region.contains('-') && suffix.len() == 1 => Ok(region),
        _ => Err(GcpError::InvalidZone(zone.to_string())),
    }
}

/// Coerce a name into a valid Compute Engine resource name.
///
/// Lowercase letters, digits and hyphens only, starting with a letter,
/// at most 63 characters.
pub fn resource_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '-',
        })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_lowercase()) {
        out.insert(0, 'd');
    }
    out.truncate(63);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Image name for a VM and an artifact: `{vm}-{stem}` with dots replaced
pub fn image_name(vm_name: &str, image_path: &Path) -> String {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    resource_name(&format!("{}-{}", vm_name, stem).replace('.', "-"))
}

pub fn bucket_name(project: &str) -> String {
    format!("{}-images", project)
}

pub fn firewall_rule_args(config: &DeployConfig, rule: &NsgRule) -> Vec<String> {
    let rule_name = format!("{}-{}", config.vm.name, rule.name.to_lowercase());
    let rules = match rule.protocol {
        Protocol::Tcp => format!("tcp:{}", rule.port),
        Protocol::All => "all".to_string(),
    };
    vec![
        "compute".into(),
        "firewall-rules".into(),
        "create".into(),
        resource_name(&rule_name),
        "--direction".into(),
        "INGRESS".into(),
        "--priority".into(),
        rule.priority.to_string(),
        "--network".into(),
        "default".into(),
        "--action".into(),
        "ALLOW".into(),
        "--rules".into(),
        rules,
        "--source-ranges".into(),
        rule.source_range().to_string(),
    ]
}

pub fn instance_create_args(
    config: &DeployConfig,
    boot_disk: &str,
    ip_name: &str,
    data_disk: Option<&str>,
    user_data: &Path,
) -> Vec<String> {
    let vm = &config.vm;
    let mut args: Vec<String> = vec![
        "compute".into(),
        "instances".into(),
        "create".into(),
        vm.name.clone(),
        "--zone".into(),
        vm.location().to_string(),
        "--machine-type".into(),
        vm.size.clone(),
        "--network-interface".into(),
        format!(
            "network-tier={},nic-type={},stack-type=IPV4_ONLY,subnet=default,address={}",
            NETWORK_TIER, NIC_TYPE, ip_name
        ),
        "--maintenance-policy".into(),
        "TERMINATE".into(),
        "--provisioning-model".into(),
        PROVISIONING_MODEL.into(),
        "--disk".into(),
        format!(
            "name={},device-name={},boot=yes,auto-delete=yes,mode=rw",
            boot_disk, vm.name
        ),
    ];
    if let Some(data_disk) = data_disk {
        args.push("--disk".into());
        args.push(format!(
            "name={},device-name={},mode=rw,auto-delete=no",
            data_disk, data_disk
        ));
    }
    args.extend([
        "--metadata-from-file".into(),
        format!("user-data={}", user_data.display()),
        "--no-shielded-secure-boot".into(),
        "--shielded-vtpm".into(),
        "--shielded-integrity-monitoring".into(),
        "--confidential-compute-type".into(),
        "TDX".into(),
    ]);
    args
}
