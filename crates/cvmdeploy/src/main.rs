mod args;
mod commands;

use args::{ArtifactArgs, CloudArgs};
use clap::{Parser, Subcommand};
use cvmdeploy_cloud::CloudProvider;
use cvmdeploy_config::{DEFAULT_CODE_PATH, resolve_home};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cvm")]
#[command(about = "Deploy TDX confidential VMs to Azure and GCP", long_about = None)]
struct Cli {
    /// Deployment home holding seismic-images/, deploy/ and cvm-reverse-proxy/
    #[arg(long, env = "CVM_HOME", global = true)]
    home: Option<PathBuf>,

    /// Checkout directory under $HOME, used when --home is not set
    #[arg(long, default_value = DEFAULT_CODE_PATH, global = true)]
    code_path: String,

    /// Debug logging and streamed provider CLI output
    #[arg(short = 'v', long = "logs", global = true)]
    logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a single VM with its own static IP
    Deploy {
        /// VM name (also its resource group and NSG)
        #[arg(short, long)]
        name: String,
        /// DNS record [default: the VM name]
        #[arg(long)]
        record: Option<String>,
        #[command(flatten)]
        cloud: CloudArgs,
        #[command(flatten)]
        artifact: ArtifactArgs,
        /// Start the reverse-proxy client once the VM is up
        #[arg(long)]
        proxy: bool,
    },
    /// Deploy genesis nodes on their persistent IPs
    Genesis {
        /// Node number to deploy
        #[arg(short, long, conflicts_with = "count", required_unless_present = "count")]
        node: Option<u32>,
        /// Deploy nodes 1..=COUNT
        #[arg(short, long)]
        count: Option<u32>,
        /// VM name override (single node only)
        #[arg(long, conflicts_with = "count")]
        name: Option<String>,
        /// Peer IPs, formatted as http://{ip}:7878
        #[arg(long, num_args = 1..)]
        peers: Vec<String>,
        /// Reserve IPs and DNS records without creating VMs
        #[arg(long)]
        ip_only: bool,
        /// Create missing IPs without asking
        #[arg(short, long)]
        yes: bool,
        #[command(flatten)]
        cloud: CloudArgs,
        #[command(flatten)]
        artifact: ArtifactArgs,
    },
    /// Delete a VM recorded in the deploy metadata (the data disk is kept)
    DeleteVm {
        /// VM name
        name: String,
    },
    /// Inspect and delete local artifacts
    #[command(subcommand)]
    Artifact(ArtifactCommands),
    /// Inspect the deploy metadata
    #[command(subcommand)]
    Metadata(MetadataCommands),
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum ArtifactCommands {
    /// Resolve a timestamp or filename to an artifact filename
    Resolve {
        artifact: String,
        #[arg(long)]
        dev: bool,
    },
    /// List local artifacts, newest first
    List {
        #[arg(long, env = "CVM_CLOUD")]
        cloud: Option<CloudProvider>,
    },
    /// Delete every local file of an artifact
    Delete {
        artifact: String,
        /// Delete deployed artifacts without asking
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum MetadataCommands {
    /// List deployed VMs
    List {
        #[arg(long)]
        cloud: Option<CloudProvider>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.logs);
    let home = resolve_home(cli.home.as_deref(), &cli.code_path)?;
    tracing::debug!("Using home {}", home.display());

    match cli.command {
        Commands::Deploy {
            name,
            record,
            cloud,
            artifact,
            proxy,
        } => {
            commands::deploy::handle(&home, &name, record, &cloud, &artifact, proxy, cli.logs)
                .await?;
        }
        Commands::Genesis {
            node,
            count,
            name,
            peers,
            ip_only,
            yes,
            cloud,
            artifact,
        } => {
            let nodes: Vec<u32> = match (node, count) {
                (Some(node), _) => vec![node],
                (None, Some(count)) => (1..=count).collect(),
                (None, None) => anyhow::bail!("Pass --node or --count"),
            };
            let options = commands::genesis::GenesisOptions {
                name,
                peers,
                ip_only,
                yes,
                dev: artifact.dev,
                show_logs: cli.logs,
            };
            commands::genesis::handle(&home, &nodes, &cloud, &artifact, &options).await?;
        }
        Commands::DeleteVm { name } => {
            commands::delete::handle(&home, &name).await?;
        }
        Commands::Artifact(cmd) => match cmd {
            ArtifactCommands::Resolve { artifact, dev } => {
                commands::artifact::resolve(&home, &artifact, dev)?;
            }
            ArtifactCommands::List { cloud } => {
                commands::artifact::list(&home, cloud)?;
            }
            ArtifactCommands::Delete { artifact, yes } => {
                commands::artifact::delete(&home, &artifact, yes).await?;
            }
        },
        Commands::Metadata(MetadataCommands::List { cloud }) => {
            commands::metadata::list(&home, cloud)?;
        }
        Commands::Version => {
            println!("cvmdeploy {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
