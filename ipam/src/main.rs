//! Claims and inspects container addresses on the Docker network shared by cluster machines.
#![deny(missing_docs)]

use anyhow::Result;
use capd_ipam::{
    backend::{ConfigMapStore, DockerRuntime, KubeMachineDirectory},
    config::IpamConfig,
    ipam::Allocator,
};
use capd_ipam_common::telemetry::{self, LogFormat};
use clap::{Parser, Subcommand};
use kube::Client;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    config: IpamConfig,

    /// Export traces to this OTLP collector.
    #[arg(long, env = "CAPD_IPAM_OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    /// Format of the log lines written to stderr.
    #[arg(
        long,
        env = "CAPD_IPAM_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    log_format: LogFormat,
}

/// Available Subcommands
#[derive(Subcommand, Debug)]
enum Command {
    /// Claim an address for a machine and print it
    Claim {
        /// Namespace of the machine
        #[arg(long, short)]
        namespace: String,
        /// Name of the machine
        #[arg(long, short)]
        machine: String,
    },
    /// Release the addresses of machines that no longer exist
    Reclaim {
        /// Namespace to reclaim addresses in
        #[arg(long, short)]
        namespace: String,
    },
    /// Print the allocation table of a namespace as JSON
    Show {
        /// Namespace of the table
        #[arg(long, short)]
        namespace: String,
    },
    /// Print the CIDR of the network
    Cidr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    telemetry::init(args.log_format, args.otlp_endpoint.clone())?;

    info!(?args.command, network = %args.config.network_name, "starting capd-ipam");
    let result = run(args.command, args.config).await;

    // Flush traces before shutdown
    telemetry::shutdown();
    result
}

async fn run(command: Command, config: IpamConfig) -> Result<()> {
    let client = Client::try_default().await?;
    let allocator = Allocator::new(
        ConfigMapStore::new(client.clone(), config.config_map_name.clone()),
        KubeMachineDirectory::new(client, &config.machine_api_version),
        DockerRuntime::connect()?,
        config,
    );

    match command {
        Command::Claim { namespace, machine } => {
            let ip = allocator.claim_ip(&namespace, &machine).await?;
            println!("{ip}");
        }
        Command::Reclaim { namespace } => {
            let released = allocator.reclaim(&namespace).await?;
            println!("{}", serde_json::to_string_pretty(&released)?);
        }
        Command::Show { namespace } => {
            let table = allocator.table(&namespace).await?;
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Command::Cidr => {
            let cidr = allocator.cidr().await?;
            println!("{cidr}");
        }
    }
    Ok(())
}
