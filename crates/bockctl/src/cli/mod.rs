//! CLI command definitions and handlers.

use std::path::PathBuf;

use bock_common::labels;
use bock_network::{HostResolvConf, NetFlags, Platform, cni};
use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;

use crate::client::StateClient;
use crate::config::{DEFAULT_NAMESPACE, RuntimeConfig};
use crate::create::{CreateEnv, CreateRequest, create};
use crate::rootless;

/// bockctl - create containers and attach them to networks
#[derive(Parser)]
#[command(name = "bockctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory for bock data
    #[arg(long, global = true, env = "BOCK_ROOT")]
    pub root: Option<PathBuf>,

    /// Namespace to operate in
    #[arg(
        short,
        long,
        global = true,
        env = "BOCK_NAMESPACE",
        default_value = DEFAULT_NAMESPACE
    )]
    pub namespace: String,

    /// Directory of CNI plugin binaries
    #[arg(long, global = true, env = "CNI_PATH", default_value = cni::DEFAULT_CNI_PATH)]
    pub cni_path: PathBuf,

    /// Directory of CNI network configurations
    #[arg(
        long,
        global = true,
        env = "NETCONFPATH",
        default_value = cni::DEFAULT_NETCONF_PATH
    )]
    pub cni_netconfpath: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Networking options of `create`.
#[derive(Args, Debug, Default)]
pub struct NetworkArgs {
    /// Connect to a network: a CNI network name, "host", "none" or "container:<name|id>"
    #[arg(long)]
    pub network: Vec<String>,

    /// Alias of --network
    #[arg(long)]
    pub net: Vec<String>,

    /// Publish a container port: [hostIP:]hostPort:containerPort[/protocol]
    #[arg(short, long)]
    pub publish: Vec<String>,

    /// IPv4 address to request
    #[arg(long)]
    pub ip: Option<String>,

    /// MAC address of the container interface
    #[arg(long)]
    pub mac_address: Option<String>,

    /// Container hostname
    #[arg(long)]
    pub hostname: Option<String>,

    /// DNS servers
    #[arg(long)]
    pub dns: Vec<String>,

    /// DNS search domains
    #[arg(long)]
    pub dns_search: Vec<String>,

    /// DNS resolver options
    #[arg(long)]
    pub dns_opt: Vec<String>,

    /// Alias of --dns-opt
    #[arg(long)]
    pub dns_option: Vec<String>,

    /// Add a custom host-to-IP mapping (host:ip)
    #[arg(long)]
    pub add_host: Vec<String>,
}

impl From<NetworkArgs> for NetFlags {
    fn from(args: NetworkArgs) -> Self {
        Self {
            network: args.network,
            net: args.net,
            publish: args.publish,
            ip: args.ip,
            mac_address: args.mac_address,
            hostname: args.hostname,
            dns: args.dns,
            dns_search: args.dns_search,
            dns_opt: args.dns_opt,
            dns_option: args.dns_option,
            add_host: args.add_host,
        }
    }
}

/// Output format of `ps`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Tab-separated table.
    #[default]
    Table,
    /// JSON array of container states.
    Json,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a container
    Create {
        /// Container name
        #[arg(long)]
        name: Option<String>,

        /// Networking options.
        #[command(flatten)]
        network: NetworkArgs,
    },

    /// List containers
    Ps {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Only display container IDs
        #[arg(short, long)]
        quiet: bool,
    },
}

impl Cli {
    /// Runtime configuration selected by the global flags.
    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        let base = match &self.root {
            Some(root) => RuntimeConfig::default().with_root(root),
            None => RuntimeConfig::for_current_user(),
        };
        base.with_namespace(&self.namespace)
            .with_cni_path(&self.cni_path)
            .with_netconf_path(&self.cni_netconfpath)
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns the failure of the selected command.
    pub fn execute(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Create { name, network } => {
                let rootless = rootless::probe()?;
                let host = HostResolvConf::default();
                let request = CreateRequest {
                    name,
                    net: network.into(),
                };
                let state = create(
                    &request,
                    &CreateEnv {
                        config: &config,
                        host_resolv: &host,
                        rootless: &rootless,
                        platform: Platform::current(),
                    },
                )?;

                println!("{}", state.id);
                Ok(())
            }

            Commands::Ps { format, quiet } => {
                let client = StateClient::new(config.paths.clone(), config.namespace.clone());
                let states = client.states()?;

                if quiet {
                    for state in states {
                        println!("{}", state.id);
                    }
                } else if format == Format::Json {
                    println!("{}", serde_json::to_string_pretty(&states)?);
                } else {
                    println!("CONTAINER ID\tNAME\tSTATUS\tNETWORKS");
                    for state in states {
                        let networks: Vec<String> = state
                            .annotation(labels::NETWORKS)
                            .and_then(|n| serde_json::from_str(n).ok())
                            .unwrap_or_default();
                        println!(
                            "{}\t{}\t{}\t{}",
                            state.id.get(..12).unwrap_or(&state.id),
                            state.annotation(labels::NAME).unwrap_or_default(),
                            state.status,
                            networks.join(",")
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
