use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use node_brainer::ClientKind;

#[derive(Parser)]
#[command(name = "node-brainer")]
#[command(version)]
#[command(about = "Download, run and watch Ethereum node clients", long_about = None)]
pub(crate) struct Cli {
    /// Directory holding clients/. Can also be set via NODE_BRAINER_ROOT env var. Defaults to the
    /// nearest parent of the working directory with clients/configs, else the user data dir.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Copy)]
pub(crate) struct Target {
    /// Node client to act on
    #[arg(long = "eth-client", value_enum)]
    pub eth_client: ClientKind,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Install the latest release for this machine
    Download(Target),

    /// Start the installed client in the background
    Start(Target),

    /// Interrupt the running client
    Stop(Target),

    /// Follow the client's log output until Ctrl-C
    Logs(Target),

    /// Show install and run state
    Status {
        /// Node client to report on (all when omitted)
        #[arg(long = "eth-client", value_enum)]
        eth_client: Option<ClientKind>,
    },

    /// Write the default config file if missing
    Init {
        /// Node client to initialise (all when omitted)
        #[arg(long = "eth-client", value_enum)]
        eth_client: Option<ClientKind>,
    },
}
