mod args;
mod commands;

use args::{Cli, Commands};
use clap::Parser;
use node_brainer::{clienv, ConfigStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let root = clienv::resolve_root(cli.root);
    tracing::debug!(root = %root.display(), "Using root directory");
    let store = ConfigStore::new(root);

    match cli.command {
        Commands::Download(target) => commands::download::cmd_download(&store, target.eth_client).await?,
        Commands::Start(target) => commands::start::cmd_start(&store, target.eth_client).await?,
        Commands::Stop(target) => commands::stop::cmd_stop(&store, target.eth_client).await?,
        Commands::Logs(target) => commands::logs::cmd_logs(&store, target.eth_client).await?,
        Commands::Status { eth_client } => commands::status::cmd_status(&store, eth_client)?,
        Commands::Init { eth_client } => commands::init::cmd_init(&store, eth_client)?,
    }

    Ok(())
}
