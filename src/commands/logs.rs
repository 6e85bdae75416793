use node_brainer::log_tail::shutdown_channel;
use node_brainer::{ClientKind, ConfigStore};

pub(crate) async fn cmd_logs(store: &ConfigStore, kind: ClientKind) -> anyhow::Result<()> {
    tracing::trace!(client = kind.name(), "cmd_logs invoked");
    let client = kind.open(store.clone())?;

    let (sender, token) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received, stopping log follow");
            sender.shutdown();
        }
    });

    client.logs(token).await?;
    Ok(())
}
