use console::style;
use node_brainer::{ClientKind, ConfigStore};

use super::print_success;

pub(crate) async fn cmd_stop(store: &ConfigStore, kind: ClientKind) -> anyhow::Result<()> {
    tracing::trace!(client = kind.name(), "cmd_stop invoked");
    let mut client = kind.open(store.clone())?;
    client.stop().await?;
    print_success(format!("{} stopped", style(kind.name()).cyan().bold()));
    Ok(())
}
