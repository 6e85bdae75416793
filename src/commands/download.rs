use console::style;
use node_brainer::{ClientKind, ConfigStore};

use super::{print_info, print_success};

pub(crate) async fn cmd_download(store: &ConfigStore, kind: ClientKind) -> anyhow::Result<()> {
    tracing::trace!(client = kind.name(), "cmd_download invoked");
    let mut client = kind.open(store.clone())?;

    print_info(format!("Fetching latest {} release...", style(kind.name()).bold()));
    client.download().await?;

    let status = client.status();
    match status.binary {
        Some(binary) => print_success(format!(
            "{} {} ready at {}",
            style(kind.name()).cyan().bold(),
            binary.version,
            style(store.resolve(&binary.path).display()).dim()
        )),
        None => print_success(format!("{} ready", kind.name())),
    }
    Ok(())
}
