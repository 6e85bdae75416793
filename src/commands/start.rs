use console::style;
use node_brainer::{ClientKind, ClientStatus, ConfigStore, RunState};

use super::{print_success, print_warning};

pub(crate) async fn cmd_start(store: &ConfigStore, kind: ClientKind) -> anyhow::Result<()> {
    tracing::trace!(client = kind.name(), "cmd_start invoked");
    let mut client = kind.open(store.clone())?;
    client.start().await?;

    let status = client.status();
    let message = outcome(&status);
    if matches!(status.state, RunState::Running { .. }) {
        print_success(message);
    } else {
        print_warning(message);
    }
    Ok(())
}

/// A node that dies during startup still leaves a pid behind, so say so instead of staying quiet.
fn outcome(status: &ClientStatus) -> String {
    let name = style(&status.name).cyan().bold();
    match status.state {
        RunState::Running { pid } => format!("{} started with pid {}", name, pid),
        _ => format!(
            "{} exited right after start, see {}",
            name,
            status.log_file.display()
        ),
    }
}
