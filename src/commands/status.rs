use console::style;
use node_brainer::{ClientKind, ClientStatus, ConfigStore, RunState};

pub(crate) fn cmd_status(store: &ConfigStore, kind: Option<ClientKind>) -> anyhow::Result<()> {
    let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| ClientKind::ALL.to_vec());

    for kind in kinds {
        if !store.config_path(kind.name()).exists() {
            println!(
                "{:<12} {}",
                style(kind.name()).bold(),
                style("no config, run `node-brainer init`").dim()
            );
            continue;
        }
        let client = kind.open(store.clone())?;
        println!("{}", render(&client.status()));
    }
    Ok(())
}

fn render(status: &ClientStatus) -> String {
    let state = match status.state {
        RunState::Running { .. } => style(status.state.to_string()).green(),
        RunState::Stale { .. } => style(status.state.to_string()).yellow(),
        RunState::Installed => style(status.state.to_string()).cyan(),
        RunState::NotInstalled => style(status.state.to_string()).dim(),
    };

    let mut line = format!(
        "{:<12} {:<10} {}",
        style(&status.name).bold(),
        status.network,
        state
    );
    if let Some(binary) = &status.binary {
        line.push_str(&format!(
            "  {} {}/{}",
            binary.version, binary.os, binary.arch
        ));
        if let Some(commit) = &binary.sha_commit {
            line.push_str(&format!(" ({})", commit));
        }
    }
    line
}
