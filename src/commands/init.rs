use console::style;
use node_brainer::{ClientKind, ConfigStore};

use super::{print_info, print_success};

pub(crate) fn cmd_init(store: &ConfigStore, kind: Option<ClientKind>) -> anyhow::Result<()> {
    let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| ClientKind::ALL.to_vec());

    for kind in kinds {
        let path = store.config_path(kind.name());
        if kind.init_config(store)? {
            print_success(format!(
                "Wrote {} config to {}",
                style(kind.name()).cyan().bold(),
                path.display()
            ));
        } else {
            print_info(format!("{} already exists, left untouched", path.display()));
        }
    }
    Ok(())
}
