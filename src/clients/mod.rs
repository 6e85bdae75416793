mod base;
pub mod geth;
pub mod lighthouse;

pub use base::{ArtifactPlan, BaseClient};
pub use geth::{Geth, GethConfig};
pub use lighthouse::{Lighthouse, LighthouseConfig};

use crate::client::Client;
use crate::client_config::ConfigStore;
use crate::error::{Operation, Result};

/// Every node client this tool can manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientKind {
    Geth,
    Lighthouse,
}

impl ClientKind {
    pub const ALL: [ClientKind; 2] = [ClientKind::Geth, ClientKind::Lighthouse];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Geth => geth::NAME,
            Self::Lighthouse => lighthouse::NAME,
        }
    }

    /// Loads the client's config and returns it behind the lifecycle trait.
    pub fn open(&self, store: ConfigStore) -> Result<Box<dyn Client>> {
        let client: Box<dyn Client> = match self {
            Self::Geth => Box::new(Geth::open(store)?),
            Self::Lighthouse => Box::new(Lighthouse::open(store)?),
        };
        Ok(client)
    }

    /// Writes the default config file if there is none. Returns whether it wrote one.
    pub fn init_config(&self, store: &ConfigStore) -> Result<bool> {
        let created = match self {
            Self::Geth => store.init::<GethConfig>(geth::NAME),
            Self::Lighthouse => store.init::<LighthouseConfig>(lighthouse::NAME),
        };
        created.map_err(|e| e.during(self.name(), Operation::Init))
    }
}
