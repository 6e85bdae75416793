pub mod client;
pub mod client_config;
pub mod clients;
pub mod clienv;
pub mod error;
pub mod log_tail;
pub mod platform;
pub mod process;
pub mod release;
pub mod release_installer;
pub mod secret;

pub use client::{Client, ClientStatus, RunState};
pub use client_config::ConfigStore;
pub use clients::ClientKind;
pub use error::{Error, Result};
