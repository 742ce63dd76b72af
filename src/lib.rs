pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliCommand, CliConfig};

pub use adapters::{LocalStorage, MemoryStorage, TlsProber};
pub use app::Monitor;
pub use config::AppConfig;
pub use core::{
    commands::{Command, CommandDispatcher},
    registry::DocumentRegistry,
    service::RegistryService,
    sweep::ExpirySweeper,
};
pub use utils::error::{MonitorError, Result};
