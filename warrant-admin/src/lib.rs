//! Operational surface of Warrant: configuration loading, logging setup
//! and the index administration commands behind the `warrant-admin`
//! binary.

mod commands;
mod config;
mod logging;

pub use commands::{Admin, KindStatus, load_mapping};
pub use config::{LoggingConfig, WarrantConfig};
pub use logging::{env_filter, init_logging};
