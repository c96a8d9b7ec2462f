/// Database configuration and connection management
pub mod database;

/// Application configuration loading from the TOML file
pub mod settings;

pub use settings::{AppConfig, load_config, load_default_config};
