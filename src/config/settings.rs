//! Application configuration loaded from a TOML file.
//!
//! The file seeds the due-type catalog, lists the fixed assistance amounts per
//! assistance due type and the active members, and carries a few engine
//! settings. Its location comes from `DUES_CONFIG` (default `config.toml`).

use crate::entities::DueCategory;
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Configuration structure representing the entire config file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Engine settings
    #[serde(default)]
    pub settings: Settings,
    /// Due types to seed into the catalog
    #[serde(default)]
    pub due_types: Vec<DueTypeConfig>,
    /// Fixed payout per assistance due type, keyed by due type name
    #[serde(default)]
    pub assistance_amounts: HashMap<String, Decimal>,
    /// Members known to the organization
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

/// Engine settings
#[derive(Debug, Default, Deserialize, Clone, Copy)]
pub struct Settings {
    /// Days after the end of a period before its obligations fall due
    #[serde(default)]
    pub due_day_offset: u32,
}

/// Configuration for a single catalog entry
#[derive(Debug, Deserialize, Clone)]
pub struct DueTypeConfig {
    pub name: String,
    pub amount: Decimal,
    pub category: DueCategory,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub beneficiary_exempt: bool,
}

/// A member entry of the directory
#[derive(Debug, Deserialize, Clone)]
pub struct MemberConfig {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

const fn default_true() -> bool {
    true
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse configuration: {e}"),
    })
}

/// Loads configuration from `DUES_CONFIG`, falling back to `./config.toml`
pub fn load_default_config() -> Result<AppConfig> {
    let path = std::env::var("DUES_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
