//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config < enviroment < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pack::RuleTemplate;

pub const DEFAULT_HOST_PORT: u16 = 8080;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "packnow")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("packnow.toml"))
}

/// Defaults for the pack operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackSettings {
    /// Archive base name, without extension
    pub name: String,
    /// Template used when none is given and no prompt is possible
    pub template: RuleTemplate,
    /// Print every ignored entry
    pub verbose: bool,
    /// Append a short random token to the archive name
    pub unique: bool,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            name: "packnow".to_string(),
            template: RuleTemplate::DefaultExclusions,
            verbose: false,
            unique: true,
        }
    }
}

/// Bind and announcement settings for hosting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub address: String,
    pub port: u16,
    /// Announced URL override; empty means derive it
    pub url: String,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: DEFAULT_HOST_PORT,
            url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Directory receiving downloads and extracted packs
    pub dir: PathBuf,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pack: PackSettings,
    pub host: HostSettings,
    pub fetch: FetchSettings,
}

impl AppConfig {
    /// Rejects values no operation can work with.
    pub fn validate(&self) -> Result<()> {
        let name = self.pack.name.trim();
        ensure!(!name.is_empty(), "Invalid config: pack.name must not be empty");
        ensure!(
            !name.contains('/') && !name.contains('\\'),
            "Invalid config: pack.name must be a bare name, got '{name}'"
        );
        ensure!(
            !self.host.address.trim().is_empty(),
            "Invalid config: host.address must not be empty"
        );
        ensure!(self.host.port != 0, "Invalid config: host.port must be > 0");
        Ok(())
    }

    /// Announced URL override, if one is configured.
    pub fn public_url(&self) -> Option<&str> {
        let url = self.host.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<RuleTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_dir: Option<PathBuf>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("PACKNOW_").split("_"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> Result<AppConfig> {
    if let Some(name) = &overrides.name {
        config.pack.name = name.clone();
    }
    if let Some(template) = overrides.template {
        config.pack.template = template;
    }
    if let Some(address) = &overrides.address {
        config.host.address = address.clone();
    }
    if let Some(port) = overrides.port {
        config.host.port = port;
    }
    if let Some(dir) = &overrides.fetch_dir {
        config.fetch.dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}
