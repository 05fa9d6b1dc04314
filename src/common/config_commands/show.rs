use crate::common::config::AppConfig;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Which layers fed the effective config.
pub(super) struct ConfigSources<'a> {
    pub path: &'a Path,
    pub file_found: bool,
    /// `PACKNOW_*` variables present in the environment
    pub env_keys: Vec<String>,
}

/// Effective config as TOML on `stdout`; where it came from on `stderr`,
/// so the TOML can be redirected into a config file as-is.
pub(super) fn show_effective_config(
    config: &AppConfig,
    sources: &ConfigSources<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    if sources.file_found {
        writeln!(stderr, "# config file: {}", sources.path.display())?;
    } else {
        writeln!(
            stderr,
            "# no config file at {} (create it to override defaults)",
            sources.path.display()
        )?;
    }
    if sources.env_keys.is_empty() {
        writeln!(stderr, "# environment: no PACKNOW_* overrides")?;
    } else {
        writeln!(stderr, "# environment: {}", sources.env_keys.join(", "))?;
    }

    let rendered = toml::to_string_pretty(config).context("Failed to render config")?;
    write!(stdout, "{rendered}")?;
    Ok(())
}

/// Sorted names of the `PACKNOW_*` variables in `vars`.
pub(super) fn packnow_env_keys(vars: impl Iterator<Item = String>) -> Vec<String> {
    let mut keys: Vec<String> = vars.filter(|k| k.starts_with("PACKNOW_")).collect();
    keys.sort();
    keys
}
