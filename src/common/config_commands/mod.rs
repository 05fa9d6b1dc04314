//! CLI handlers for config subcommands.

mod show;

use crate::common::config::{config_path, load_config};
use anyhow::Result;

/// Print resolved config file path.
pub fn run_config_path() -> Result<()> {
    println!("{}", config_path().display());
    Ok(())
}

/// Print the effective config after defaults, file and environment merge.
pub fn run_config_show() -> Result<()> {
    let path = config_path();
    let config = load_config()?;
    let sources = show::ConfigSources {
        path: &path,
        file_found: path.is_file(),
        env_keys: show::packnow_env_keys(std::env::vars_os().filter_map(|(key, _)| key.into_string().ok())),
    };

    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    let stderr = std::io::stderr();
    let mut err_output = stderr.lock();
    show::show_effective_config(&config, &sources, &mut output, &mut err_output)
}
