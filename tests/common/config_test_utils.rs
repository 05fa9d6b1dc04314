use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};
use tempfile::TempDir;

const PACKNOW_VARS: &[&str] = &[
    "PACKNOW_PACK_NAME",
    "PACKNOW_PACK_TEMPLATE",
    "PACKNOW_PACK_VERBOSE",
    "PACKNOW_PACK_UNIQUE",
    "PACKNOW_HOST_ADDRESS",
    "PACKNOW_HOST_PORT",
    "PACKNOW_HOST_URL",
    "PACKNOW_FETCH_DIR",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvRestore {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl EnvRestore {
    fn capture() -> Self {
        let mut saved = vec![("XDG_CONFIG_HOME", std::env::var_os("XDG_CONFIG_HOME"))];
        saved.extend(PACKNOW_VARS.iter().map(|k| (*k, std::env::var_os(k))));
        Self { saved }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..) {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn write_config(temp_dir: &TempDir, contents: &str) {
    let app_config_dir = temp_dir.path().join("packnow");
    std::fs::create_dir_all(&app_config_dir).expect("create config dir");
    std::fs::write(app_config_dir.join("config.toml"), contents).expect("write config");
}

/// Run `f` with a private config file and no `PACKNOW_*` variables set.
/// Env changes made inside `f` are undone afterwards.
pub fn with_config_env<T>(config_toml: &str, f: impl FnOnce() -> T) -> T {
    let _guard = env_lock().lock().unwrap_or_else(|e| e.into_inner());
    let temp_dir = TempDir::new().expect("temp dir");

    write_config(&temp_dir, config_toml);

    let restore = EnvRestore::capture();
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    for key in PACKNOW_VARS {
        std::env::remove_var(key);
    }

    let result = f();
    drop(restore);
    result
}
