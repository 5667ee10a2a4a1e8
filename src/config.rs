use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;

/// Default number of engine start attempts before giving up.
pub const DEFAULT_START_ATTEMPTS: u32 = 5;

/// Default pause between engine start attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Returns the path to the data directory for lumen-lsp.
/// Uses $XDG_DATA_HOME/lumen-lsp if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/lumen-lsp,
/// or ./lumen-lsp if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("lumen-lsp.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("lumen-lsp")
}

/// Editor-supplied settings.
///
/// The value arrives opaque over `workspace/didChangeConfiguration` and is
/// replaced wholesale on every change notification. Nothing is validated or
/// stored beyond the raw JSON; defaults are applied at the accessors.
#[derive(Debug, Clone, Default)]
pub struct Settings(Value);

impl Settings {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Command used to launch the analysis engine.
    pub fn engine_command(&self) -> String {
        self.lookup(&["lumen", "engine", "command"])
            .and_then(Value::as_str)
            .unwrap_or("lumen-engine")
            .to_string()
    }

    /// Extra arguments passed to the engine before `--port`/`--root`.
    pub fn engine_args(&self) -> Vec<String> {
        self.lookup(&["lumen", "engine", "args"])
            .and_then(Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fixed engine port. When absent a free port is picked at start time.
    pub fn engine_port(&self) -> Option<u16> {
        self.lookup(&["lumen", "engine", "port"])
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok())
    }

    /// Whether the engine is launched automatically after `initialized`.
    pub fn autostart(&self) -> bool {
        self.lookup(&["lumen", "engine", "autostart"])
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Upper bound on engine start attempts.
    pub fn start_attempts(&self) -> u32 {
        self.lookup(&["lumen", "engine", "startAttempts"])
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_START_ATTEMPTS)
    }

    /// Pause between failed start attempts.
    pub fn retry_delay(&self) -> Duration {
        let millis = self
            .lookup(&["lumen", "engine", "retryDelayMs"])
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_RETRY_DELAY_MS);
        Duration::from_millis(millis)
    }

    fn lookup(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.0;
        for key in path {
            current = current.as_object()?.get(*key)?;
        }
        Some(current)
    }
}

/// Shared handle to the current settings, replaced wholesale on change.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub fn current(&self) -> Settings {
        self.0.read().unwrap().clone()
    }

    pub fn replace(&self, settings: Settings) {
        *self.0.write().unwrap() = settings;
    }
}
