//! Client configuration file and environment overrides.
//!
//! `<config dir>/simhost/config.json`, all keys optional:
//!
//! ```json
//! {
//!   "host": "127.0.0.1",
//!   "port": 20500,
//!   "timeout": 10000,
//!   "connectTimeout": 2000,
//!   "autoLaunch": true,
//!   "launch": { "executable": "/opt/simhost/bin/simhost", "hidden": true },
//!   "eventQueue": 64
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use simhost_rpc::{Error, Result, SessionConfig};
use tracing::{debug, warn};

pub const HOST_ENV: &str = "SIMHOST_HOST";
pub const PORT_ENV: &str = "SIMHOST_PORT";
pub const EXECUTABLE_ENV: &str = simhost_rpc::launcher::EXECUTABLE_ENV;
pub const TIMEOUT_ENV: &str = "SIMHOST_TIMEOUT_MS";
pub const NO_LAUNCH_ENV: &str = "SIMHOST_NO_LAUNCH";

const DEFAULT_EVENT_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub session: SessionConfig,
    /// Capacity of the queue behind `EventChannel::subscribe_channel`.
    pub event_queue: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            event_queue: DEFAULT_EVENT_QUEUE,
        }
    }
}

impl ClientConfig {
    /// `config.json` in the platform config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "simhost").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from `path`. A missing file gives the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Json` if
    /// it is not valid config JSON.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        warn_unknown_fields(&content, &path.display().to_string());
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from the default path, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// As [`ClientConfig::load`], plus `Error::Config` for malformed
    /// environment values.
    pub fn from_env() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `Error::Io` if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Override fields from variables looked up through `var`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the variable that does not parse.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var(HOST_ENV) {
            self.session.host = host;
        }
        if let Some(port) = var(PORT_ENV) {
            self.session.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{PORT_ENV}={port} is not a port")))?;
        }
        if let Some(exe) = var(EXECUTABLE_ENV) {
            self.session.launch.executable = Some(PathBuf::from(exe));
        }
        if let Some(ms) = var(TIMEOUT_ENV) {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{TIMEOUT_ENV}={ms} is not milliseconds")))?;
            self.session.timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = var(NO_LAUNCH_ENV) {
            self.session.auto_launch = matches!(flag.trim(), "" | "0" | "false" | "no");
        }
        Ok(())
    }

    #[must_use]
    pub fn into_session_config(self) -> SessionConfig {
        self.session
    }
}

const TOP_LEVEL_KEYS: &[&str] = &[
    "host",
    "port",
    "timeout",
    "connectTimeout",
    "autoLaunch",
    "launch",
    "eventQueue",
];

const LAUNCH_KEYS: &[&str] = &[
    "executable",
    "newInstance",
    "noSplash",
    "hidden",
    "exitLastCom",
    "extraArgs",
    "commands",
    "deadline",
    "killOnClose",
];

/// Log config keys nothing reads.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    for path in unknown_fields(content) {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

fn unknown_fields(content: &str) -> Vec<String> {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    let top: HashSet<&str> = TOP_LEVEL_KEYS.iter().copied().collect();
    let launch: HashSet<&str> = LAUNCH_KEYS.iter().copied().collect();

    let mut unknowns = Vec::new();
    for (key, child) in &obj {
        if !top.contains(key.as_str()) {
            unknowns.push(key.clone());
        } else if key == "launch"
            && let Value::Object(nested) = child
        {
            unknowns.extend(
                nested
                    .keys()
                    .filter(|k| !launch.contains(k.as_str()))
                    .map(|k| format!("launch.{k}")),
            );
        }
    }
    unknowns
}
