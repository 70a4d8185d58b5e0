//! Host executable discovery and launch.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_PORT;

/// Environment variable naming the host executable.
pub const EXECUTABLE_ENV: &str = "SIMHOST_EXECUTABLE";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);
const BACKOFF_START: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(1);

/// How to start the host when nothing is listening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    /// Start a separate instance even if one is already running.
    pub new_instance: bool,
    pub no_splash: bool,
    pub hidden: bool,
    /// Ask the host to exit when the last API client disconnects.
    pub exit_last_com: bool,
    /// Forwarded verbatim after the recognised flags.
    pub extra_args: Vec<String>,
    /// Applied through `Command` once the connection is up.
    pub commands: Vec<(String, String)>,
    #[serde(with = "duration_ms")]
    pub deadline: Duration,
    /// Kill the launched host when the session closes.
    pub kill_on_close: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            new_instance: false,
            no_splash: true,
            hidden: false,
            exit_last_com: false,
            extra_args: Vec::new(),
            commands: Vec::new(),
            deadline: DEFAULT_DEADLINE,
            kill_on_close: false,
        }
    }
}

impl LaunchOptions {
    /// Command-line arguments for the host.
    #[must_use]
    pub fn args(&self, port: u16) -> Vec<String> {
        let mut args = Vec::new();
        if self.new_instance {
            args.push("-NEWINSTANCE".to_string());
        }
        if self.no_splash {
            args.push("-NOSPLASH".to_string());
        }
        if self.hidden {
            args.push("-HIDDEN".to_string());
        }
        if self.exit_last_com {
            args.push("-EXIT_LAST_COM".to_string());
        }
        if port != DEFAULT_PORT {
            args.push(format!("-PORT={port}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(windows)]
const BINARY_NAME: &str = "SimHost.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "simhost";

fn well_known_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(windows) {
        paths.push(PathBuf::from(r"C:\SimHost\bin\SimHost.exe"));
        if let Ok(pf) = std::env::var("ProgramFiles") {
            paths.push(Path::new(&pf).join(r"SimHost\bin\SimHost.exe"));
        }
    } else if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/SimHost.app/Contents/MacOS/SimHost",
        ));
    } else {
        paths.push(PathBuf::from("/opt/simhost/bin/simhost"));
        paths.push(PathBuf::from("/usr/local/bin/simhost"));
        if let Ok(home) = std::env::var("HOME") {
            paths.push(Path::new(&home).join("simhost/bin/simhost"));
        }
    }
    paths
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Install directory recorded in the registry.
#[cfg(windows)]
fn registry_lookup() -> Option<PathBuf> {
    let output = std::process::Command::new("reg")
        .args(["query", r"HKLM\SOFTWARE\SimHost", "/v", "INSTDIR"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    parse_reg_query(&text).map(|dir| dir.join("bin").join(BINARY_NAME))
}

#[cfg(not(windows))]
fn registry_lookup() -> Option<PathBuf> {
    None
}

/// Pull the value out of `reg query` output:
/// `    INSTDIR    REG_SZ    C:\SimHost`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_reg_query(text: &str) -> Option<PathBuf> {
    text.lines().find_map(|line| {
        let (_, value) = line.split_once("REG_SZ")?;
        let value = value.trim();
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

/// Locate the host executable.
///
/// Order: `explicit`, `SIMHOST_EXECUTABLE`, `PATH`, OS install locations,
/// then the Windows registry.
#[must_use]
pub fn find_executable(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(EXECUTABLE_ENV).map(PathBuf::from)
        && path.is_file()
    {
        return Some(path);
    }

    search_path(BINARY_NAME)
        .or_else(|| well_known_paths().into_iter().find(|p| p.is_file()))
        .or_else(registry_lookup)
}

/// Start the host process.
///
/// # Errors
///
/// Returns `Error::Connection` if no executable is found or it fails to
/// spawn.
pub fn spawn_host(options: &LaunchOptions, port: u16) -> Result<Child> {
    let exe = find_executable(options.executable.as_deref()).ok_or_else(|| {
        Error::connection("host executable not found; set SIMHOST_EXECUTABLE or launch.executable")
    })?;

    let args = options.args(port);
    info!("Launching host: {} {}", exe.display(), args.join(" "));

    Command::new(&exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(options.kill_on_close)
        .spawn()
        .map_err(|e| Error::connection(format!("failed to start {}: {e}", exe.display())))
}

/// Retry delays: 100 ms doubling up to 1 s.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            next: BACKOFF_START,
            cap: BACKOFF_CAP,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = (self.next * 2).min(self.cap);
        Some(current)
    }
}

/// Run `attempt` until it succeeds or `deadline` passes, sleeping with
/// [`Backoff`] in between. The last error is returned as
/// `Error::Connection`.
///
/// # Errors
///
/// Returns `Error::Connection` once the deadline is exhausted.
pub async fn retry_until<T, F, Fut>(deadline: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = tokio::time::Instant::now();
    let mut delays = Backoff::default();
    let mut tries = 0u32;

    loop {
        tries += 1;
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let elapsed = started.elapsed();
        if elapsed >= deadline {
            return Err(Error::connection(format!(
                "gave up after {tries} attempts in {elapsed:?}: {err}"
            )));
        }

        let delay = delays.next().unwrap_or(BACKOFF_CAP).min(deadline - elapsed);
        debug!("Attempt {tries} failed ({err}); retrying in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_default_args() {
        let opts = LaunchOptions::default();
        assert_eq!(opts.args(DEFAULT_PORT), vec!["-NOSPLASH"]);
    }

    #[test]
    fn test_all_flags_and_port() {
        let opts = LaunchOptions {
            new_instance: true,
            no_splash: false,
            hidden: true,
            exit_last_com: true,
            extra_args: vec!["-THEME=dark".into()],
            ..LaunchOptions::default()
        };
        assert_eq!(
            opts.args(20501),
            vec![
                "-NEWINSTANCE",
                "-HIDDEN",
                "-EXIT_LAST_COM",
                "-PORT=20501",
                "-THEME=dark"
            ]
        );
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let delays: Vec<u128> = Backoff::default().take(6).map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("host-bin");
        assert!(find_executable(Some(&exe)).is_none());
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(find_executable(Some(&exe)), Some(exe));
    }

    #[test]
    fn test_parse_reg_query() {
        let out = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\SimHost\r\n    INSTDIR    REG_SZ    C:\\SimHost\r\n";
        assert_eq!(parse_reg_query(out), Some(PathBuf::from("C:\\SimHost")));
        assert_eq!(parse_reg_query("ERROR: not found"), None);
    }

    #[test]
    fn test_options_json() {
        let opts: LaunchOptions =
            serde_json::from_str(r#"{"hidden": true, "deadline": 2500}"#).unwrap();
        assert!(opts.hidden);
        assert!(opts.no_splash);
        assert_eq!(opts.deadline, Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = retry_until(Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(Error::connection("not yet"))
                } else {
                    Ok(5)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_gives_up() {
        let err = retry_until(Duration::from_secs(2), || async {
            Err::<(), _>(Error::Timeout)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.to_string().contains("gave up"));
    }
}
