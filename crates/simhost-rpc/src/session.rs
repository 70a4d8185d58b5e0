//! Serialized RPC session.
//!
//! A [`Session`] owns one connection to the host. Every RPC holds the
//! session lock from the moment its command line is queued until its
//! status has been read, so RPCs on one session never interleave on the
//! wire and complete in call order.
//!
//! ```text
//! DISCONNECTED --rpc()/connect()--> CONNECTING --ok--> READY
//!       ^                               |               |
//!       +------------fail---------------+   fatal error v
//!       +---------------connect()------------------- BROKEN
//! ```
//!
//! An [`Rpc`] dropped before its reply status was read (an early `?` or a
//! cancelled future) leaves the stream mid-message. The guard then drops
//! the connection and the session goes back to DISCONNECTED, so the next
//! RPC starts on a fresh connection.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::launcher::{LaunchOptions, duration_ms, retry_until, spawn_host};
use crate::protocol::{DEFAULT_HOST, DEFAULT_PORT, STATUS_OK, STATUS_WARNING};
use crate::transport::Connection;
use crate::wire::{Decode, Encode};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Read timeout applied to every RPC.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Start the host when nothing is listening.
    pub auto_launch: bool,
    pub launch: LaunchOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_launch: true,
            launch: LaunchOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Config for an already running host at `host:port`, without launching.
    #[must_use]
    pub fn at(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auto_launch: false,
            ..Self::default()
        }
    }

    /// Open a connection and complete the handshake. Never launches.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host is unreachable or refuses the
    /// handshake.
    pub async fn open_connection(&self) -> Result<(Connection, i32)> {
        let mut conn = Connection::open(&self.host, self.port, self.connect_timeout).await?;
        conn.set_timeout(Some(self.timeout));
        let version = conn.handshake().await?;
        Ok((conn, version))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Broken,
}

struct Slot {
    conn: Option<Connection>,
    state: SessionState,
    timeout: Duration,
    version: Option<i32>,
    child: Option<Child>,
}

struct Inner {
    config: SessionConfig,
    slot: Mutex<Slot>,
}

/// Cheap-to-clone handle to one host connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a session. Nothing is opened until the first RPC or an
    /// explicit [`Session::connect`].
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let timeout = config.timeout;
        Self {
            inner: Arc::new(Inner {
                config,
                slot: Mutex::new(Slot {
                    conn: None,
                    state: SessionState::Disconnected,
                    timeout,
                    version: None,
                    child: None,
                }),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// True when both handles refer to the same session.
    #[must_use]
    pub fn same_session(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn state(&self) -> SessionState {
        self.inner.slot.lock().await.state
    }

    /// Protocol version reported by the host at the last handshake.
    pub async fn host_version(&self) -> Option<i32> {
        self.inner.slot.lock().await.version
    }

    pub async fn timeout(&self) -> Duration {
        self.inner.slot.lock().await.timeout
    }

    /// Change the default RPC timeout.
    pub async fn set_timeout(&self, timeout: Duration) {
        let mut slot = self.inner.slot.lock().await;
        slot.timeout = timeout;
        if let Some(conn) = slot.conn.as_mut() {
            conn.set_timeout(Some(timeout));
        }
    }

    /// Drop any existing connection and connect again. This is the only way
    /// out of BROKEN.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host cannot be reached (and could
    /// not be launched).
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.inner.slot.lock().await;
        slot.conn = None;
        self.inner.establish(&mut slot).await
    }

    /// Close the connection. A launched host is killed when
    /// `launch.kill_on_close` is set.
    pub async fn close(&self) {
        let mut slot = self.inner.slot.lock().await;
        slot.conn = None;
        slot.state = SessionState::Disconnected;

        if let Some(mut child) = slot.child.take() {
            if self.inner.config.launch.kill_on_close {
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop launched host: {e}");
                }
            } else if let Ok(Some(status)) = child.try_wait() {
                debug!("Launched host already exited: {status}");
            }
        }
        debug!("Session closed");
    }

    /// Begin an RPC: lock the session, connect if needed and queue the
    /// command line. Arguments and results go through the returned guard,
    /// which must be finished with [`Rpc::finish`] (or
    /// [`Rpc::check_status`]) to read the reply status. A guard dropped
    /// before that closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the session is BROKEN or cannot
    /// connect.
    pub async fn rpc(&self, command: &str) -> Result<Rpc<'_>> {
        let mut slot = self.inner.slot.lock().await;
        match slot.state {
            SessionState::Ready => {}
            SessionState::Broken => {
                return Err(Error::connection(
                    "session is broken; call connect() to start a new one",
                ));
            }
            SessionState::Disconnected | SessionState::Connecting => {
                self.inner.establish(&mut slot).await?;
            }
        }

        debug!("rpc {command}");
        let mut rpc = Rpc {
            slot,
            in_sync: false,
        };
        rpc.send(command)?;
        Ok(rpc)
    }
}

impl Inner {
    async fn establish(&self, slot: &mut Slot) -> Result<()> {
        slot.state = SessionState::Connecting;
        match self.open_or_launch(slot).await {
            Ok((mut conn, version)) => {
                conn.set_timeout(Some(slot.timeout));
                slot.version = Some(version);
                info!(
                    "Connected to host at {} (protocol {version})",
                    conn.peer()
                );
                slot.conn = Some(conn);
                slot.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                slot.state = SessionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn open_or_launch(&self, slot: &mut Slot) -> Result<(Connection, i32)> {
        let config = &self.config;
        let first = match config.open_connection().await {
            Ok(opened) => return Ok(opened),
            Err(e) => e,
        };

        if !config.auto_launch || first.kind() != ErrorKind::Connection {
            return Err(first);
        }

        debug!("No host at {}:{} ({first})", config.host, config.port);
        reap_exited_child(slot);
        if slot.child.is_none() {
            slot.child = Some(spawn_host(&config.launch, config.port)?);
        }

        let (mut conn, version) =
            retry_until(config.launch.deadline, move || config.open_connection()).await?;

        for (key, value) in &config.launch.commands {
            apply_command(&mut conn, key, value).await?;
        }
        Ok((conn, version))
    }
}

/// Forget a launched host that has already exited so it is started again.
fn reap_exited_child(slot: &mut Slot) -> Option<std::process::ExitStatus> {
    let status = slot.child.as_mut()?.try_wait().ok().flatten()?;
    info!("Launched host exited ({status}); it will be started again");
    slot.child = None;
    Some(status)
}

async fn apply_command(conn: &mut Connection, key: &str, value: &str) -> Result<()> {
    debug!("Applying launch command {key}={value}");
    conn.send("SCMD")?;
    conn.send(key)?;
    conn.send(value)?;
    let _reply: String = conn.recv().await?;
    read_status(conn).await
}

/// Read a reply status and, for non-zero statuses, its message line.
async fn read_status(conn: &mut Connection) -> Result<()> {
    let status: i32 = conn.recv().await?;
    if status == STATUS_OK {
        return Ok(());
    }

    let message: String = conn.recv().await?;
    if status == STATUS_WARNING {
        warn!("Host warning: {message}");
        return Ok(());
    }
    Err(Error::from_status(status, message).unwrap_or(Error::Host {
        status,
        message: String::new(),
    }))
}

/// One in-flight RPC. Holds the session lock until dropped.
pub struct Rpc<'a> {
    slot: MutexGuard<'a, Slot>,
    /// True only between a fully read status and the next queued field.
    in_sync: bool,
}

impl Rpc<'_> {
    fn conn(&mut self) -> Result<&mut Connection> {
        self.slot
            .conn
            .as_mut()
            .ok_or_else(|| Error::connection("session is not connected"))
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal()
        {
            error!("Session broken: {e}");
            self.slot.conn = None;
            self.slot.state = SessionState::Broken;
        }
        result
    }

    /// Use a different read timeout for the rest of this call. The session
    /// timeout is restored when the guard drops.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Some(conn) = self.slot.conn.as_mut() {
            conn.set_timeout(Some(timeout));
        }
        self
    }

    /// Queue one argument.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the value cannot be framed.
    pub fn send<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.in_sync = false;
        let result = self.conn().and_then(|c| c.send(value));
        self.check(result)
    }

    /// Receive one typed result.
    ///
    /// # Errors
    ///
    /// Fatal transport errors mark the session BROKEN before returning.
    pub async fn recv<T: Decode>(&mut self) -> Result<T> {
        self.in_sync = false;
        let result = match self.conn() {
            Ok(conn) => conn.recv().await,
            Err(e) => Err(e),
        };
        self.check(result)
    }

    /// Read the status that ends every reply. Status `2` is logged as a
    /// warning and treated as success.
    ///
    /// # Errors
    ///
    /// Returns the error mapped from a failure status.
    pub async fn check_status(&mut self) -> Result<()> {
        self.in_sync = false;
        let result = match self.conn() {
            Ok(conn) => read_status(conn).await,
            Err(e) => Err(e),
        };
        let result = self.check(result);
        // A failure status still ends the reply; only fatal errors do not.
        self.in_sync = match &result {
            Ok(()) => true,
            Err(e) => !e.is_fatal(),
        };
        result
    }

    /// Read the final status and release the session.
    ///
    /// # Errors
    ///
    /// Returns the error mapped from a failure status.
    pub async fn finish(mut self) -> Result<()> {
        self.check_status().await
    }

    /// Shorthand for `recv` followed by `finish`.
    ///
    /// # Errors
    ///
    /// Any receive or status error.
    pub async fn reply<T: Decode>(mut self) -> Result<T> {
        let value = self.recv().await?;
        self.finish().await?;
        Ok(value)
    }
}

impl Drop for Rpc<'_> {
    fn drop(&mut self) {
        if !self.in_sync && self.slot.conn.is_some() {
            warn!("RPC abandoned before its reply was read; dropping the connection");
            self.slot.conn = None;
            self.slot.state = SessionState::Disconnected;
            return;
        }
        let timeout = self.slot.timeout;
        if let Some(conn) = self.slot.conn.as_mut() {
            conn.set_timeout(Some(timeout));
        }
    }
}

impl std::fmt::Debug for Rpc<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rpc")
            .field("in_sync", &self.in_sync)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .finish_non_exhaustive()
    }
}
