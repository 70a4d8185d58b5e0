//! Client-side protocol plumbing for the simhost simulation host.
//!
//! This crate knows how to talk to the host but nothing about what the
//! commands mean; the `simhost` crate builds the item API on top of it.
//!
//! # Architecture
//!
//! - [`wire`]: typed field codec (`int32`, `float64`, line, array, matrix,
//!   pose, item, bytes)
//! - [`transport`]: buffered TCP connection with read timeouts and the
//!   connect handshake
//! - [`launcher`]: host executable discovery, launch flags and retry backoff
//! - [`session`]: lazily connected, mutex-serialized RPC session
//! - [`protocol`]: constants, item types and the raw item handle
//! - [`error`]: the client error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use simhost_rpc::{Session, SessionConfig};
//!
//! # async fn example() -> simhost_rpc::Result<()> {
//! let session = Session::new(SessionConfig::default());
//!
//! let mut rpc = session.rpc("G_Version").await?;
//! let version: String = rpc.recv().await?;
//! rpc.finish().await?;
//!
//! println!("host version {version}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod launcher;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod wire;

pub use simhost_math;

pub use error::{Error, ErrorKind, Result};
pub use launcher::{LaunchOptions, find_executable};
pub use protocol::{DEFAULT_HOST, DEFAULT_PORT, ItemType, PROTOCOL_VERSION, RawItem};
pub use session::{Rpc, Session, SessionConfig, SessionState};
pub use transport::Connection;
pub use wire::{Blob, CodecError, Decode, Encode, WireCodec};
