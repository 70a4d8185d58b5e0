//! Client library for the simhost robot simulation and offline programming
//! host.
//!
//! A [`Client`] owns one serialized RPC session. Items it returns are
//! lightweight proxies: a handle, a type tag and a back-pointer to the
//! client. Everything else lives in the host and is fetched on demand.
//!
//! # Architecture
//!
//! - [`client`]: station-level calls, rendering control, station parameters
//! - [`item`]: the [`Item`] proxy and its operation families
//! - [`joint_list`]: simulated program trajectories and path error flags
//! - [`events`]: the asynchronous event channel
//! - [`settings`] and [`form`]: typed app settings persisted on the host,
//!   and widget descriptions generated from them
//! - [`config`]: the client configuration file and environment overrides
//! - [`app`]: stop flag for scripts launched from the host
//!
//! # Example
//!
//! ```no_run
//! use simhost::{Client, ItemType, SessionConfig};
//!
//! # async fn example() -> simhost::Result<()> {
//! let client = Client::new(SessionConfig::default());
//! let robot = client.item("UR10", ItemType::Robot).await?.expect("robot in station");
//!
//! let mut joints = robot.joints().await?;
//! joints[0] += 10.0;
//! robot.move_j(&joints, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod client;
pub mod config;
pub mod events;
pub mod form;
pub mod item;
pub mod joint_list;
pub mod param;
pub mod settings;

#[cfg(test)]
mod tests;

pub use app::AppRunner;
pub use client::{Client, MotionState, RunMode};
pub use config::ClientConfig;
pub use events::{Event, EventChannel, EventPayload, EventType};
pub use item::Item;
pub use joint_list::{Detail, Discretization, JointList, JointSample, PathError, PathErrorFlags};
pub use param::ParamValue;
pub use settings::{AppSettings, Dropdown};

pub use simhost_math as math;
pub use simhost_rpc::{Error, ErrorKind, ItemType, RawItem, Result, Session, SessionConfig};
