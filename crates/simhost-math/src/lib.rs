//! Pose and matrix algebra for simhost clients.
//!
//! Everything the host sends or receives as geometry lives here so it can be
//! used without a connection:
//!
//! - [`Pose`]: 4x4 homogeneous transform (mm, radians)
//! - [`Mat`]: general dense matrix used for joint lists and point clouds
//! - [`euler`], [`quaternion`], [`vendor`]: rotation conventions
//! - [`vector`]: 3-vector helpers and projections
//! - [`io`]: binary and CSV matrix files
//! - [`Stopwatch`]: `tic` / `toc`
//!
//! # Example
//!
//! ```
//! use simhost_math::{Pose, vendor};
//!
//! let target = vendor::kuka_2_pose(&[500.0, 0.0, 800.0, 0.0, 90.0, 0.0]);
//! let approach = target.rel_tool(0.0, 0.0, -100.0);
//! assert!((target.distance(&approach) - 100.0).abs() < 1e-9);
//! ```

pub mod error;
pub mod euler;
pub mod io;
pub mod mat;
pub mod pose;
pub mod quaternion;
pub mod timer;
pub mod vector;
pub mod vendor;

pub use error::{MathError, Result};
pub use euler::{EulerOrder, euler_2_pose, pose_2_euler, pose_2_xyzrpw, xyzrpw_2_pose};
pub use mat::Mat;
pub use pose::{POSE_TOLERANCE, Pose};
pub use quaternion::{Quaternion, pose_2_quaternion, quaternion_2_pose};
pub use timer::Stopwatch;
pub use vector::Vec3;
