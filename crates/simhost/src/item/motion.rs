//! Moves, motion tests and speed settings.
//!
//! On a robot these commands move the robot (or its simulation). On a
//! program they append the matching instruction instead.

use std::time::Duration;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use simhost_math::Pose;
use simhost_rpc::{CodecError, Encode, Error, ItemType, Result};
use tracing::debug;

use super::Item;
use crate::client::LONG_TIMEOUT;

const MOVE_JOINT: i32 = 1;
const MOVE_LINEAR: i32 = 2;
const MOVE_CIRCULAR: i32 = 3;

/// Reported by `set_speed`/`set_acceleration` for values left unchanged.
const UNCHANGED: f64 = -1.0;

/// Where a move goes.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Joints(&'a [f64]),
    Pose(&'a Pose),
    Item(&'a Item),
}

impl Target<'_> {
    fn kind(&self) -> i32 {
        match self {
            Self::Joints(_) => 1,
            Self::Pose(_) => 2,
            Self::Item(_) => 3,
        }
    }
}

impl<'a> From<&'a [f64]> for Target<'a> {
    fn from(joints: &'a [f64]) -> Self {
        Self::Joints(joints)
    }
}

impl<'a> From<&'a Vec<f64>> for Target<'a> {
    fn from(joints: &'a Vec<f64>) -> Self {
        Self::Joints(joints)
    }
}

impl<'a, const N: usize> From<&'a [f64; N]> for Target<'a> {
    fn from(joints: &'a [f64; N]) -> Self {
        Self::Joints(joints)
    }
}

impl<'a> From<&'a Pose> for Target<'a> {
    fn from(pose: &'a Pose) -> Self {
        Self::Pose(pose)
    }
}

impl<'a> From<&'a Item> for Target<'a> {
    fn from(item: &'a Item) -> Self {
        Self::Item(item)
    }
}

impl Encode for Target<'_> {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        self.kind().encode(dst)?;
        match self {
            Self::Joints(joints) => joints.encode(dst),
            Self::Pose(pose) => pose.encode(dst),
            Self::Item(item) => item.encode(dst),
        }
    }
}

/// How curves and points are projected onto the reference object's surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Projection {
    #[default]
    None,
    Closest,
    AlongNormal,
    AlongNormalRecalc,
    ClosestRecalc,
    /// Keep the points, recompute normals only.
    Recalc,
}

impl Projection {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Closest => 1,
            Self::AlongNormal => 2,
            Self::AlongNormalRecalc => 3,
            Self::ClosestRecalc => 4,
            Self::Recalc => 5,
        }
    }
}

/// Last speeds and accelerations set on a robot. `None` means never set
/// through this client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Speed {
    /// mm/s
    pub linear: Option<f64>,
    /// deg/s
    pub joints: Option<f64>,
    /// mm/s²
    pub accel_linear: Option<f64>,
    /// deg/s²
    pub accel_joints: Option<f64>,
}

fn positive(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::input(format!("{what} must be positive, got {value}")))
    }
}

impl Item {
    /// Joint move. `blocking` waits until the robot stops.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for a joint target of the wrong length and
    /// `Error::TargetReach` when the host cannot reach the target.
    pub async fn move_j<'a>(&self, target: impl Into<Target<'a>>, blocking: bool) -> Result<()> {
        self.move_to(MOVE_JOINT, &[target.into()], blocking).await
    }

    /// Linear move. `blocking` waits until the robot stops.
    ///
    /// # Errors
    ///
    /// As [`Item::move_j`].
    pub async fn move_l<'a>(&self, target: impl Into<Target<'a>>, blocking: bool) -> Result<()> {
        self.move_to(MOVE_LINEAR, &[target.into()], blocking).await
    }

    /// Circular move through `via` to `end`.
    ///
    /// # Errors
    ///
    /// As [`Item::move_j`].
    pub async fn move_c<'a>(
        &self,
        via: impl Into<Target<'a>>,
        end: impl Into<Target<'a>>,
        blocking: bool,
    ) -> Result<()> {
        self.move_to(MOVE_CIRCULAR, &[via.into(), end.into()], blocking)
            .await
    }

    async fn move_to(&self, move_type: i32, targets: &[Target<'_>], blocking: bool) -> Result<()> {
        for target in targets {
            self.check_target(target)?;
        }

        if self.item_type() == ItemType::Program {
            return self.append_move(move_type, targets).await;
        }
        self.require_mechanism("move")?;

        let session = self.session()?;
        let mut rpc = session.rpc("MoveX").await?;
        rpc.send(&move_type)?;
        for target in targets {
            rpc.send(target)?;
        }
        rpc.send(&self.raw)?;
        rpc.finish().await?;

        if blocking {
            self.wait_move(LONG_TIMEOUT).await?;
        }
        Ok(())
    }

    /// Programs only take target items; the host stores the target's pose
    /// or joints with the instruction.
    async fn append_move(&self, move_type: i32, targets: &[Target<'_>]) -> Result<()> {
        let mut items = Vec::with_capacity(targets.len());
        for target in targets {
            let Target::Item(item) = target else {
                return Err(Error::input("program moves need target items"));
            };
            items.push(*item);
        }

        // The move type tells the host how many target items follow.
        let session = self.session()?;
        let mut rpc = session.rpc("Add_INSMOVE").await?;
        rpc.send(&self.raw)?;
        rpc.send(&move_type)?;
        for item in items {
            rpc.send(item)?;
        }
        rpc.finish().await
    }

    fn check_target(&self, target: &Target<'_>) -> Result<()> {
        match target {
            Target::Joints(joints) => {
                if self.item_type() == ItemType::Program {
                    return Ok(());
                }
                self.check_joints(joints)
            }
            Target::Pose(pose) => {
                if pose.to_col_major().iter().all(|v| v.is_finite()) {
                    Ok(())
                } else {
                    Err(Error::input("target pose contains a non-finite value"))
                }
            }
            Target::Item(item) => item.ensure_valid(),
        }
    }

    /// Block until the robot finishes its current motion.
    ///
    /// The host acknowledges the request, then answers again when the
    /// motion ends; `timeout` bounds the second wait.
    ///
    /// # Errors
    ///
    /// Returns `Error::Stopped` when the motion is aborted.
    pub async fn wait_move(&self, timeout: Duration) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("WaitMove").await?;
        rpc.send(&self.raw)?;
        rpc.check_status().await?;
        debug!("Waiting for {:#x} to stop", self.raw.handle);
        rpc.with_timeout(timeout).finish().await
    }

    /// Test a joint move for collisions, stepping `step_deg` degrees.
    /// Returns the number of colliding pairs found.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for joint vectors of the wrong length.
    pub async fn move_j_test(&self, from: &[f64], to: &[f64], step_deg: f64) -> Result<i32> {
        self.check_joints(from)?;
        self.check_joints(to)?;
        let step = positive("step", step_deg)?;
        let session = self.session()?;
        let mut rpc = session.rpc("CollisionMove").await?.with_timeout(LONG_TIMEOUT);
        rpc.send(&self.raw)?;
        rpc.send(from)?;
        rpc.send(to)?;
        rpc.send(&step)?;
        rpc.reply().await
    }

    /// Test whether a linear move from `from` to `to` is kinematically
    /// feasible. Returns `0` when it is, `-1` when a point is unreachable,
    /// `-2` for a singularity on the way.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for a joint vector of the wrong length.
    pub async fn move_l_test(&self, from: &[f64], to: &Pose, step_mm: f64) -> Result<i32> {
        self.linear_check(from, to, step_mm, false).await
    }

    /// As [`Item::move_l_test`], also checking collisions. A positive result
    /// is the number of colliding pairs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for a joint vector of the wrong length.
    pub async fn move_l_collision(&self, from: &[f64], to: &Pose, step_mm: f64) -> Result<i32> {
        self.linear_check(from, to, step_mm, true).await
    }

    async fn linear_check(
        &self,
        from: &[f64],
        to: &Pose,
        step_mm: f64,
        collisions: bool,
    ) -> Result<i32> {
        self.check_joints(from)?;
        self.check_target(&Target::Pose(to))?;
        let step = positive("step", step_mm)?;
        let session = self.session()?;
        let mut rpc = session.rpc("CollisionMoveL").await?.with_timeout(LONG_TIMEOUT);
        rpc.send(&self.raw)?;
        rpc.send(from)?;
        rpc.send(to)?;
        rpc.send(&step)?;
        rpc.send(&i32::from(collisions))?;
        rpc.reply().await
    }

    /// Set linear speed (mm/s) and optionally joint speed (deg/s).
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for non-positive speeds.
    pub async fn set_speed(&self, linear: f64, joints: Option<f64>) -> Result<()> {
        let linear = positive("linear speed", linear)?;
        let joints = joints.map(|j| positive("joint speed", j)).transpose()?;
        let values = [linear, joints.unwrap_or(UNCHANGED), UNCHANGED, UNCHANGED];
        self.call_with("S_Speed4", &values[..]).await?;
        self.update_motion(|state| {
            state.speed.linear = Some(linear);
            if joints.is_some() {
                state.speed.joints = joints;
            }
        })
    }

    /// Set linear acceleration (mm/s²) and optionally joint acceleration
    /// (deg/s²).
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for non-positive accelerations.
    pub async fn set_acceleration(&self, linear: f64, joints: Option<f64>) -> Result<()> {
        let linear = positive("linear acceleration", linear)?;
        let joints = joints
            .map(|j| positive("joint acceleration", j))
            .transpose()?;
        let values = [UNCHANGED, UNCHANGED, linear, joints.unwrap_or(UNCHANGED)];
        self.call_with("S_Speed4", &values[..]).await?;
        self.update_motion(|state| {
            state.speed.accel_linear = Some(linear);
            if joints.is_some() {
                state.speed.accel_joints = joints;
            }
        })
    }

    /// Corner rounding radius in mm. `-1` requests an exact stop where the
    /// controller distinguishes it from `0`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for values below `-1`.
    pub async fn set_rounding(&self, mm: f64) -> Result<()> {
        if !mm.is_finite() || mm < -1.0 {
            return Err(Error::input(format!("rounding must be >= -1, got {mm}")));
        }
        self.call_with("S_ZoneData", &mm).await?;
        self.update_motion(|state| state.rounding = Some(mm))
    }

    /// Older name for [`Item::set_rounding`].
    ///
    /// # Errors
    ///
    /// As [`Item::set_rounding`].
    pub async fn set_zone_data(&self, mm: f64) -> Result<()> {
        self.set_rounding(mm).await
    }

    /// True while a robot moves or a program runs.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn busy(&self) -> Result<bool> {
        let busy: i32 = self.call("IsBusy").await?;
        Ok(busy != 0)
    }

    /// Stop the robot or program.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn stop(&self) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("Stop").await?;
        rpc.send(&self.raw)?;
        rpc.finish().await
    }
}
