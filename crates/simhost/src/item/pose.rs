//! Poses, joints and kinematics.

use serde::{Deserialize, Serialize};
use simhost_math::{Mat, Pose};
use simhost_rpc::{Error, Result};

use super::Item;

/// Joint range of a mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Host code for the joint kind (rotary, linear, mixed).
    pub joint_type: i32,
}

impl JointLimits {
    #[must_use]
    pub fn contains(&self, joints: &[f64]) -> bool {
        joints.len() == self.lower.len()
            && joints
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(j, (lo, hi))| (lo..=hi).contains(&j))
    }
}

/// Robot configuration flags for a joint solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JointsConfig {
    pub rear: bool,
    pub lower_arm: bool,
    pub flip: bool,
}

fn check_finite(what: &str, values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::input(format!("{what} contains a non-finite value")))
    }
}

impl Item {
    /// Pose relative to the parent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn pose(&self) -> Result<Pose> {
        self.call("G_Hlocal").await
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_pose(&self, pose: &Pose) -> Result<()> {
        self.call_with("S_Hlocal", pose).await
    }

    /// Pose relative to the station.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn pose_abs(&self) -> Result<Pose> {
        self.call("G_Hlocal_Abs").await
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_pose_abs(&self, pose: &Pose) -> Result<()> {
        self.call_with("S_Hlocal_Abs", pose).await
    }

    /// Active tool pose of this robot, relative to the flange.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn pose_tool(&self) -> Result<Pose> {
        let pose: Pose = self.call("G_Tool").await?;
        self.update_motion(|state| state.tool = Some(pose))?;
        Ok(pose)
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_pose_tool(&self, tool: &Pose) -> Result<()> {
        self.call_with("S_Tool", tool).await?;
        self.update_motion(|state| state.tool = Some(*tool))
    }

    /// Make `tool` the active tool of this robot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn set_tool_item(&self, tool: &Item) -> Result<()> {
        self.call_with("S_Tool_ptr", tool).await?;
        self.update_motion(|state| state.tool = None)
    }

    /// Active reference frame pose of this robot, relative to its base.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn pose_frame(&self) -> Result<Pose> {
        let pose: Pose = self.call("G_Frame").await?;
        self.update_motion(|state| state.frame = Some(pose))?;
        Ok(pose)
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_pose_frame(&self, frame: &Pose) -> Result<()> {
        self.call_with("S_Frame", frame).await?;
        self.update_motion(|state| state.frame = Some(*frame))
    }

    /// Make `frame` the active reference frame of this robot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn set_frame_item(&self, frame: &Item) -> Result<()> {
        self.call_with("S_Frame_ptr", frame).await?;
        self.update_motion(|state| state.frame = None)
    }

    /// Current joint values (robots) or stored joints (targets).
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn joints(&self) -> Result<Vec<f64>> {
        let joints: Vec<f64> = self.call("G_Thetas").await?;
        self.remember_dof(joints.len())?;
        Ok(joints)
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the length differs from a known DOF.
    pub async fn set_joints(&self, joints: &[f64]) -> Result<()> {
        self.check_joints(joints)?;
        self.call_with("S_Thetas", joints).await
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn joints_home(&self) -> Result<Vec<f64>> {
        let joints: Vec<f64> = self.call("G_Home").await?;
        self.remember_dof(joints.len())?;
        Ok(joints)
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the length differs from a known DOF.
    pub async fn set_joints_home(&self, joints: &[f64]) -> Result<()> {
        self.check_joints(joints)?;
        self.call_with("S_Home", joints).await
    }

    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bounds differ in length.
    pub async fn joint_limits(&self) -> Result<JointLimits> {
        let session = self.session()?;
        let mut rpc = session.rpc("G_RobLimits").await?;
        rpc.send(&self.raw)?;
        let lower: Vec<f64> = rpc.recv().await?;
        let upper: Vec<f64> = rpc.recv().await?;
        let joint_type: i32 = rpc.recv().await?;
        rpc.finish().await?;

        if lower.len() != upper.len() {
            return Err(simhost_rpc::CodecError::Malformed(format!(
                "joint limits of {} and {} values",
                lower.len(),
                upper.len()
            ))
            .into());
        }
        self.remember_dof(lower.len())?;
        Ok(JointLimits {
            lower,
            upper,
            joint_type,
        })
    }

    /// Degrees of freedom, from the cache or by reading the joints.
    ///
    /// # Errors
    ///
    /// Any RPC error when the DOF is not cached yet.
    pub async fn dof(&self) -> Result<usize> {
        if let Some(dof) = self.cached_dof()? {
            return Ok(dof);
        }
        Ok(self.joints().await?.len())
    }

    /// Forward kinematics: flange pose for `joints`, then `* tool`, seen
    /// from `reference` when given.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for a wrong joint count or a singular
    /// reference.
    pub async fn solve_fk(
        &self,
        joints: &[f64],
        tool: Option<&Pose>,
        reference: Option<&Pose>,
    ) -> Result<Pose> {
        self.check_joints(joints)?;
        let session = self.session()?;
        let mut rpc = session.rpc("G_FK").await?;
        rpc.send(joints)?;
        rpc.send(&self.raw)?;
        let mut pose: Pose = rpc.reply().await?;

        if let Some(tool) = tool {
            pose = pose * *tool;
        }
        if let Some(reference) = reference {
            pose = reference.inv()? * pose;
        }
        Ok(pose)
    }

    /// Inverse kinematics closest to `approx` (or to the current joints).
    /// `pose` is the tool pose in `reference` when those are given,
    /// otherwise the flange pose relative to the robot base.
    ///
    /// # Errors
    ///
    /// Returns `Error::TargetReach` when the host finds no solution.
    pub async fn solve_ik(
        &self,
        pose: &Pose,
        approx: Option<&[f64]>,
        tool: Option<&Pose>,
        reference: Option<&Pose>,
    ) -> Result<Vec<f64>> {
        let flange = flange_pose(pose, tool, reference)?;
        let session = self.session()?;
        let mut rpc = match approx {
            Some(approx) => {
                self.check_joints(approx)?;
                let mut rpc = session.rpc("G_IK_jnts").await?;
                rpc.send(&flange)?;
                rpc.send(approx)?;
                rpc
            }
            None => {
                let mut rpc = session.rpc("G_IK").await?;
                rpc.send(&flange)?;
                rpc
            }
        };
        rpc.send(&self.raw)?;
        let joints: Vec<f64> = rpc.reply().await?;

        if joints.is_empty() {
            return Err(Error::TargetReach("no inverse kinematics solution".into()));
        }
        Ok(joints)
    }

    /// Every inverse kinematics solution, one joint vector each.
    ///
    /// # Errors
    ///
    /// Any RPC error. No solutions is an empty list.
    pub async fn solve_ik_all(
        &self,
        pose: &Pose,
        tool: Option<&Pose>,
        reference: Option<&Pose>,
    ) -> Result<Vec<Vec<f64>>> {
        let flange = flange_pose(pose, tool, reference)?;
        let session = self.session()?;
        let mut rpc = session.rpc("G_IK_cmpl").await?;
        rpc.send(&flange)?;
        rpc.send(&self.raw)?;
        let solutions: Mat = rpc.reply().await?;
        Ok(solutions.iter_cols().collect())
    }

    /// Configuration flags of a joint solution.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the host answers with fewer than three
    /// flags.
    pub async fn joints_config(&self, joints: &[f64]) -> Result<JointsConfig> {
        self.check_joints(joints)?;
        let session = self.session()?;
        let mut rpc = session.rpc("G_Thetas_Config").await?;
        rpc.send(joints)?;
        rpc.send(&self.raw)?;
        let flags: Vec<f64> = rpc.reply().await?;
        match flags.as_slice() {
            [rear, lower, flip, ..] => Ok(JointsConfig {
                rear: *rear > 0.5,
                lower_arm: *lower > 0.5,
                flip: *flip > 0.5,
            }),
            _ => Err(simhost_rpc::CodecError::Malformed(format!(
                "expected 3 configuration flags, got {}",
                flags.len()
            ))
            .into()),
        }
    }

    /// Let the host adjust a target pose to what this robot can reach,
    /// returning the filtered pose and its joints.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if `approx` has the wrong length.
    pub async fn filter_target(&self, pose: &Pose, approx: &[f64]) -> Result<(Pose, Vec<f64>)> {
        self.check_joints(approx)?;
        let session = self.session()?;
        let mut rpc = session.rpc("FilterTarget").await?;
        rpc.send(&self.raw)?;
        rpc.send(pose)?;
        rpc.send(approx)?;
        let filtered: Pose = rpc.recv().await?;
        let joints: Vec<f64> = rpc.recv().await?;
        rpc.finish().await?;
        Ok((filtered, joints))
    }

    pub(crate) fn cached_dof(&self) -> Result<Option<usize>> {
        let link = self.link()?;
        let cache = link.motion();
        Ok(cache.get(&self.raw.handle).and_then(|state| state.dof))
    }

    fn remember_dof(&self, dof: usize) -> Result<()> {
        if !self.item_type().is_mechanism() || dof == 0 {
            return Ok(());
        }
        self.update_motion(|state| state.dof = Some(dof))
    }

    /// Rejects joint vectors that cannot be right before they reach the wire.
    pub(crate) fn check_joints(&self, joints: &[f64]) -> Result<()> {
        self.ensure_valid()?;
        check_finite("joint vector", joints)?;
        match self.cached_dof()? {
            Some(dof) if dof != joints.len() => Err(Error::input(format!(
                "expected {dof} joint values, got {}",
                joints.len()
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn update_motion(
        &self,
        update: impl FnOnce(&mut crate::client::MotionState),
    ) -> Result<()> {
        let link = self.link()?;
        let mut cache = link.motion();
        update(cache.entry(self.raw.handle).or_default());
        Ok(())
    }
}

/// Flange pose in the robot base frame for a tool pose seen from
/// `reference`.
fn flange_pose(pose: &Pose, tool: Option<&Pose>, reference: Option<&Pose>) -> Result<Pose> {
    check_finite("pose", &pose.to_col_major())?;
    let mut flange = *pose;
    if let Some(reference) = reference {
        flange = *reference * flange;
    }
    if let Some(tool) = tool {
        flange = flange * tool.inv()?;
    }
    Ok(flange)
}
