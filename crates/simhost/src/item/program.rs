//! Program instructions, execution and joint lists.

use std::path::Path;

use serde::{Deserialize, Serialize};
use simhost_math::{Mat, Pose};
use simhost_rpc::{Error, Result};
use tracing::{debug, info};

use super::Item;
use super::params::RunType;
use crate::client::LONG_TIMEOUT;
use crate::joint_list::{Discretization, JointList};

/// Interpolation of a move instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MoveKind {
    Joint,
    Linear,
    Circular,
}

impl MoveKind {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Joint => 1,
            Self::Linear => 2,
            Self::Circular => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Joint),
            2 => Some(Self::Linear),
            3 => Some(Self::Circular),
            _ => None,
        }
    }
}

/// Non-motion instruction appended to a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Instruction {
    /// Pause for `ms` milliseconds; `None` waits for the operator.
    Pause { ms: Option<f64> },
    ShowMessage { text: String },
    /// Call another program by name.
    Call { program: String },
    /// Raw controller code, emitted verbatim.
    Code { code: String },
    StartThread { program: String },
    Comment { text: String },
    SetDo { io: String, value: String },
    /// Wait for a digital input; `timeout_ms` of `None` waits forever.
    WaitDi {
        io: String,
        value: String,
        timeout_ms: Option<f64>,
    },
    /// Custom instruction with a display name.
    Custom { code: String, name: String },
}

/// One program instruction as the host describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionInfo {
    pub name: String,
    /// Host instruction category code.
    pub instruction_type: i32,
    /// `None` for non-motion instructions.
    pub move_kind: Option<MoveKind>,
    pub joint_target: bool,
    pub pose: Pose,
    pub joints: Vec<f64>,
}

/// Result of re-validating a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramUpdate {
    pub valid_instructions: usize,
    /// Estimated cycle time in seconds.
    pub time: f64,
    /// Travelled distance in mm.
    pub distance: f64,
    /// 1.0 when every instruction is reachable.
    pub valid_ratio: f64,
    pub message: String,
}

impl ProgramUpdate {
    #[must_use]
    #[allow(clippy::float_cmp)] // the host reports exactly 1.0 for a clean program
    pub fn is_valid(&self) -> bool {
        self.valid_ratio == 1.0
    }
}

/// Options for [`Item::update`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOptions {
    pub check_collisions: bool,
    /// Host-side time limit in seconds.
    pub timeout_s: f64,
    pub mm_step: f64,
    pub deg_step: f64,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            check_collisions: false,
            timeout_s: 3600.0,
            mm_step: -1.0,
            deg_step: -1.0,
        }
    }
}

impl Item {
    /// Append a non-motion instruction to this program.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for negative pause or timeout values.
    pub async fn add_instruction(&self, instruction: &Instruction) -> Result<()> {
        debug!("Adding {instruction:?}");
        match instruction {
            Instruction::Pause { ms } => {
                let ms = ms.unwrap_or(-1.0);
                if ms.is_nan() || ms < -1.0 {
                    return Err(Error::input(format!("pause must be >= 0 ms, got {ms}")));
                }
                self.call_with("RunPause", &ms).await
            }
            Instruction::ShowMessage { text } => self.run_instruction(text, RunType::Message).await,
            Instruction::Call { program } => self.run_instruction(program, RunType::Call).await,
            Instruction::Code { code } => self.run_instruction(code, RunType::InsertCode).await,
            Instruction::StartThread { program } => {
                self.run_instruction(program, RunType::StartThread).await
            }
            Instruction::Comment { text } => self.run_instruction(text, RunType::Comment).await,
            Instruction::SetDo { io, value } => {
                let session = self.session()?;
                let mut rpc = session.rpc("setDO").await?;
                rpc.send(&self.raw)?;
                rpc.send(io.as_str())?;
                rpc.send(value.as_str())?;
                rpc.finish().await
            }
            Instruction::WaitDi {
                io,
                value,
                timeout_ms,
            } => {
                let timeout = timeout_ms.unwrap_or(-1.0);
                if timeout.is_nan() || timeout < -1.0 {
                    return Err(Error::input(format!("timeout must be >= 0 ms, got {timeout}")));
                }
                let session = self.session()?;
                let mut rpc = session.rpc("waitDI").await?;
                rpc.send(&self.raw)?;
                rpc.send(io.as_str())?;
                rpc.send(value.as_str())?;
                rpc.send(&timeout)?;
                rpc.finish().await
            }
            Instruction::Custom { code, name } => self.run_code_custom(code, name).await,
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn instruction_count(&self) -> Result<usize> {
        let n: i32 = self.call("Prog_Nins").await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Instruction at `index` (0-based).
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` when `index` is out of range.
    pub async fn instruction(&self, index: usize) -> Result<InstructionInfo> {
        let index = wire_index(index)?;
        let session = self.session()?;
        let mut rpc = session.rpc("Prog_GIns").await?;
        rpc.send(&self.raw)?;
        rpc.send(&index)?;
        let name: String = rpc.recv().await?;
        let instruction_type: i32 = rpc.recv().await?;
        let move_type: i32 = rpc.recv().await?;
        let joint_target: i32 = rpc.recv().await?;
        let pose: Pose = rpc.recv().await?;
        let joints: Vec<f64> = rpc.recv().await?;
        rpc.finish().await?;
        Ok(InstructionInfo {
            name,
            instruction_type,
            move_kind: MoveKind::from_code(move_type),
            joint_target: joint_target != 0,
            pose,
            joints,
        })
    }

    /// Replace the instruction at `index` (0-based).
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` when `index` is out of range.
    pub async fn set_instruction(&self, index: usize, info: &InstructionInfo) -> Result<()> {
        let index = wire_index(index)?;
        let session = self.session()?;
        let mut rpc = session.rpc("Prog_SIns").await?;
        rpc.send(&self.raw)?;
        rpc.send(&index)?;
        rpc.send(info.name.as_str())?;
        rpc.send(&info.instruction_type)?;
        rpc.send(&info.move_kind.map_or(0, MoveKind::code))?;
        rpc.send(&i32::from(info.joint_target))?;
        rpc.send(&info.pose)?;
        rpc.send(info.joints.as_slice())?;
        rpc.finish().await
    }

    /// Every instruction as a matrix, one column per instruction, plus the
    /// host's count of instructions with errors.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn instruction_list(&self) -> Result<(Mat, usize)> {
        let session = self.session()?;
        let mut rpc = session.rpc("G_ProgInsList").await?;
        rpc.send(&self.raw)?;
        let list: Mat = rpc.recv().await?;
        let errors: i32 = rpc.recv().await?;
        rpc.finish().await?;
        Ok((list, usize::try_from(errors).unwrap_or(0)))
    }

    /// Simulate this program and sample the joint trajectory.
    ///
    /// Path problems do not fail the call: they come back in
    /// [`JointList::error`] and [`JointList::message`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for invalid discretization values and
    /// `Error::Protocol` if the matrix does not match the requested layout.
    pub async fn instruction_list_joints(&self, disc: &Discretization) -> Result<JointList> {
        self.joint_list_request(disc, None).await
    }

    /// As [`Item::instruction_list_joints`], but the host writes the samples
    /// to `path` (CSV) and the returned list holds no samples.
    ///
    /// # Errors
    ///
    /// As [`Item::instruction_list_joints`].
    pub async fn instruction_list_joints_to_file(
        &self,
        disc: &Discretization,
        path: &Path,
    ) -> Result<JointList> {
        self.joint_list_request(disc, Some(path)).await
    }

    async fn joint_list_request(&self, disc: &Discretization, path: Option<&Path>) -> Result<JointList> {
        disc.validate()?;
        let save_to = path.map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();

        let session = self.session()?;
        let mut rpc = session.rpc("G_ProgJointList").await?.with_timeout(LONG_TIMEOUT);
        rpc.send(&self.raw)?;
        rpc.send(disc.to_wire().as_slice())?;
        rpc.send(save_to.as_str())?;
        let samples: Mat = rpc.recv().await?;
        let error_code: i32 = rpc.recv().await?;
        let message: String = rpc.recv().await?;
        rpc.finish().await?;

        debug!(
            "Joint list: {} samples, error code {error_code}: {message}",
            samples.cols()
        );
        JointList::from_wire(&samples, disc.detail, error_code, message)
    }

    /// Start the program. Returns immediately; poll [`Item::busy`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn run_program(&self) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("RunProg").await?;
        rpc.send(&self.raw)?;
        rpc.finish().await?;
        info!("Started program {:#x}", self.raw.handle);
        Ok(())
    }

    /// Generate the robot program into `folder`. Returns whether generation
    /// succeeded and the host's log.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn make_program(&self, folder: &Path) -> Result<(bool, String)> {
        let session = self.session()?;
        let mut rpc = session.rpc("MakeProg2").await?.with_timeout(LONG_TIMEOUT);
        rpc.send(&self.raw)?;
        rpc.send(folder.to_string_lossy().as_ref())?;
        let ok: i32 = rpc.recv().await?;
        let log: String = rpc.recv().await?;
        rpc.finish().await?;
        Ok((ok > 0, log))
    }

    /// Re-check every instruction of the program.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the host answers with fewer than four
    /// values.
    pub async fn update(&self, options: &UpdateOptions) -> Result<ProgramUpdate> {
        let request = [
            f64::from(u8::from(options.check_collisions)),
            options.timeout_s,
            options.mm_step,
            options.deg_step,
        ];
        let session = self.session()?;
        let mut rpc = session.rpc("Update2").await?.with_timeout(LONG_TIMEOUT);
        rpc.send(&self.raw)?;
        rpc.send(&request[..])?;
        let values: Vec<f64> = rpc.recv().await?;
        let message: String = rpc.recv().await?;
        rpc.finish().await?;

        let &[valid, time, distance, valid_ratio, ..] = values.as_slice() else {
            return Err(simhost_rpc::CodecError::Malformed(format!(
                "program update returned {} values",
                values.len()
            ))
            .into());
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let valid_instructions = valid.max(0.0) as usize;
        Ok(ProgramUpdate {
            valid_instructions,
            time,
            distance,
            valid_ratio,
            message,
        })
    }
}

fn wire_index(index: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| Error::input(format!("instruction index {index} too large")))
}
