//! Simulated joint trajectories of a program.
//!
//! [`Item::instruction_list_joints`](crate::Item::instruction_list_joints)
//! asks the host to run a program through its path planner and sample the
//! result. The reply is a channels x samples matrix whose row layout depends
//! on the requested [`Detail`]:
//!
//! | rows | present when |
//! |------|--------------|
//! | joints (`dof`) | always |
//! | error bits, mm step, deg step, move id | always |
//! | time step, TCP x, y, z | `Detail::Timed` and above |
//! | joint speeds (`dof`) | `Detail::Speeds` and above |
//! | joint accelerations (`dof`) | `Detail::Accelerations` |
//!
//! [`JointList::check`] verifies the guarantees the planner makes about its
//! samples.

use std::fmt;
use std::io::Write;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use simhost_math::Mat;
use simhost_rpc::{CodecError, Error, Result};

/// Slack allowed when comparing step sizes against their maxima.
pub const STEP_TOLERANCE: f64 = 1e-6;

/// How much each sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Detail {
    /// Joints, error bits, steps and move id.
    #[default]
    Basic,
    /// Adds time step and TCP position.
    Timed,
    /// Adds joint speeds.
    Speeds,
    /// Adds joint accelerations.
    Accelerations,
}

impl Detail {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Basic => 0,
            Self::Timed => 1,
            Self::Speeds => 2,
            Self::Accelerations => 3,
        }
    }

    /// Rows that do not scale with the robot's DOF.
    #[must_use]
    pub fn fixed_rows(self) -> usize {
        if self >= Self::Timed { 8 } else { 4 }
    }

    /// How many DOF-sized blocks each sample has.
    #[must_use]
    pub fn joint_blocks(self) -> usize {
        match self {
            Self::Basic | Self::Timed => 1,
            Self::Speeds => 2,
            Self::Accelerations => 3,
        }
    }
}

/// Sampling request for a joint list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Discretization {
    /// Largest Cartesian step between samples, in mm.
    pub mm_step: f64,
    /// Largest joint step between samples, in degrees.
    pub deg_step: f64,
    /// Time step in seconds. Sampling is time-based when this is positive
    /// and `detail` is at least [`Detail::Timed`].
    pub time_step: f64,
    pub detail: Detail,
    pub check_collisions: bool,
}

impl Default for Discretization {
    fn default() -> Self {
        Self {
            mm_step: 1.0,
            deg_step: 1.0,
            time_step: 0.0,
            detail: Detail::Basic,
            check_collisions: false,
        }
    }
}

impl Discretization {
    /// Time-based sampling at `time_step` seconds with the given detail.
    #[must_use]
    pub fn timed(time_step: f64, detail: Detail) -> Self {
        Self {
            time_step,
            detail: detail.max(Detail::Timed),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_time_based(&self) -> bool {
        self.time_step > 0.0 && self.detail >= Detail::Timed
    }

    /// # Errors
    ///
    /// Returns `Error::Input` for non-positive or non-finite steps.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("mm_step", self.mm_step), ("deg_step", self.deg_step)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::input(format!("{name} must be positive, got {value}")));
            }
        }
        if !self.time_step.is_finite() || self.time_step < 0.0 {
            return Err(Error::input(format!(
                "time_step must be >= 0, got {}",
                self.time_step
            )));
        }
        Ok(())
    }

    /// `[mm_step, deg_step, collisions, detail, time_step]`.
    pub(crate) fn to_wire(self) -> [f64; 5] {
        [
            self.mm_step,
            self.deg_step,
            f64::from(u8::from(self.check_collisions)),
            f64::from(self.detail.code()),
            self.time_step,
        ]
    }
}

/// Path planner error bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathErrorFlags(u32);

impl PathErrorFlags {
    pub const NONE: Self = Self(0);
    /// Target unreachable.
    pub const KINEMATIC: Self = Self(1);
    pub const PATH_LIMIT: Self = Self(2);
    pub const PATH_SINGULARITY: Self = Self(4);
    pub const PATH_NEAR_SINGULARITY: Self = Self(8);
    pub const PATH_FLIP_AXIS: Self = Self(16);
    pub const COLLISION_OR_WORKSPACE: Self = Self(32);
    pub const WRIST_SINGULARITY: Self = Self(64);
    pub const ELBOW_SINGULARITY: Self = Self(128);
    pub const BACK_FRONT_SINGULARITY: Self = Self(256);
    pub const SMOOTH_KINEMATIC_EXCEEDED: Self = Self(2048);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::KINEMATIC, "kinematic"),
        (Self::PATH_LIMIT, "path limit"),
        (Self::PATH_SINGULARITY, "path singularity"),
        (Self::PATH_NEAR_SINGULARITY, "near singularity"),
        (Self::PATH_FLIP_AXIS, "flip axis"),
        (Self::COLLISION_OR_WORKSPACE, "collision or workspace"),
        (Self::WRIST_SINGULARITY, "wrist singularity"),
        (Self::ELBOW_SINGULARITY, "elbow singularity"),
        (Self::BACK_FRONT_SINGULARITY, "back/front singularity"),
        (Self::SMOOTH_KINEMATIC_EXCEEDED, "smooth kinematic exceeded"),
    ];

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Flags from the host's error code. Negative codes mean the target is
    /// unreachable.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        u32::try_from(code).map_or(Self::KINEMATIC, Self)
    }

    /// Flags stored in a sample's error row.
    #[must_use]
    pub fn from_sample(value: f64) -> Self {
        if value.is_nan() || value < 0.0 {
            return Self::KINEMATIC;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(value.round().min(f64::from(u32::MAX)) as u32)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Most severe problem the flags describe.
    #[must_use]
    pub fn classify(self) -> PathError {
        if self.is_empty() {
            PathError::None
        } else if self.intersects(Self::KINEMATIC | Self::COLLISION_OR_WORKSPACE) {
            PathError::Unreachable
        } else if self.contains(Self::PATH_LIMIT) {
            PathError::JointLimit
        } else if self.contains(Self::WRIST_SINGULARITY) {
            PathError::WristSingularity
        } else if self.contains(Self::ELBOW_SINGULARITY) {
            PathError::ElbowSingularity
        } else if self.contains(Self::BACK_FRONT_SINGULARITY) {
            PathError::BackFrontSingularity
        } else if self.intersects(Self::PATH_SINGULARITY | Self::PATH_NEAR_SINGULARITY) {
            PathError::Singularity
        } else if self.contains(Self::SMOOTH_KINEMATIC_EXCEEDED) {
            PathError::SmoothKinematicExceeded
        } else if self.contains(Self::PATH_FLIP_AXIS) {
            PathError::PathFlip
        } else {
            PathError::Other(self.0)
        }
    }
}

impl BitOr for PathErrorFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PathErrorFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PathErrorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut rest = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
                rest &= !flag.0;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

/// Classification of a failed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathError {
    None,
    Unreachable,
    JointLimit,
    WristSingularity,
    ElbowSingularity,
    BackFrontSingularity,
    /// Singularity the planner did not attribute to an axis group.
    Singularity,
    SmoothKinematicExceeded,
    PathFlip,
    /// Only reserved bits are set.
    Other(u32),
}

/// One sample of a simulated program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointSample {
    pub joints: Vec<f64>,
    pub error: PathErrorFlags,
    pub mm_step: f64,
    pub deg_step: f64,
    /// 1-based index of the instruction that produced this sample.
    pub move_id: usize,
    pub time_step: Option<f64>,
    pub tcp: Option<[f64; 3]>,
    pub speeds: Option<Vec<f64>>,
    pub accels: Option<Vec<f64>>,
}

/// A guarantee a sample breaks.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    MoveId { sample: usize, move_id: usize },
    MmStep { sample: usize, step: f64 },
    DegStep { sample: usize, step: f64 },
    TimeStep { sample: usize, step: f64 },
    /// Zero time step anywhere but the end of an exact stop.
    ZeroTimeStep { sample: usize },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveId { sample, move_id } => {
                write!(f, "sample {sample}: move id {move_id} out of range")
            }
            Self::MmStep { sample, step } => write!(f, "sample {sample}: mm step {step} too large"),
            Self::DegStep { sample, step } => {
                write!(f, "sample {sample}: deg step {step} too large")
            }
            Self::TimeStep { sample, step } => {
                write!(f, "sample {sample}: time step {step} too large")
            }
            Self::ZeroTimeStep { sample } => {
                write!(f, "sample {sample}: zero time step outside a stop point")
            }
        }
    }
}

/// Sampled trajectory plus the planner's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointList {
    pub samples: Vec<JointSample>,
    pub error: PathErrorFlags,
    pub message: String,
    pub detail: Detail,
}

impl JointList {
    /// Decode the host's sample matrix.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` when the row count does not fit `detail`.
    pub fn from_wire(matrix: &Mat, detail: Detail, error_code: i32, message: String) -> Result<Self> {
        let error = PathErrorFlags::from_code(error_code);
        if matrix.cols() == 0 {
            return Ok(Self {
                samples: Vec::new(),
                error,
                message,
                detail,
            });
        }

        let rows = matrix.rows();
        let fixed = detail.fixed_rows();
        let blocks = detail.joint_blocks();
        if rows <= fixed || (rows - fixed) % blocks != 0 {
            return Err(CodecError::Malformed(format!(
                "joint list with {rows} rows does not match {detail:?} layout"
            ))
            .into());
        }
        let dof = (rows - fixed) / blocks;

        let samples = matrix
            .iter_cols()
            .map(|col| decode_sample(&col, dof, detail))
            .collect();
        Ok(Self {
            samples,
            error,
            message,
            detail,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    #[must_use]
    pub fn dof(&self) -> Option<usize> {
        self.samples.first().map(|s| s.joints.len())
    }

    /// Last sample produced by instruction `move_id`.
    #[must_use]
    pub fn last_of_move(&self, move_id: usize) -> Option<&JointSample> {
        self.samples.iter().rev().find(|s| s.move_id == move_id)
    }

    /// Every sample of instruction `move_id`, in order.
    pub fn samples_of_move(&self, move_id: usize) -> impl Iterator<Item = &JointSample> {
        self.samples.iter().filter(move |s| s.move_id == move_id)
    }

    /// Samples that break the planner's guarantees for `disc`, for a program
    /// of `instructions` instructions. Empty when the list is consistent.
    ///
    /// `stop_points` lists the move ids that end with zero blending. In time
    /// mode only the last sample of one of those moves, or the last sample of
    /// the whole list, may have a zero time step.
    #[must_use]
    pub fn check(
        &self,
        disc: &Discretization,
        instructions: usize,
        stop_points: &[usize],
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let time_based = disc.is_time_based();

        for (i, sample) in self.samples.iter().enumerate() {
            if sample.move_id == 0 || sample.move_id > instructions {
                violations.push(Violation::MoveId {
                    sample: i,
                    move_id: sample.move_id,
                });
            }
            if sample.mm_step > disc.mm_step + STEP_TOLERANCE {
                violations.push(Violation::MmStep {
                    sample: i,
                    step: sample.mm_step,
                });
            }
            if sample.deg_step > disc.deg_step + STEP_TOLERANCE {
                violations.push(Violation::DegStep {
                    sample: i,
                    step: sample.deg_step,
                });
            }
            if !time_based {
                continue;
            }
            let Some(step) = sample.time_step else {
                continue;
            };
            if step > disc.time_step + STEP_TOLERANCE {
                violations.push(Violation::TimeStep { sample: i, step });
            }
            let stops_here = match self.samples.get(i + 1) {
                None => true,
                Some(next) => {
                    next.move_id != sample.move_id && stop_points.contains(&sample.move_id)
                }
            };
            if step == 0.0 && !stops_here {
                violations.push(Violation::ZeroTimeStep { sample: i });
            }
        }
        violations
    }

    /// Write the samples as CSV, one row per sample.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if writing fails.
    pub fn write_csv(&self, mut out: impl Write) -> Result<()> {
        let dof = self.dof().unwrap_or(0);
        let mut header: Vec<String> = (1..=dof).map(|j| format!("j{j}")).collect();
        header.extend(["error", "mm_step", "deg_step", "move_id"].map(String::from));
        if self.detail >= Detail::Timed {
            header.extend(["time_step", "x", "y", "z"].map(String::from));
        }
        if self.detail >= Detail::Speeds {
            header.extend((1..=dof).map(|j| format!("v{j}")));
        }
        if self.detail >= Detail::Accelerations {
            header.extend((1..=dof).map(|j| format!("a{j}")));
        }
        writeln!(out, "{}", header.join(","))?;

        for sample in &self.samples {
            let mut fields: Vec<String> = sample.joints.iter().map(f64::to_string).collect();
            fields.push(sample.error.bits().to_string());
            fields.push(sample.mm_step.to_string());
            fields.push(sample.deg_step.to_string());
            fields.push(sample.move_id.to_string());
            if let (Some(t), Some(tcp)) = (sample.time_step, sample.tcp) {
                fields.push(t.to_string());
                fields.extend(tcp.iter().map(f64::to_string));
            }
            for extra in [&sample.speeds, &sample.accels].into_iter().flatten() {
                fields.extend(extra.iter().map(f64::to_string));
            }
            writeln!(out, "{}", fields.join(","))?;
        }
        Ok(())
    }
}

fn decode_sample(col: &[f64], dof: usize, detail: Detail) -> JointSample {
    let joints = col[..dof].to_vec();
    let fixed = &col[dof..];
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let move_id = if fixed[3].is_finite() && fixed[3] > 0.0 {
        fixed[3].round() as usize
    } else {
        0
    };

    let mut sample = JointSample {
        joints,
        error: PathErrorFlags::from_sample(fixed[0]),
        mm_step: fixed[1],
        deg_step: fixed[2],
        move_id,
        time_step: None,
        tcp: None,
        speeds: None,
        accels: None,
    };

    let mut at = dof + 4;
    if detail >= Detail::Timed {
        sample.time_step = Some(col[at]);
        sample.tcp = Some([col[at + 1], col[at + 2], col[at + 3]]);
        at += 4;
    }
    if detail >= Detail::Speeds {
        sample.speeds = Some(col[at..at + dof].to_vec());
        at += dof;
    }
    if detail >= Detail::Accelerations {
        sample.accels = Some(col[at..at + dof].to_vec());
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(joints: &[f64], fixed: [f64; 4], timed: Option<[f64; 4]>) -> Vec<f64> {
        let mut col = joints.to_vec();
        col.extend(fixed);
        if let Some(t) = timed {
            col.extend(t);
        }
        col
    }

    fn matrix(cols: &[Vec<f64>]) -> Mat {
        let rows = cols[0].len();
        let data: Vec<f64> = cols.iter().flatten().copied().collect();
        Mat::from_col_major(rows, cols.len(), &data).unwrap()
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(Detail::Basic.fixed_rows(), 4);
        assert_eq!(Detail::Timed.fixed_rows(), 8);
        assert_eq!(Detail::Speeds.joint_blocks(), 2);
        assert_eq!(Detail::Accelerations.joint_blocks(), 3);
    }

    #[test]
    fn test_decodes_timed_samples() {
        let m = matrix(&[
            column(&[0.0; 6], [0.0, 0.5, 0.1, 1.0], Some([0.01, 1.0, 2.0, 3.0])),
            column(&[1.0; 6], [64.0, 0.5, 0.1, 2.0], Some([0.0, 4.0, 5.0, 6.0])),
        ]);
        let list = JointList::from_wire(&m, Detail::Timed, 0, "success".into()).unwrap();
        assert_eq!(list.dof(), Some(6));
        assert_eq!(list.samples.len(), 2);
        let last = &list.samples[1];
        assert_eq!(last.move_id, 2);
        assert!(last.error.contains(PathErrorFlags::WRIST_SINGULARITY));
        assert_eq!(last.tcp, Some([4.0, 5.0, 6.0]));
        assert_eq!(last.time_step, Some(0.0));
        assert!(last.speeds.is_none());
    }

    #[test]
    fn test_decodes_speeds_and_accels() {
        let mut col = column(&[0.1, 0.2], [0.0, 1.0, 1.0, 1.0], Some([0.1, 0.0, 0.0, 0.0]));
        col.extend([10.0, 20.0, 100.0, 200.0]);
        let list = JointList::from_wire(&matrix(&[col]), Detail::Accelerations, 0, String::new())
            .unwrap();
        let sample = &list.samples[0];
        assert_eq!(sample.joints, vec![0.1, 0.2]);
        assert_eq!(sample.speeds.as_deref(), Some(&[10.0, 20.0][..]));
        assert_eq!(sample.accels.as_deref(), Some(&[100.0, 200.0][..]));
    }

    #[test]
    fn test_rejects_mismatched_layout() {
        let m = Mat::zeros(4, 3);
        let err = JointList::from_wire(&m, Detail::Timed, 0, String::new()).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let m = Mat::zeros(8 + 2 * 3 + 1, 1);
        assert!(JointList::from_wire(&m, Detail::Speeds, 0, String::new()).is_err());
    }

    #[test]
    fn test_empty_matrix_keeps_error() {
        let list = JointList::from_wire(&Mat::zeros(0, 0), Detail::Basic, -1, "unreachable".into())
            .unwrap();
        assert!(list.samples.is_empty());
        assert!(!list.is_success());
        assert_eq!(list.error.classify(), PathError::Unreachable);
    }

    #[test]
    fn test_classify_priority() {
        use PathErrorFlags as F;
        assert_eq!(F::NONE.classify(), PathError::None);
        assert_eq!(
            (F::WRIST_SINGULARITY | F::PATH_SINGULARITY).classify(),
            PathError::WristSingularity
        );
        assert_eq!(F::PATH_SINGULARITY.classify(), PathError::Singularity);
        assert_eq!(
            (F::PATH_LIMIT | F::ELBOW_SINGULARITY).classify(),
            PathError::JointLimit
        );
        assert_eq!(F::SMOOTH_KINEMATIC_EXCEEDED.classify(), PathError::SmoothKinematicExceeded);
        assert_eq!(F::from_bits(512).classify(), PathError::Other(512));
        assert_eq!(F::from_code(-3), F::KINEMATIC);
    }

    #[test]
    fn test_flags_display() {
        let flags = PathErrorFlags::WRIST_SINGULARITY | PathErrorFlags::from_bits(1024);
        assert_eq!(flags.to_string(), "wrist singularity | 0x400");
        assert_eq!(PathErrorFlags::NONE.to_string(), "none");
    }

    #[test]
    fn test_check_flags_violations() {
        let disc = Discretization {
            mm_step: 1.0,
            deg_step: 1.0,
            time_step: 0.01,
            detail: Detail::Timed,
            check_collisions: false,
        };
        let m = matrix(&[
            column(&[0.0], [0.0, 1.0, 0.5, 1.0], Some([0.01, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 1.5, 0.5, 2.0], Some([0.0, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 2.0], Some([0.02, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 3.0], Some([0.0, 0.0, 0.0, 0.0])),
        ]);
        let list = JointList::from_wire(&m, Detail::Timed, 0, String::new()).unwrap();
        let violations = list.check(&disc, 2, &[]);
        assert_eq!(
            violations,
            vec![
                Violation::MmStep { sample: 1, step: 1.5 },
                Violation::ZeroTimeStep { sample: 1 },
                Violation::TimeStep { sample: 2, step: 0.02 },
                Violation::MoveId { sample: 3, move_id: 3 },
            ]
        );
    }

    #[test]
    fn test_zero_time_step_only_at_stop_points() {
        let disc = Discretization::timed(0.01, Detail::Timed);
        let m = matrix(&[
            column(&[0.0], [0.0, 0.5, 0.5, 1.0], Some([0.01, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 1.0], Some([0.0, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 2.0], Some([0.01, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 2.0], Some([0.0, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 0.5, 0.5, 3.0], Some([0.01, 0.0, 0.0, 0.0])),
        ]);
        let list = JointList::from_wire(&m, Detail::Timed, 0, String::new()).unwrap();

        // Move 1 is blended into move 2, so it must not come to rest.
        assert_eq!(
            list.check(&disc, 3, &[2]),
            vec![Violation::ZeroTimeStep { sample: 1 }]
        );
        assert!(list.check(&disc, 3, &[1, 2]).is_empty());
    }

    #[test]
    fn test_zero_time_step_allowed_outside_time_mode() {
        let m = matrix(&[
            column(&[0.0], [0.0, 1.0, 0.5, 1.0], Some([0.0, 0.0, 0.0, 0.0])),
            column(&[0.0], [0.0, 1.0, 0.5, 1.0], Some([0.0, 0.0, 0.0, 0.0])),
        ]);
        let list = JointList::from_wire(&m, Detail::Timed, 0, String::new()).unwrap();
        assert!(list.check(&Discretization::default(), 1, &[]).is_empty());
    }

    #[test]
    fn test_discretization_validation() {
        assert!(Discretization::default().validate().is_ok());
        let bad = Discretization {
            mm_step: 0.0,
            ..Discretization::default()
        };
        assert!(matches!(bad.validate(), Err(Error::Input(_))));
        let bad = Discretization {
            time_step: f64::NAN,
            ..Discretization::default()
        };
        assert!(bad.validate().is_err());
        assert!(Discretization::timed(0.01, Detail::Basic).is_time_based());
    }

    #[test]
    fn test_csv_header_and_rows() {
        let m = matrix(&[column(&[1.0, 2.0], [0.0, 0.5, 0.25, 1.0], None)]);
        let list = JointList::from_wire(&m, Detail::Basic, 0, String::new()).unwrap();
        let mut out = Vec::new();
        list.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "j1,j2,error,mm_step,deg_step,move_id");
        assert_eq!(lines[1], "1,2,0,0.5,0.25,1");
    }

    proptest::proptest! {
        #[test]
        fn prop_classify_only_none_when_empty(bits in proptest::prelude::any::<u32>()) {
            let flags = PathErrorFlags::from_bits(bits);
            proptest::prop_assert_eq!(flags.classify() == PathError::None, flags.is_empty());
        }

        #[test]
        fn prop_sample_flags_round_trip(bits in 0u32..4096) {
            let flags = PathErrorFlags::from_sample(f64::from(bits));
            proptest::prop_assert_eq!(flags.bits(), bits);
        }
    }
}
