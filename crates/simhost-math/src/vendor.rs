//! Controller-specific pose representations.
//!
//! All helpers take millimetres and **degrees**, except UR which uses
//! millimetres and a rotation vector in radians (that is what UR controllers
//! display and accept).

use crate::error::Result;
use crate::euler::{EulerOrder, euler_2_pose, pose_2_euler};
use crate::pose::Pose;
use crate::quaternion::{pose_2_quaternion, pose_2_rotvec, quaternion_2_pose, rotvec_2_pose};

fn deg3(v: [f64; 3]) -> [f64; 3] {
    v.map(f64::to_degrees)
}

fn with_xyz(v: &[f64; 6], rot: Pose) -> Pose {
    rot.with_pos([v[0], v[1], v[2]])
}

/// KUKA `[x, y, z, A, B, C]`: `transl * Rz(A) * Ry(B) * Rx(C)`.
#[must_use]
pub fn kuka_2_pose(v: &[f64; 6]) -> Pose {
    let rot = euler_2_pose(
        EulerOrder::XyzFixed,
        [v[5].to_radians(), v[4].to_radians(), v[3].to_radians()],
    );
    with_xyz(v, rot)
}

#[must_use]
pub fn pose_2_kuka(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let [c, b, a] = deg3(pose_2_euler(EulerOrder::XyzFixed, pose));
    [p[0], p[1], p[2], a, b, c]
}

/// FANUC `[x, y, z, W, P, R]`: `transl * Rz(R) * Ry(P) * Rx(W)`.
#[must_use]
pub fn fanuc_2_pose(v: &[f64; 6]) -> Pose {
    let rot = euler_2_pose(
        EulerOrder::XyzFixed,
        [v[3].to_radians(), v[4].to_radians(), v[5].to_radians()],
    );
    with_xyz(v, rot)
}

#[must_use]
pub fn pose_2_fanuc(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let [w, pitch, r] = deg3(pose_2_euler(EulerOrder::XyzFixed, pose));
    [p[0], p[1], p[2], w, pitch, r]
}

/// Motoman `[x, y, z, Rx, Ry, Rz]` shares the FANUC rotation order.
#[must_use]
pub fn motoman_2_pose(v: &[f64; 6]) -> Pose {
    fanuc_2_pose(v)
}

#[must_use]
pub fn pose_2_motoman(pose: &Pose) -> [f64; 6] {
    pose_2_fanuc(pose)
}

/// Nachi `[x, y, z, R, P, W]`: the FANUC rotation with the angle triple
/// listed Z first.
#[must_use]
pub fn nachi_2_pose(v: &[f64; 6]) -> Pose {
    fanuc_2_pose(&[v[0], v[1], v[2], v[5], v[4], v[3]])
}

#[must_use]
pub fn pose_2_nachi(pose: &Pose) -> [f64; 6] {
    let [x, y, z, w, p, r] = pose_2_fanuc(pose);
    [x, y, z, r, p, w]
}

/// Staubli `[x, y, z, rx, ry, rz]`: `transl * Rx * Ry * Rz`.
#[must_use]
pub fn staubli_2_pose(v: &[f64; 6]) -> Pose {
    let rot = euler_2_pose(
        EulerOrder::ZyxFixed,
        [v[5].to_radians(), v[4].to_radians(), v[3].to_radians()],
    );
    with_xyz(v, rot)
}

#[must_use]
pub fn pose_2_staubli(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let [rz, ry, rx] = deg3(pose_2_euler(EulerOrder::ZyxFixed, pose));
    [p[0], p[1], p[2], rx, ry, rz]
}

/// ABB `[x, y, z, q1, q2, q3, q4]` with the quaternion scalar first.
///
/// # Errors
///
/// Returns `MathError::Shape` for a zero quaternion.
pub fn abb_2_pose(v: &[f64; 7]) -> Result<Pose> {
    let rot = quaternion_2_pose(&[v[3], v[4], v[5], v[6]])?;
    Ok(rot.with_pos([v[0], v[1], v[2]]))
}

#[must_use]
pub fn pose_2_abb(pose: &Pose) -> [f64; 7] {
    let p = pose.pos();
    let [w, x, y, z] = pose_2_quaternion(pose);
    [p[0], p[1], p[2], w, x, y, z]
}

/// UR `[x, y, z, rx, ry, rz]`: millimetres and a rotation vector in radians.
#[must_use]
pub fn ur_2_pose(v: &[f64; 6]) -> Pose {
    with_xyz(v, rotvec_2_pose(&[v[3], v[4], v[5]]))
}

#[must_use]
pub fn pose_2_ur(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let r = pose_2_rotvec(pose);
    [p[0], p[1], p[2], r[0], r[1], r[2]]
}
