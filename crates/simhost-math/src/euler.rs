//! Euler angle conventions (radians).
//!
//! | Convention | Rotation | Angles `[a, b, c]` |
//! |------------|----------|--------------------|
//! | [`EulerOrder::XyzFixed`] | `Rz(c) * Ry(b) * Rx(a)` | roll about X, pitch about Y, yaw about Z |
//! | [`EulerOrder::ZyxFixed`] | `Rx(c) * Ry(b) * Rz(a)` | about Z, then fixed Y, then fixed X |
//! | [`EulerOrder::Zyz`] | `Rz(a) * Ry(b) * Rz(c)` | classic Z-Y-Z |
//!
//! Extraction handles the gimbal configurations explicitly: when the middle
//! angle locks two axes together the last angle is reported as zero and the
//! full rotation is carried by the first.

use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// `cos(b)` magnitude below which extraction takes the gimbal branch.
const GIMBAL_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EulerOrder {
    XyzFixed,
    ZyxFixed,
    Zyz,
}

/// Rotation-only pose for the given angles.
#[must_use]
pub fn euler_2_pose(order: EulerOrder, [a, b, c]: [f64; 3]) -> Pose {
    match order {
        EulerOrder::XyzFixed => Pose::rotz(c) * Pose::roty(b) * Pose::rotx(a),
        EulerOrder::ZyxFixed => Pose::rotx(c) * Pose::roty(b) * Pose::rotz(a),
        EulerOrder::Zyz => Pose::rotz(a) * Pose::roty(b) * Pose::rotz(c),
    }
}

/// Angles of the rotation part of `pose`. Translation is ignored.
#[must_use]
pub fn pose_2_euler(order: EulerOrder, pose: &Pose) -> [f64; 3] {
    let r = pose.rotation();
    match order {
        EulerOrder::XyzFixed => {
            let cb = r[0][0].hypot(r[1][0]);
            if cb > GIMBAL_EPS {
                [
                    r[2][1].atan2(r[2][2]),
                    (-r[2][0]).atan2(cb),
                    r[1][0].atan2(r[0][0]),
                ]
            } else if r[2][0] < 0.0 {
                [r[0][1].atan2(r[1][1]), std::f64::consts::FRAC_PI_2, 0.0]
            } else {
                [(-r[0][1]).atan2(r[1][1]), -std::f64::consts::FRAC_PI_2, 0.0]
            }
        }
        EulerOrder::ZyxFixed => {
            let cb = r[0][0].hypot(r[0][1]);
            if cb > GIMBAL_EPS {
                [
                    (-r[0][1]).atan2(r[0][0]),
                    r[0][2].atan2(cb),
                    (-r[1][2]).atan2(r[2][2]),
                ]
            } else if r[0][2] > 0.0 {
                [0.0, std::f64::consts::FRAC_PI_2, r[1][0].atan2(r[1][1])]
            } else {
                [0.0, -std::f64::consts::FRAC_PI_2, (-r[1][0]).atan2(r[1][1])]
            }
        }
        EulerOrder::Zyz => {
            let sb = r[0][2].hypot(r[1][2]);
            if sb > GIMBAL_EPS {
                [
                    r[1][2].atan2(r[0][2]),
                    sb.atan2(r[2][2]),
                    r[2][1].atan2(-r[2][0]),
                ]
            } else if r[2][2] > 0.0 {
                [r[1][0].atan2(r[0][0]), 0.0, 0.0]
            } else {
                [(-r[1][0]).atan2(-r[0][0]), std::f64::consts::PI, 0.0]
            }
        }
    }
}

/// `[x, y, z, r, p, w]` (mm, radians) to pose, rotation `Rz(w) Ry(p) Rx(r)`.
#[must_use]
pub fn xyzrpw_2_pose(v: &[f64; 6]) -> Pose {
    Pose::transl(v[0], v[1], v[2]) * euler_2_pose(EulerOrder::XyzFixed, [v[3], v[4], v[5]])
}

/// Inverse of [`xyzrpw_2_pose`].
#[must_use]
pub fn pose_2_xyzrpw(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let [r, pitch, w] = pose_2_euler(EulerOrder::XyzFixed, pose);
    [p[0], p[1], p[2], r, pitch, w]
}

/// `[x, y, z, rx, ry, rz]` (mm, radians) to pose, rotation `Rx Ry Rz`.
#[must_use]
pub fn txyz_rxyz_2_pose(v: &[f64; 6]) -> Pose {
    Pose::transl(v[0], v[1], v[2]) * Pose::rotx(v[3]) * Pose::roty(v[4]) * Pose::rotz(v[5])
}

/// Inverse of [`txyz_rxyz_2_pose`].
#[must_use]
pub fn pose_2_txyz_rxyz(pose: &Pose) -> [f64; 6] {
    let p = pose.pos();
    let [rz, ry, rx] = pose_2_euler(EulerOrder::ZyxFixed, pose);
    [p[0], p[1], p[2], rx, ry, rz]
}
