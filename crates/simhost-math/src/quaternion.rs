//! Unit quaternion `[w, x, y, z]`, axis-angle and rotation vector conversions.

use crate::error::{MathError, Result};
use crate::pose::Pose;
use crate::vector::{self, Vec3};

pub type Quaternion = [f64; 4];

/// Rotation part of `pose` as a unit quaternion with `w >= 0`.
///
/// Uses Shepperd's method: the largest of the four diagonal combinations is
/// used as the divisor so no branch divides by a small number.
#[must_use]
pub fn pose_2_quaternion(pose: &Pose) -> Quaternion {
    let r = pose.rotation();
    let trace = r[0][0] + r[1][1] + r[2][2];

    let candidates = [trace, r[0][0], r[1][1], r[2][2]];
    let best = candidates
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > candidates[best] { i } else { best });

    let q = match best {
        0 => {
            let s = 2.0 * (1.0 + trace).sqrt();
            [
                0.25 * s,
                (r[2][1] - r[1][2]) / s,
                (r[0][2] - r[2][0]) / s,
                (r[1][0] - r[0][1]) / s,
            ]
        }
        1 => {
            let s = 2.0 * (1.0 + r[0][0] - r[1][1] - r[2][2]).sqrt();
            [
                (r[2][1] - r[1][2]) / s,
                0.25 * s,
                (r[0][1] + r[1][0]) / s,
                (r[0][2] + r[2][0]) / s,
            ]
        }
        2 => {
            let s = 2.0 * (1.0 + r[1][1] - r[0][0] - r[2][2]).sqrt();
            [
                (r[0][2] - r[2][0]) / s,
                (r[0][1] + r[1][0]) / s,
                0.25 * s,
                (r[1][2] + r[2][1]) / s,
            ]
        }
        _ => {
            let s = 2.0 * (1.0 + r[2][2] - r[0][0] - r[1][1]).sqrt();
            [
                (r[1][0] - r[0][1]) / s,
                (r[0][2] + r[2][0]) / s,
                (r[1][2] + r[2][1]) / s,
                0.25 * s,
            ]
        }
    };

    let q = normalize_unchecked(q);
    if q[0] < 0.0 { q.map(|v| -v) } else { q }
}

/// Rotation-only pose from a quaternion. The input is normalized first.
///
/// # Errors
///
/// Returns `MathError::Shape` for a zero quaternion.
pub fn quaternion_2_pose(q: &Quaternion) -> Result<Pose> {
    let n = quaternion_norm(q);
    if n < f64::EPSILON {
        return Err(MathError::shape("zero quaternion"));
    }
    let [w, x, y, z] = q.map(|v| v / n);

    Ok(Pose::from_rotation([
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
        ],
        [
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
        ],
        [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]))
}

#[must_use]
pub fn quaternion_norm(q: &Quaternion) -> f64 {
    q.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn normalize_unchecked(q: Quaternion) -> Quaternion {
    let n = quaternion_norm(&q);
    q.map(|v| v / n)
}

/// Rotation of `angle` radians about `axis`.
///
/// # Errors
///
/// Returns `MathError::Shape` for a zero axis.
pub fn axis_angle_2_pose(axis: &Vec3, angle: f64) -> Result<Pose> {
    let k = vector::normalize(axis)?;
    let (s, c) = angle.sin_cos();
    let v = 1.0 - c;

    Ok(Pose::from_rotation([
        [
            k[0] * k[0] * v + c,
            k[0] * k[1] * v - k[2] * s,
            k[0] * k[2] * v + k[1] * s,
        ],
        [
            k[0] * k[1] * v + k[2] * s,
            k[1] * k[1] * v + c,
            k[1] * k[2] * v - k[0] * s,
        ],
        [
            k[0] * k[2] * v - k[1] * s,
            k[1] * k[2] * v + k[0] * s,
            k[2] * k[2] * v + c,
        ],
    ]))
}

/// Unit axis and angle (radians, `[0, pi]`) of the rotation part of `pose`.
/// The identity yields axis `[0, 0, 1]` and angle `0`.
#[must_use]
pub fn pose_2_axis_angle(pose: &Pose) -> (Vec3, f64) {
    let [w, x, y, z] = pose_2_quaternion(pose);
    let s = (x * x + y * y + z * z).sqrt();
    if s < 1e-15 {
        return ([0.0, 0.0, 1.0], 0.0);
    }
    ([x / s, y / s, z / s], 2.0 * s.atan2(w))
}

/// Rotation vector (axis scaled by angle, radians) to pose.
#[must_use]
pub fn rotvec_2_pose(v: &Vec3) -> Pose {
    let angle = vector::norm(v);
    if angle < 1e-15 {
        return Pose::eye();
    }
    let k = vector::scale(v, 1.0 / angle);
    axis_angle_2_pose(&k, angle).unwrap_or_else(|_| Pose::eye())
}

#[must_use]
pub fn pose_2_rotvec(pose: &Pose) -> Vec3 {
    let (axis, angle) = pose_2_axis_angle(pose);
    vector::scale(&axis, angle)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::euler::{EulerOrder, euler_2_pose};

    #[test]
    fn test_identity_quaternion() {
        assert_eq!(pose_2_quaternion(&Pose::eye()), [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_half_turn_uses_stable_branch() {
        // Trace is -1 here so the w-branch would divide by zero.
        let p = Pose::rotx(std::f64::consts::PI);
        let q = pose_2_quaternion(&p);
        assert!((quaternion_norm(&q) - 1.0).abs() < 1e-12);
        assert!((q[1].abs() - 1.0).abs() < 1e-12);
        let back = quaternion_2_pose(&q).unwrap();
        assert!(p.angle_between(&back) < 1e-6);
    }

    #[test]
    fn test_zero_quaternion_rejected() {
        assert!(quaternion_2_pose(&[0.0; 4]).is_err());
    }

    #[test]
    fn test_axis_angle_roundtrip() {
        let p = axis_angle_2_pose(&[1.0, 1.0, 0.0], 0.8).unwrap();
        let (axis, angle) = pose_2_axis_angle(&p);
        assert!((angle - 0.8).abs() < 1e-12);
        let expected = 1.0 / 2.0_f64.sqrt();
        assert!((axis[0] - expected).abs() < 1e-12);
        assert!((axis[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rotvec() {
        assert_eq!(rotvec_2_pose(&[0.0; 3]), Pose::eye());
        let v = [0.0, 0.0, 1.2];
        let back = pose_2_rotvec(&rotvec_2_pose(&v));
        assert!((back[2] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_perturbed_quaternion_keeps_pose() {
        let p = Pose::transl(12.0, -3.0, 8.0) * Pose::rotz(0.9) * Pose::roty(-0.3);
        let mut q = pose_2_quaternion(&p);
        for v in &mut q {
            *v += 1e-9;
        }
        let back = quaternion_2_pose(&q).unwrap().with_pos(p.pos());
        assert!((quaternion_norm(&pose_2_quaternion(&back)) - 1.0).abs() < 1e-10);
        assert!(p.angle_between(&back) < 1e-3);
        assert!(p.distance(&back) < 1e-10);
    }

    proptest! {
        #[test]
        fn prop_quaternion_roundtrip(
            a in -3.14f64..3.14,
            b in -1.57f64..1.57,
            c in -3.14f64..3.14,
            x in -2000.0f64..2000.0,
        ) {
            let p = Pose::transl(x, -x, 0.5 * x) * euler_2_pose(EulerOrder::XyzFixed, [a, b, c]);
            let q = pose_2_quaternion(&p);
            prop_assert!((quaternion_norm(&q) - 1.0).abs() < 1e-10);
            prop_assert!(q[0] >= 0.0);

            let back = quaternion_2_pose(&q).unwrap().with_pos(p.pos());
            prop_assert!(p.angle_between(&back) < 1e-5);
            prop_assert_eq!(p.pos(), back.pos());
        }
    }
}
