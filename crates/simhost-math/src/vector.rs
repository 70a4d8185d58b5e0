//! Small 3-vector helpers.

use crate::error::{MathError, Result};
use crate::pose::Pose;

pub type Vec3 = [f64; 3];

#[must_use]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[must_use]
pub fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[must_use]
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// Unit vector in the direction of `a`.
///
/// # Errors
///
/// Returns `MathError::Shape` for a zero-length vector.
pub fn normalize(a: &Vec3) -> Result<Vec3> {
    let n = norm(a);
    if n < f64::EPSILON {
        return Err(MathError::shape("cannot normalize a zero vector"));
    }
    Ok(scale(a, 1.0 / n))
}

#[must_use]
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[must_use]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[must_use]
pub fn scale(a: &Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

#[must_use]
pub fn distance(a: &Vec3, b: &Vec3) -> f64 {
    norm(&sub(a, b))
}

/// Angle between two vectors in radians. Zero vectors give `0.0`.
#[must_use]
pub fn angle3(a: &Vec3, b: &Vec3) -> f64 {
    let denom = norm(a) * norm(b);
    if denom < f64::EPSILON {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0).acos()
}

/// Closest point to `p` on the infinite line through `origin` along `dir`.
///
/// # Errors
///
/// Returns `MathError::Shape` if `dir` is zero.
pub fn project_point_on_line(p: &Vec3, origin: &Vec3, dir: &Vec3) -> Result<Vec3> {
    let d = normalize(dir)?;
    let t = dot(&sub(p, origin), &d);
    Ok(add(origin, &scale(&d, t)))
}

/// Orthogonal projection of `p` onto the plane through `origin` with
/// normal `normal`.
///
/// # Errors
///
/// Returns `MathError::Shape` if `normal` is zero.
pub fn project_point_on_plane(p: &Vec3, origin: &Vec3, normal: &Vec3) -> Result<Vec3> {
    let n = normalize(normal)?;
    let d = dot(&sub(p, origin), &n);
    Ok(sub(p, &scale(&n, d)))
}

/// Pose at `point` whose Z axis is `zaxis`.
///
/// The X axis is derived from a reference hint: `[0, 0, 1]` unless that is
/// parallel to `zaxis`, in which case `[0, 1, 1]`.
///
/// # Errors
///
/// Returns `MathError::Shape` if `zaxis` is zero.
pub fn point_zaxis_2_pose(point: &Vec3, zaxis: &Vec3) -> Result<Pose> {
    point_zaxis_2_pose_hint(point, zaxis, &[0.0, 0.0, 1.0])
}

/// Like [`point_zaxis_2_pose`] with a caller-chosen first hint.
///
/// # Errors
///
/// Returns `MathError::Shape` if `zaxis` is zero.
pub fn point_zaxis_2_pose_hint(point: &Vec3, zaxis: &Vec3, hint: &Vec3) -> Result<Pose> {
    let z = normalize(zaxis)?;

    let mut yaxis = cross(&z, hint);
    if norm(&yaxis) < 1e-6 {
        yaxis = cross(&z, &[0.0, 1.0, 1.0]);
    }
    let y = normalize(&yaxis)?;
    let x = cross(&y, &z);

    let mut p = Pose::from_rotation([[x[0], y[0], z[0]], [x[1], y[1], z[1]], [x[2], y[2], z[2]]]);
    p.set_pos(*point);
    Ok(p)
}
