//! Homogeneous 4x4 transforms.
//!
//! A [`Pose`] is `[[R t]; [0 0 0 1]]` with `R` orthonormal. The type itself
//! does not enforce orthonormality so that arbitrary 4x4 matrices coming from
//! the host can still be carried and inspected; [`Pose::is_pose`] checks it.

use std::fmt;
use std::ops::{Index, IndexMut, Mul};

use serde::{Deserialize, Serialize};

use crate::error::{MathError, Result};
use crate::mat::Mat;
use crate::vector::{self, Vec3};

/// Orthonormality tolerance used by [`Pose::is_pose`].
pub const POSE_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    m: [[f64; 4]; 4],
}

impl Default for Pose {
    fn default() -> Self {
        Self::eye()
    }
}

impl Pose {
    #[must_use]
    pub const fn eye() -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    #[must_use]
    pub const fn from_rows(m: [[f64; 4]; 4]) -> Self {
        Self { m }
    }

    /// Pure translation.
    #[must_use]
    pub const fn transl(x: f64, y: f64, z: f64) -> Self {
        Self {
            m: [
                [1.0, 0.0, 0.0, x],
                [0.0, 1.0, 0.0, y],
                [0.0, 0.0, 1.0, z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Rotation about X by `rx` radians.
    #[must_use]
    pub fn rotx(rx: f64) -> Self {
        let (s, c) = rx.sin_cos();
        Self::from_rotation([[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]])
    }

    /// Rotation about Y by `ry` radians.
    #[must_use]
    pub fn roty(ry: f64) -> Self {
        let (s, c) = ry.sin_cos();
        Self::from_rotation([[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]])
    }

    /// Rotation about Z by `rz` radians.
    #[must_use]
    pub fn rotz(rz: f64) -> Self {
        let (s, c) = rz.sin_cos();
        Self::from_rotation([[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]])
    }

    #[must_use]
    pub fn from_rotation(r: [[f64; 3]; 3]) -> Self {
        let mut p = Self::eye();
        for (i, row) in r.iter().enumerate() {
            p.m[i][..3].copy_from_slice(row);
        }
        p
    }

    /// Build from 16 values in column-major order (wire order).
    #[must_use]
    pub fn from_col_major(values: &[f64; 16]) -> Self {
        let mut m = [[0.0; 4]; 4];
        for (c, col) in values.chunks_exact(4).enumerate() {
            for (r, v) in col.iter().enumerate() {
                m[r][c] = *v;
            }
        }
        Self { m }
    }

    #[must_use]
    pub fn to_col_major(&self) -> [f64; 16] {
        let mut out = [0.0; 16];
        for c in 0..4 {
            for r in 0..4 {
                out[c * 4 + r] = self.m[r][c];
            }
        }
        out
    }

    #[must_use]
    pub const fn rows(&self) -> &[[f64; 4]; 4] {
        &self.m
    }

    #[must_use]
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let mut r = [[0.0; 3]; 3];
        for (i, row) in r.iter_mut().enumerate() {
            row.copy_from_slice(&self.m[i][..3]);
        }
        r
    }

    #[must_use]
    pub const fn pos(&self) -> Vec3 {
        [self.m[0][3], self.m[1][3], self.m[2][3]]
    }

    pub fn set_pos(&mut self, p: Vec3) {
        self.m[0][3] = p[0];
        self.m[1][3] = p[1];
        self.m[2][3] = p[2];
    }

    /// Copy of this pose with the rotation kept and translation replaced.
    #[must_use]
    pub fn with_pos(mut self, p: Vec3) -> Self {
        self.set_pos(p);
        self
    }

    #[must_use]
    pub const fn vx(&self) -> Vec3 {
        [self.m[0][0], self.m[1][0], self.m[2][0]]
    }

    #[must_use]
    pub const fn vy(&self) -> Vec3 {
        [self.m[0][1], self.m[1][1], self.m[2][1]]
    }

    #[must_use]
    pub const fn vz(&self) -> Vec3 {
        [self.m[0][2], self.m[1][2], self.m[2][2]]
    }

    /// True when the bottom row is `[0 0 0 1]` and the rotation block is
    /// orthonormal within [`POSE_TOLERANCE`].
    #[must_use]
    pub fn is_pose(&self) -> bool {
        let bottom = [0.0, 0.0, 0.0, 1.0];
        if self.m[3]
            .iter()
            .zip(bottom)
            .any(|(a, b)| (a - b).abs() > POSE_TOLERANCE)
        {
            return false;
        }

        let cols = [self.vx(), self.vy(), self.vz()];
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                if (vector::dot(&cols[i], &cols[j]) - expected).abs() > POSE_TOLERANCE {
                    return false;
                }
            }
        }
        true
    }

    /// Inverse transform.
    ///
    /// Rigid poses use `[R' -R't]`. Anything else goes through a general LU
    /// inverse.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Singular` for a non-invertible general matrix.
    pub fn inv(&self) -> Result<Self> {
        if self.is_pose() {
            return Ok(self.rigid_inv());
        }

        let inv = Mat::from(*self).inv()?;
        Self::try_from(&inv)
    }

    fn rigid_inv(&self) -> Self {
        let r = self.rotation();
        let t = self.pos();
        let mut out = Self::eye();
        for i in 0..3 {
            for j in 0..3 {
                out.m[i][j] = r[j][i];
            }
            out.m[i][3] = -(r[0][i] * t[0] + r[1][i] * t[1] + r[2][i] * t[2]);
        }
        out
    }

    /// Apply the transform to a point.
    #[must_use]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.m[i][0] * p[0] + self.m[i][1] * p[1] + self.m[i][2] * p[2] + self.m[i][3];
        }
        out
    }

    /// Rotate a direction (translation ignored).
    #[must_use]
    pub fn rotate_vector(&self, v: Vec3) -> Vec3 {
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.m[i][0] * v[0] + self.m[i][1] * v[1] + self.m[i][2] * v[2];
        }
        out
    }

    /// Rotation angle of the pose in radians, in `[0, pi]`.
    #[must_use]
    pub fn angle(&self) -> f64 {
        let trace = self.m[0][0] + self.m[1][1] + self.m[2][2];
        ((trace - 1.0) / 2.0).clamp(-1.0, 1.0).acos()
    }

    /// Rotation angle between two poses in radians.
    #[must_use]
    pub fn angle_between(&self, other: &Self) -> f64 {
        (self.rigid_inv() * *other).angle()
    }

    /// Distance between the two origins.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        vector::distance(&self.pos(), &other.pos())
    }

    /// True when both the origin distance and rotation angle fall within
    /// tolerance.
    #[must_use]
    pub fn is_similar(&self, other: &Self, tol_mm: f64, tol_rad: f64) -> bool {
        self.distance(other) <= tol_mm && self.angle_between(other) <= tol_rad
    }

    /// Offset expressed in the tool frame: `self * transl(x, y, z)`.
    #[must_use]
    pub fn rel_tool(&self, x: f64, y: f64, z: f64) -> Self {
        *self * Self::transl(x, y, z)
    }

    /// Offset expressed in the reference frame: `transl(x, y, z) * self`.
    #[must_use]
    pub fn offset(&self, x: f64, y: f64, z: f64) -> Self {
        Self::transl(x, y, z) * *self
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        Pose { m: out }
    }
}

impl Mul<Vec3> for Pose {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        self.transform_point(rhs)
    }
}

impl Index<(usize, usize)> for Pose {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.m[r][c]
    }
}

impl IndexMut<(usize, usize)> for Pose {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.m[r][c]
    }
}

impl From<Pose> for Mat {
    fn from(p: Pose) -> Self {
        let mut m = Mat::zeros(4, 4);
        for (r, row) in p.m.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                m[(r, c)] = *v;
            }
        }
        m
    }
}

impl TryFrom<&Mat> for Pose {
    type Error = MathError;

    fn try_from(m: &Mat) -> Result<Self> {
        if m.size() != (4, 4) {
            return Err(MathError::NotAPose(format!(
                "expected 4x4, got {}x{}",
                m.rows(),
                m.cols()
            )));
        }

        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = m[(r, c)];
            }
        }
        Ok(Self { m: out })
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.m {
            writeln!(
                f,
                "[ {:>10.3}, {:>10.3}, {:>10.3}, {:>10.3} ]",
                row[0], row[1], row[2], row[3]
            )?;
        }
        Ok(())
    }
}
