//! General dense M x N matrix.
//!
//! Storage is row-major. The wire and file formats are column-major; use
//! [`Mat::from_col_major`] and [`Mat::to_col_major`] at those boundaries.

use std::fmt;
use std::ops::{Index, IndexMut, Range};

use serde::{Deserialize, Serialize};

use crate::error::{MathError, Result};

/// Pivot magnitude below which a matrix is treated as singular.
const SINGULAR_EPS: f64 = 1e-14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mat {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Mat {
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[must_use]
    pub fn eye(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Build from nested rows. All rows must have the same length.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` for ragged input.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(MathError::shape(format!(
                "row {bad} has {} columns, expected {cols}",
                rows[bad].len()
            )));
        }

        Ok(Self {
            rows: rows.len(),
            cols,
            data: rows.iter().flatten().copied().collect(),
        })
    }

    /// Build from a flat row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if `data.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MathError::shape(format!(
                "{} values cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a flat column-major buffer (wire and file order).
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if `data.len() != rows * cols`.
    pub fn from_col_major(rows: usize, cols: usize, data: &[f64]) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MathError::shape(format!(
                "{} values cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }

        let mut m = Self::zeros(rows, cols);
        for c in 0..cols {
            for r in 0..rows {
                m[(r, c)] = data[c * rows + r];
            }
        }
        Ok(m)
    }

    /// A single column built from a vector.
    #[must_use]
    pub fn column(values: &[f64]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Set one element.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` when the index is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows || col >= self.cols {
            return Err(MathError::shape(format!(
                "index ({row}, {col}) outside {}x{}",
                self.rows, self.cols
            )));
        }
        self.data[row * self.cols + col] = value;
        Ok(())
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Option<Vec<f64>> {
        (row < self.rows).then(|| self.data[row * self.cols..(row + 1) * self.cols].to_vec())
    }

    #[must_use]
    pub fn col(&self, col: usize) -> Option<Vec<f64>> {
        (col < self.cols).then(|| (0..self.rows).map(|r| self.data[r * self.cols + col]).collect())
    }

    /// Replace a column.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if the column index or length is wrong.
    pub fn set_col(&mut self, col: usize, values: &[f64]) -> Result<()> {
        if col >= self.cols || values.len() != self.rows {
            return Err(MathError::shape(format!(
                "cannot set column {col} of {}x{} with {} values",
                self.rows,
                self.cols,
                values.len()
            )));
        }
        for (r, v) in values.iter().enumerate() {
            self.data[r * self.cols + col] = *v;
        }
        Ok(())
    }

    /// Sub-matrix over half-open row and column ranges.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if a range exceeds the matrix.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Self> {
        if rows.end > self.rows || cols.end > self.cols || rows.start > rows.end || cols.start > cols.end
        {
            return Err(MathError::shape(format!(
                "slice {rows:?} x {cols:?} outside {}x{}",
                self.rows, self.cols
            )));
        }

        let mut out = Self::zeros(rows.len(), cols.len());
        for (i, r) in rows.clone().enumerate() {
            for (j, c) in cols.clone().enumerate() {
                out[(i, j)] = self[(r, c)];
            }
        }
        Ok(out)
    }

    /// Horizontal concatenation `[self other]`.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if row counts differ.
    pub fn hcat(&self, other: &Self) -> Result<Self> {
        if self.rows != other.rows {
            return Err(MathError::shape(format!(
                "hcat needs equal rows, got {} and {}",
                self.rows, other.rows
            )));
        }

        let cols = self.cols + other.cols;
        let mut data = Vec::with_capacity(self.rows * cols);
        for r in 0..self.rows {
            data.extend_from_slice(&self.data[r * self.cols..(r + 1) * self.cols]);
            data.extend_from_slice(&other.data[r * other.cols..(r + 1) * other.cols]);
        }
        Ok(Self {
            rows: self.rows,
            cols,
            data,
        })
    }

    /// Vertical concatenation `[self; other]`.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if column counts differ.
    pub fn vcat(&self, other: &Self) -> Result<Self> {
        if self.cols != other.cols {
            return Err(MathError::shape(format!(
                "vcat needs equal columns, got {} and {}",
                self.cols, other.cols
            )));
        }

        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Ok(Self {
            rows: self.rows + other.rows,
            cols: self.cols,
            data,
        })
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut out = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out[(c, r)] = self[(r, c)];
            }
        }
        out
    }

    /// Matrix product `self * other`.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if inner dimensions differ.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        if self.cols != other.rows {
            return Err(MathError::shape(format!(
                "{}x{} * {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }

        let mut out = Self::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for k in 0..self.cols {
                let a = self[(r, k)];
                if a == 0.0 {
                    continue;
                }
                for c in 0..other.cols {
                    out.data[r * other.cols + c] += a * other.data[k * other.cols + c];
                }
            }
        }
        Ok(out)
    }

    /// Element-wise product.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if sizes differ.
    pub fn mul_elem(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "mul_elem", |a, b| a * b)
    }

    /// Element-wise sum.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if sizes differ.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    /// Element-wise difference.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` if sizes differ.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, "sub", |a, b| a - b)
    }

    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|v| v * factor).collect(),
        }
    }

    fn zip_with(&self, other: &Self, op: &str, f: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.size() != other.size() {
            return Err(MathError::shape(format!(
                "{op} on {}x{} and {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| f(*a, *b))
                .collect(),
        })
    }

    /// Inverse by LU decomposition with partial pivoting.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` for non-square input and
    /// `MathError::Singular` when a pivot vanishes.
    pub fn inv(&self) -> Result<Self> {
        let (lu, perm, _) = self.lu()?;
        let n = self.rows;
        let mut inv = Self::zeros(n, n);

        for col in 0..n {
            // Forward substitution on the permuted unit vector.
            let mut y = vec![0.0; n];
            for i in 0..n {
                let mut sum = if perm[i] == col { 1.0 } else { 0.0 };
                for k in 0..i {
                    sum -= lu[(i, k)] * y[k];
                }
                y[i] = sum;
            }
            for i in (0..n).rev() {
                let mut sum = y[i];
                for k in i + 1..n {
                    sum -= lu[(i, k)] * inv[(k, col)];
                }
                inv[(i, col)] = sum / lu[(i, i)];
            }
        }
        Ok(inv)
    }

    /// Determinant of a square matrix. Singular matrices return `0.0`.
    ///
    /// # Errors
    ///
    /// Returns `MathError::Shape` for non-square input.
    pub fn det(&self) -> Result<f64> {
        match self.lu() {
            Ok((lu, _, sign)) => Ok((0..self.rows).fold(sign, |acc, i| acc * lu[(i, i)])),
            Err(MathError::Singular) => Ok(0.0),
            Err(e) => Err(e),
        }
    }

    /// Doolittle LU with row pivoting. Returns the packed factors, the row
    /// permutation and the permutation sign.
    fn lu(&self) -> Result<(Self, Vec<usize>, f64)> {
        if self.rows != self.cols {
            return Err(MathError::shape(format!(
                "LU needs a square matrix, got {}x{}",
                self.rows, self.cols
            )));
        }

        let n = self.rows;
        let mut a = self.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut sign = 1.0;
        let scale = self.data.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);

        for k in 0..n {
            let (pivot_row, pivot) = (k..n)
                .map(|r| (r, a[(r, k)].abs()))
                .fold((k, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

            if pivot < SINGULAR_EPS * scale {
                return Err(MathError::Singular);
            }

            if pivot_row != k {
                for c in 0..n {
                    a.data.swap(k * n + c, pivot_row * n + c);
                }
                perm.swap(k, pivot_row);
                sign = -sign;
            }

            for r in k + 1..n {
                let factor = a[(r, k)] / a[(k, k)];
                a[(r, k)] = factor;
                for c in k + 1..n {
                    a[(r, c)] -= factor * a[(k, c)];
                }
            }
        }

        Ok((a, perm, sign))
    }

    /// Flat column-major copy (wire and file order).
    #[must_use]
    pub fn to_col_major(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.data.len());
        for c in 0..self.cols {
            for r in 0..self.rows {
                out.push(self.data[r * self.cols + c]);
            }
        }
        out
    }

    #[must_use]
    pub fn as_row_major(&self) -> &[f64] {
        &self.data
    }

    /// Iterate columns as owned vectors. Joint lists and point clouds are
    /// stored one sample per column.
    pub fn iter_cols(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.cols).map(|c| (0..self.rows).map(|r| self.data[r * self.cols + c]).collect())
    }
}

impl Index<(usize, usize)> for Mat {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        assert!(row < self.rows && col < self.cols, "index out of range");
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Mat {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        assert!(row < self.rows && col < self.cols, "index out of range");
        &mut self.data[row * self.cols + col]
    }
}

impl fmt::Display for Mat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix: ({}, {})", self.rows, self.cols)?;
        for r in 0..self.rows {
            let row: Vec<String> = (0..self.cols)
                .map(|c| format!("{:.3}", self[(r, c)]))
                .collect();
            writeln!(f, "[ {} ]", row.join(", "))?;
        }
        Ok(())
    }
}
