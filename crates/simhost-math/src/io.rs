//! Matrix persistence.
//!
//! Binary files hold `int32 rows, int32 cols, float64[rows * cols]` in
//! column-major order, all big-endian (the same layout the host sends on the
//! wire). CSV files hold one matrix row per line; `,` and `;` are both
//! accepted as separators on load.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{MathError, Result};
use crate::mat::Mat;

/// One parsed CSV token.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }
}

/// Write `m` as a binary matrix file.
///
/// # Errors
///
/// Returns `MathError::Shape` if a dimension does not fit in `int32`, or
/// `MathError::Io` on write failure.
pub fn save_bin(m: &Mat, path: impl AsRef<Path>) -> Result<()> {
    let rows = i32::try_from(m.rows()).map_err(|_| MathError::shape("too many rows"))?;
    let cols = i32::try_from(m.cols()).map_err(|_| MathError::shape("too many columns"))?;

    let mut buf = Vec::with_capacity(8 + 8 * m.rows() * m.cols());
    buf.extend_from_slice(&rows.to_be_bytes());
    buf.extend_from_slice(&cols.to_be_bytes());
    for v in m.to_col_major() {
        buf.extend_from_slice(&v.to_be_bytes());
    }

    fs::write(path, buf)?;
    Ok(())
}

/// Read a binary matrix file written by [`save_bin`].
///
/// # Errors
///
/// Returns `MathError::Parse` for truncated files or negative dimensions.
pub fn load_bin(path: impl AsRef<Path>) -> Result<Mat> {
    let bytes = fs::read(path)?;
    decode_bin(&bytes)
}

fn decode_bin(bytes: &[u8]) -> Result<Mat> {
    let header = |at: usize| -> Result<usize> {
        let raw: [u8; 4] = bytes
            .get(at..at + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| MathError::Parse("truncated header".into()))?;
        usize::try_from(i32::from_be_bytes(raw))
            .map_err(|_| MathError::Parse("negative dimension".into()))
    };

    let rows = header(0)?;
    let cols = header(4)?;
    let count = rows
        .checked_mul(cols)
        .ok_or_else(|| MathError::Parse("dimension overflow".into()))?;

    let body = &bytes[8..];
    if body.len() != count * 8 {
        return Err(MathError::Parse(format!(
            "expected {count} values, file holds {} bytes",
            body.len()
        )));
    }

    let values: Vec<f64> = body
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_be_bytes(raw)
        })
        .collect();
    Mat::from_col_major(rows, cols, &values)
}

/// Write `m` as CSV with `,` separators.
///
/// # Errors
///
/// Returns `MathError::Io` on write failure.
pub fn save_csv(m: &Mat, path: impl AsRef<Path>) -> Result<()> {
    let mut f = fs::File::create(path)?;
    for r in 0..m.rows() {
        let row: Vec<String> = (0..m.cols()).map(|c| m[(r, c)].to_string()).collect();
        writeln!(f, "{}", row.join(","))?;
    }
    Ok(())
}

/// Parse CSV text into rows of cells. Blank lines are skipped. Numeric
/// tokens become [`Cell::Number`], everything else stays text.
#[must_use]
pub fn parse_csv(text: &str) -> Vec<Vec<Cell>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let sep = if line.contains(';') { ';' } else { ',' };
            line.split(sep).map(parse_cell).collect()
        })
        .collect()
}

fn parse_cell(token: &str) -> Cell {
    let token = token.trim().trim_matches('"');
    match token.parse::<f64>() {
        Ok(v) => Cell::Number(v),
        Err(_) => Cell::Text(token.to_string()),
    }
}

/// Load a CSV file as raw cells.
///
/// # Errors
///
/// Returns `MathError::Io` if the file cannot be read.
pub fn load_csv_cells(path: impl AsRef<Path>) -> Result<Vec<Vec<Cell>>> {
    Ok(parse_csv(&fs::read_to_string(path)?))
}

/// Load a CSV file as a numeric matrix.
///
/// # Errors
///
/// Returns `MathError::Parse` if any token is not numeric and
/// `MathError::Shape` for ragged rows.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Mat> {
    to_mat(&load_csv_cells(path)?)
}

/// Convert parsed cells into a matrix.
///
/// # Errors
///
/// Returns `MathError::Parse` on the first text cell.
pub fn to_mat(cells: &[Vec<Cell>]) -> Result<Mat> {
    let rows = cells
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, cell)| {
                    cell.as_f64().ok_or_else(|| {
                        MathError::Parse(format!("non-numeric value at row {r}, column {c}"))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Mat::from_rows(&rows)
}
