//! Typed field codec for the host byte stream.
//!
//! The stream carries no message boundaries. An RPC is a command line
//! followed by typed fields in both directions, so the codec works one field
//! at a time:
//!
//! ```text
//! int32   4 bytes BE
//! float64 8 bytes BE (IEEE-754)
//! line    UTF-8 bytes up to '\n'
//! array   int32 n, n x float64
//! matrix  int32 rows, int32 cols, rows*cols x float64 (column-major)
//! pose    16 x float64 (column-major)
//! item    int64 handle, int32 type tag
//! bytes   int32 n, n bytes
//! ```
//!
//! [`Decode::decode`] never consumes input. It reports how many bytes the
//! value occupied, or [`CodecError::Incomplete`] with the total number of
//! bytes it needs to make progress.

use std::io;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, BytesMut};
use simhost_math::{Mat, Pose};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::RawItem;

/// Largest line, array, matrix or byte blob accepted from the stream (256 MB).
pub const MAX_FIELD_SIZE: usize = 256 * 1024 * 1024;

/// Outgoing lines cannot contain the terminator; embedded newlines are sent
/// as this marker instead.
pub const LINE_BREAK_MARKER: &str = "<br>";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not enough buffered bytes yet. `needed` is the total length required.
    #[error("Incomplete field: need {needed} bytes")]
    Incomplete { needed: usize },

    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Negative length: {0}")]
    NegativeLength(i32),

    #[error("Field too large: {0} bytes (max: {MAX_FIELD_SIZE})")]
    TooLarge(usize),

    #[error("Malformed field: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

pub type DecodeResult<T> = std::result::Result<(T, usize), CodecError>;

pub trait Encode {
    /// Append the wire form of `self` to `dst`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::TooLarge` when a length does not fit the frame.
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError>;
}

pub trait Decode: Sized {
    /// Decode one value from the front of `src`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Incomplete` when `src` is too short, or a framing
    /// error when the bytes can never form a valid value.
    fn decode(src: &[u8]) -> DecodeResult<Self>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        (**self).encode(dst)
    }
}

fn need(src: &[u8], n: usize) -> Result<(), CodecError> {
    if src.len() < n {
        Err(CodecError::Incomplete { needed: n })
    } else {
        Ok(())
    }
}

fn length_prefix(value: usize) -> Result<i32, CodecError> {
    if value > MAX_FIELD_SIZE {
        return Err(CodecError::TooLarge(value));
    }
    i32::try_from(value).map_err(|_| CodecError::TooLarge(value))
}

/// Reads an `int32` count and checks the payload it announces.
fn read_count(src: &[u8], at: usize, elem_size: usize) -> Result<usize, CodecError> {
    let (raw, _) = i32::decode(&src[at..])?;
    let n = usize::try_from(raw).map_err(|_| CodecError::NegativeLength(raw))?;
    let bytes = n
        .checked_mul(elem_size)
        .ok_or(CodecError::TooLarge(usize::MAX))?;
    if bytes > MAX_FIELD_SIZE {
        return Err(CodecError::TooLarge(bytes));
    }
    Ok(n)
}

fn read_f64s(src: &[u8], count: usize) -> Vec<f64> {
    let mut buf = &src[..count * 8];
    let mut out = Vec::with_capacity(count);
    while buf.has_remaining() {
        out.push(buf.get_f64());
    }
    out
}

impl Encode for i32 {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.put_i32(*self);
        Ok(())
    }
}

impl Decode for i32 {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 4)?;
        let mut buf = &src[..4];
        Ok((buf.get_i32(), 4))
    }
}

impl Encode for f64 {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.put_f64(*self);
        Ok(())
    }
}

impl Decode for f64 {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 8)?;
        let mut buf = &src[..8];
        Ok((buf.get_f64(), 8))
    }
}

impl Encode for str {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        if self.len() > MAX_FIELD_SIZE {
            return Err(CodecError::TooLarge(self.len()));
        }
        let line = self.replace('\n', LINE_BREAK_MARKER);
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

impl Encode for String {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        self.as_str().encode(dst)
    }
}

impl Decode for String {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        let Some(end) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_FIELD_SIZE {
                return Err(CodecError::TooLarge(src.len()));
            }
            return Err(CodecError::Incomplete {
                needed: src.len() + 1,
            });
        };

        let text = std::str::from_utf8(&src[..end])?;
        let text = text.strip_suffix('\r').unwrap_or(text);
        Ok((text.to_string(), end + 1))
    }
}

impl Encode for [f64] {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        length_prefix(self.len() * 8)?;
        let n = length_prefix(self.len())?;
        dst.reserve(4 + self.len() * 8);
        dst.put_i32(n);
        for v in self {
            dst.put_f64(*v);
        }
        Ok(())
    }
}

impl Encode for Vec<f64> {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        self.as_slice().encode(dst)
    }
}

impl Decode for Vec<f64> {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 4)?;
        let n = read_count(src, 0, 8)?;
        let total = 4 + n * 8;
        need(src, total)?;
        Ok((read_f64s(&src[4..], n), total))
    }
}

impl Encode for Mat {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        length_prefix(self.rows() * self.cols() * 8)?;
        dst.reserve(8 + self.rows() * self.cols() * 8);
        dst.put_i32(length_prefix(self.rows())?);
        dst.put_i32(length_prefix(self.cols())?);
        for v in self.to_col_major() {
            dst.put_f64(v);
        }
        Ok(())
    }
}

impl Decode for Mat {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 8)?;
        let rows = read_count(src, 0, 8)?;
        let cols = read_count(src, 4, 8)?;
        let count = rows
            .checked_mul(cols)
            .filter(|c| c.saturating_mul(8) <= MAX_FIELD_SIZE)
            .ok_or(CodecError::TooLarge(rows.saturating_mul(cols).saturating_mul(8)))?;

        let total = 8 + count * 8;
        need(src, total)?;
        let values = read_f64s(&src[8..], count);
        let mat = Mat::from_col_major(rows, cols, &values)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        Ok((mat, total))
    }
}

impl Encode for Pose {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.reserve(128);
        for v in self.to_col_major() {
            dst.put_f64(v);
        }
        Ok(())
    }
}

impl Decode for Pose {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 128)?;
        let values = read_f64s(src, 16);
        let mut flat = [0.0; 16];
        flat.copy_from_slice(&values);
        Ok((Pose::from_col_major(&flat), 128))
    }
}

impl Encode for RawItem {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        dst.reserve(12);
        dst.put_u64(self.handle);
        dst.put_i32(self.type_tag);
        Ok(())
    }
}

impl Decode for RawItem {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 12)?;
        let mut buf = &src[..12];
        let handle = buf.get_u64();
        let type_tag = buf.get_i32();
        Ok((RawItem { handle, type_tag }, 12))
    }
}

/// Length-prefixed opaque bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl Encode for Blob {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        let n = length_prefix(self.0.len())?;
        dst.reserve(4 + self.0.len());
        dst.put_i32(n);
        dst.put_slice(&self.0);
        Ok(())
    }
}

impl Decode for Blob {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        need(src, 4)?;
        let n = read_count(src, 0, 1)?;
        need(src, 4 + n)?;
        Ok((Blob(src[4..4 + n].to_vec()), 4 + n))
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Adapts a single [`Decode`]/[`Encode`] type to `tokio_util`'s codec traits,
/// for streams that repeat one field type.
#[derive(Debug)]
pub struct WireCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for WireCodec<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> WireCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Decode> Decoder for WireCodec<T> {
    type Item = T;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>, CodecError> {
        decode_buffered(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<T>, CodecError> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::UnexpectedEof),
        }
    }
}

impl<T: Encode> Encoder<T> for WireCodec<T> {
    type Error = CodecError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), CodecError> {
        item.encode(dst)
    }
}

/// Decode one value from a read buffer, consuming it on success. Returns
/// `Ok(None)` and reserves room when more bytes are needed.
///
/// # Errors
///
/// Any non-incomplete framing error.
pub fn decode_buffered<T: Decode>(src: &mut BytesMut) -> Result<Option<T>, CodecError> {
    match T::decode(src) {
        Ok((value, used)) => {
            src.advance(used);
            Ok(Some(value))
        }
        Err(CodecError::Incomplete { needed }) => {
            src.reserve(needed.saturating_sub(src.len()));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
