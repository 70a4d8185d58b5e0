//! Typed host parameters.
//!
//! Station and item parameters hold whatever the host stores under a key:
//! text, raw bytes, a matrix or a number. Values travel as an `int32` kind
//! tag followed by the kind's field.

use std::fmt;

use bytes::BytesMut;
use simhost_math::Mat;
use simhost_rpc::wire::DecodeResult;
use simhost_rpc::{Blob, CodecError, Decode, Encode, Error, Result};

const KIND_NONE: i32 = 0;
const KIND_STRING: i32 = 1;
const KIND_BYTES: i32 = 2;
const KIND_MATRIX: i32 = 3;
const KIND_FLOAT: i32 = 4;
const KIND_INT: i32 = 5;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParamValue {
    /// Key not set.
    #[default]
    None,
    Int(i32),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Matrix(Mat),
    /// Stored as JSON text.
    Json(serde_json::Value),
}

impl ParamValue {
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Matrix(_) => "matrix",
            Self::Json(_) => "json",
        }
    }

    /// Text form. Numbers are formatted; bytes must be UTF-8.
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Int(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Json(v) => Some(v.to_string()),
            Self::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Self::None | Self::Matrix(_) => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // integral check precedes the cast
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.abs() <= f64::from(i32::MAX) => Some(*v as i32),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(f64::from(*v)),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_matrix(&self) -> Option<&Mat> {
        match self {
            Self::Matrix(m) => Some(m),
            _ => None,
        }
    }

    /// Parsed JSON. Strings and bytes holding JSON text are parsed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the stored text is not valid JSON and
    /// `Error::Input` for matrix values.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            Self::Json(v) => Ok(v.clone()),
            Self::None => Ok(serde_json::Value::Null),
            Self::Int(v) => Ok((*v).into()),
            Self::Float(v) => Ok((*v).into()),
            Self::String(s) => Ok(serde_json::from_str(s)?),
            Self::Bytes(b) => Ok(serde_json::from_slice(b)?),
            Self::Matrix(_) => Err(Error::input("matrix parameter has no JSON form")),
        }
    }

    /// Error for a typed getter that found the wrong kind.
    pub(crate) fn wrong_kind(&self, name: &str, wanted: &str) -> Error {
        Error::input(format!(
            "parameter {name} holds {}, not {wanted}",
            self.kind_name()
        ))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("<none>"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Matrix(m) => write!(f, "{m}"),
            other => match other.as_string() {
                Some(s) => f.write_str(&s),
                None => Ok(()),
            },
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<Mat> for ParamValue {
    fn from(m: Mat) -> Self {
        Self::Matrix(m)
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl Encode for ParamValue {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        match self {
            Self::None => KIND_NONE.encode(dst),
            Self::String(s) => {
                KIND_STRING.encode(dst)?;
                s.encode(dst)
            }
            Self::Json(v) => {
                KIND_STRING.encode(dst)?;
                v.to_string().encode(dst)
            }
            Self::Bytes(b) => {
                KIND_BYTES.encode(dst)?;
                Blob(b.clone()).encode(dst)
            }
            Self::Matrix(m) => {
                KIND_MATRIX.encode(dst)?;
                m.encode(dst)
            }
            Self::Float(v) => {
                KIND_FLOAT.encode(dst)?;
                v.encode(dst)
            }
            Self::Int(v) => {
                KIND_INT.encode(dst)?;
                v.encode(dst)
            }
        }
    }
}

impl Decode for ParamValue {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        let (kind, at) = i32::decode(src)?;
        let rest = &src[at..];
        let (value, used) = match kind {
            KIND_NONE => (Self::None, 0),
            KIND_STRING => {
                let (s, n) = String::decode(rest)?;
                (Self::String(s), n)
            }
            KIND_BYTES => {
                let (b, n) = Blob::decode(rest)?;
                (Self::Bytes(b.0), n)
            }
            KIND_MATRIX => {
                let (m, n) = Mat::decode(rest)?;
                (Self::Matrix(m), n)
            }
            KIND_FLOAT => {
                let (v, n) = f64::decode(rest)?;
                (Self::Float(v), n)
            }
            KIND_INT => {
                let (v, n) = i32::decode(rest)?;
                (Self::Int(v), n)
            }
            other => {
                return Err(CodecError::Malformed(format!("unknown parameter kind {other}")));
            }
        };
        Ok((value, at + used))
    }
}
