use thiserror::Error;

#[derive(Error, Debug)]
pub enum MathError {
    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Matrix is singular")]
    Singular,

    #[error("Not a homogeneous pose: {0}")]
    NotAPose(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MathError {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}

pub type Result<T> = std::result::Result<T, MathError>;
