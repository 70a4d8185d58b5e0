//! Item parameters, raw instructions and item commands.

use simhost_math::Mat;
use simhost_rpc::Result;

use super::Item;
use crate::param::ParamValue;

/// Host parameter holding a program's slider matrix.
pub const PROG_SLIDER: &str = "ProgSlider";

/// How [`Item::run_instruction`] treats its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunType {
    /// Call a program or function by name.
    Call,
    /// Insert the text as raw controller code.
    InsertCode,
    StartThread,
    Comment,
    /// Pop up a message on the teach pendant.
    Message,
}

impl RunType {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Call => 0,
            Self::InsertCode => 1,
            Self::StartThread => 2,
            Self::Comment => 3,
            Self::Message => 4,
        }
    }
}

impl Item {
    /// Item parameter, whatever its kind. Unset parameters are
    /// `ParamValue::None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn param(&self, name: &str) -> Result<ParamValue> {
        let session = self.session()?;
        let mut rpc = session.rpc("G_ItmParamV").await?;
        rpc.send(&self.raw)?;
        rpc.send(name)?;
        rpc.reply().await
    }

    /// Set an item parameter. `ParamValue::None` removes it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let session = self.session()?;
        let mut rpc = session.rpc("S_ItmParamV").await?;
        rpc.send(&self.raw)?;
        rpc.send(name)?;
        rpc.send(&value)?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the parameter is not a matrix.
    pub async fn param_matrix(&self, name: &str) -> Result<Option<Mat>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            ParamValue::Matrix(m) => Ok(Some(m)),
            value => Err(value.wrong_kind(name, "matrix")),
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Json` if the stored text is not JSON.
    pub async fn param_json(&self, name: &str) -> Result<Option<serde_json::Value>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            value => value.to_json().map(Some),
        }
    }

    /// Current program slider matrix, if the program has one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if the host stored something else under
    /// [`PROG_SLIDER`].
    pub async fn prog_slider(&self) -> Result<Option<Mat>> {
        self.param_matrix(PROG_SLIDER).await
    }

    /// Add a raw instruction to this program; `code` is interpreted per
    /// `run_type`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn run_instruction(&self, code: &str, run_type: RunType) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("RunCode2").await?;
        rpc.send(&self.raw)?;
        rpc.send(code)?;
        rpc.send(&run_type.code())?;
        rpc.finish().await
    }

    /// Add a custom instruction shown as `name` in the program tree.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn run_code_custom(&self, code: &str, name: &str) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("InsCustom2").await?;
        rpc.send(&self.raw)?;
        rpc.send(code)?;
        rpc.send(name)?;
        rpc.finish().await
    }

    /// Item-specific command, such as `"Color"` or `"Trace"`. Returns the
    /// host's answer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn command(&self, command: &str, value: &str) -> Result<String> {
        let session = self.session()?;
        let mut rpc = session.rpc("ICMD").await?;
        rpc.send(&self.raw)?;
        rpc.send(command)?;
        rpc.send(value)?;
        rpc.reply().await
    }
}
