//! Cooperative stop flag for scripts started from the host.
//!
//! The host shows a script as running while `RunApplication/<name>` is set.
//! When the user stops it there, the host clears the parameter; the script
//! notices on its next [`AppRunner::should_continue`] and winds down.

use simhost_rpc::{Error, Result};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::param::ParamValue;

const PARAM_PREFIX: &str = "RunApplication/";

#[derive(Debug)]
pub struct AppRunner {
    client: Client,
    param: String,
    finished: bool,
}

impl AppRunner {
    /// Mark `name` as running.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for an empty name, or any RPC error.
    pub async fn start(client: Client, name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::input("application name must not be empty"));
        }
        let param = format!("{PARAM_PREFIX}{name}");
        client.set_param(&param, 1).await?;
        info!("Application {name} running");
        Ok(Self {
            client,
            param,
            finished: false,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.param[PARAM_PREFIX.len()..]
    }

    /// False once the host has cleared the flag.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn should_continue(&self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let value = self.client.param(&self.param).await?;
        let running = value.as_f64().is_some_and(|v| v != 0.0);
        if !running {
            debug!("Application {} asked to stop", self.name());
        }
        Ok(running)
    }

    /// Clear the flag.
    ///
    /// # Errors
    ///
    /// Any RPC error; the flag may still be set on the host.
    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.client.set_param(&self.param, ParamValue::None).await
    }
}

impl Drop for AppRunner {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Application {} dropped without finish(); host flag left set",
                self.name()
            );
        }
    }
}
