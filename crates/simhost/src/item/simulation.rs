//! Per-item collision and visibility state.

use simhost_math::Mat;
use simhost_rpc::{Error, Result};

use super::Item;

impl Item {
    /// True when this item currently collides with `other`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn collision(&self, other: &Item) -> Result<bool> {
        let session = self.session()?;
        let mut rpc = session.rpc("Collided").await?;
        rpc.send(&self.raw)?;
        rpc.send(other)?;
        let hit: i32 = rpc.reply().await?;
        Ok(hit > 0)
    }

    /// Enable or disable collision checking between this item and `other`.
    /// Returns whether the host changed anything.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn set_collision_active_with(&self, other: &Item, active: bool) -> Result<bool> {
        let session = self.session()?;
        let mut rpc = session.rpc("Collision_SetPair").await?;
        rpc.send(&self.raw)?;
        rpc.send(other)?;
        rpc.send(&i32::from(active))?;
        let changed: i32 = rpc.reply().await?;
        Ok(changed > 0)
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn visible(&self) -> Result<bool> {
        let visible: i32 = self.call("G_Visible").await?;
        Ok(visible != 0)
    }

    /// Show or hide the item. `frame_visible` of `None` leaves the
    /// reference frame as it is.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_visible(&self, visible: bool, frame_visible: Option<bool>) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("S_Visible").await?;
        rpc.send(&self.raw)?;
        rpc.send(&i32::from(visible))?;
        rpc.send(&frame_visible.map_or(-1, i32::from))?;
        rpc.finish().await
    }

    /// Display a sequence of joint positions on this robot, one column per
    /// position.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` when the row count does not match a known DOF.
    pub async fn show_sequence(&self, sequence: &Mat) -> Result<()> {
        self.require_mechanism("show_sequence")?;
        if sequence.is_empty() {
            return Err(Error::input("empty sequence"));
        }
        if let Some(dof) = self.cached_dof()?
            && sequence.rows() < dof
        {
            return Err(Error::input(format!(
                "sequence has {} rows, robot has {dof} axes",
                sequence.rows()
            )));
        }
        self.call_with("Show_Seq", sequence).await
    }
}
