//! Station tree: names, parents, children, creation and deletion.

use std::path::Path;

use simhost_math::{Mat, Pose};
use simhost_rpc::{Error, ItemType, RawItem, Result};
use tracing::debug;

use super::{Item, ItemList, Projection};

impl Item {
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn name(&self) -> Result<String> {
        self.call("G_Name").await
    }

    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.call_with("S_Name", name).await
    }

    /// Type as the host currently reports it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn query_type(&self) -> Result<ItemType> {
        let code: i32 = self.call("G_Type").await?;
        Ok(ItemType::from_code(code))
    }

    /// Parent in the station tree; `None` for the station itself.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn parent(&self) -> Result<Option<Item>> {
        let raw: RawItem = self.call("G_Parent").await?;
        Ok(raw.is_valid().then(|| self.sibling(raw)))
    }

    /// Direct children, in tree order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn childs(&self) -> Result<Vec<Item>> {
        let list: ItemList = self.call("G_Childs").await?;
        Ok(list
            .0
            .into_iter()
            .filter(RawItem::is_valid)
            .map(|raw| self.sibling(raw))
            .collect())
    }

    /// Move under `parent`, keeping the pose relative to the parent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn set_parent(&self, parent: &Item) -> Result<()> {
        self.call_with("S_Parent", parent).await
    }

    /// Move under `parent`, keeping the absolute pose.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for stale handles.
    pub async fn set_parent_static(&self, parent: &Item) -> Result<()> {
        self.call_with("S_Parent_Static", parent).await
    }

    /// Delete the item and everything below it. The handle is stale
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn delete(&self) -> Result<()> {
        let session = self.session()?;
        let link = self.link()?;
        let mut rpc = session.rpc("Remove").await?;
        rpc.send(&self.raw)?;
        rpc.finish().await?;
        link.motion().remove(&self.raw.handle);
        debug!("Deleted item {:#x}", self.raw.handle);
        Ok(())
    }

    /// Copy to the host clipboard; see [`crate::Client::paste`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` for a stale handle.
    pub async fn copy(&self) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc("Copy").await?;
        rpc.send(&self.raw)?;
        rpc.finish().await
    }

    /// Save this item to a file (station, robot, tool or object format
    /// chosen by extension).
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.owner()?.save(path, Some(self)).await
    }

    /// Load a file as a child of this item.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` when the host could not load it.
    pub async fn add_file(&self, path: impl AsRef<Path>) -> Result<Item> {
        self.owner()?.add_file(path, Some(self)).await
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn add_frame(&self, name: &str) -> Result<Item> {
        self.owner()?.add_frame(name, Some(self)).await
    }

    /// Add an empty target under this frame for `robot`.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn add_target(&self, name: &str, robot: Option<&Item>) -> Result<Item> {
        self.owner()?.add_target(name, Some(self), robot).await
    }

    /// New program driven by this robot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` unless this is a mechanism.
    pub async fn add_program(&self, name: &str) -> Result<Item> {
        self.require_mechanism("add_program")?;
        self.owner()?.add_program(name, Some(self)).await
    }

    /// Add a tool to this robot with the given TCP pose.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` unless this is a mechanism.
    pub async fn add_tool(&self, tcp: &Pose, name: &str) -> Result<Item> {
        self.require_mechanism("add_tool")?;
        let session = self.session()?;
        let mut rpc = session.rpc("AddToolEmpty").await?;
        rpc.send(&self.raw)?;
        rpc.send(tcp)?;
        rpc.send(name)?;
        let raw: RawItem = rpc.reply().await?;
        if !raw.is_valid() {
            return Err(Error::Item("host did not create the tool".into()));
        }
        if let Some(state) = self.link()?.motion().get_mut(&self.raw.handle) {
            state.tool = Some(*tcp);
        }
        Ok(self.sibling(raw))
    }

    /// Add a curve attached to this object.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for point matrices with fewer than 3 columns.
    pub async fn add_curve(
        &self,
        points: &Mat,
        add_to_ref: bool,
        projection: Projection,
    ) -> Result<Item> {
        self.owner()?
            .add_curve(points, Some(self), add_to_ref, projection)
            .await
    }

    /// Add points attached to this object.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for point matrices with fewer than 3 columns.
    pub async fn add_points(
        &self,
        points: &Mat,
        add_to_ref: bool,
        projection: Projection,
    ) -> Result<Item> {
        self.owner()?
            .add_points(points, Some(self), add_to_ref, projection)
            .await
    }

    /// Add a triangle mesh attached to this object.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` for a malformed triangle matrix.
    pub async fn add_shape(&self, triangles: &Mat, add_to_ref: bool) -> Result<Item> {
        self.owner()?.add_shape(triangles, Some(self), add_to_ref).await
    }

    /// Fails with `Error::Input` when the type tag says this is not a robot.
    pub(crate) fn require_mechanism(&self, operation: &str) -> Result<()> {
        let item_type = self.item_type();
        if item_type.is_mechanism() || matches!(item_type, ItemType::Other(_)) {
            Ok(())
        } else {
            Err(Error::input(format!(
                "{operation} needs a robot or mechanism, not {item_type}"
            )))
        }
    }
}
