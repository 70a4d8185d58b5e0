//! Station-level client.
//!
//! A [`Client`] wraps one [`Session`] and mints [`Item`]s that point back
//! at it. Cloning a client shares the session; open a second client for
//! calls that must run in parallel.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simhost_math::{Mat, Pose};
use simhost_rpc::{Error, ItemType, RawItem, Result, Session, SessionConfig};
use tracing::{debug, warn};

use crate::app::AppRunner;
use crate::events::{Event, EventChannel, EventType};
use crate::item::{Item, ItemList, Projection, Speed, raw_or_none};
use crate::param::ParamValue;

/// Timeout for imports, saves and other calls that scale with station size.
pub(crate) const LONG_TIMEOUT: Duration = Duration::from_secs(600);

/// Last-set motion parameters for one mechanism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotionState {
    pub dof: Option<usize>,
    pub tool: Option<Pose>,
    pub frame: Option<Pose>,
    pub speed: Speed,
    pub rounding: Option<f64>,
}

/// How the host treats motion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunMode {
    Simulate,
    QuickValidate,
    MakeRobotProg,
    MakeRobotProgAndUpload,
    MakeRobotProgAndStart,
    RunRobot,
}

impl RunMode {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Simulate => 1,
            Self::QuickValidate => 2,
            Self::MakeRobotProg => 3,
            Self::MakeRobotProgAndUpload => 4,
            Self::MakeRobotProgAndStart => 5,
            Self::RunRobot => 6,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            1 => Self::Simulate,
            2 => Self::QuickValidate,
            3 => Self::MakeRobotProg,
            4 => Self::MakeRobotProgAndUpload,
            5 => Self::MakeRobotProgAndStart,
            6 => Self::RunRobot,
            _ => return None,
        })
    }
}

pub(crate) struct Link {
    pub(crate) session: Session,
    motion: Mutex<HashMap<u64, MotionState>>,
}

impl Link {
    pub(crate) fn motion(&self) -> MutexGuard<'_, HashMap<u64, MotionState>> {
        self.motion.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct Client {
    link: Arc<Link>,
}

impl Client {
    /// Create a client. The session connects lazily on the first call.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_session(Session::new(config))
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            link: Arc::new(Link {
                session,
                motion: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn from_link(link: Arc<Link>) -> Self {
        Self { link }
    }

    pub(crate) fn link(&self) -> &Arc<Link> {
        &self.link
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.link.session
    }

    /// Wrap a raw handle received outside an RPC (for example from an event).
    #[must_use]
    pub fn item_from_raw(&self, raw: RawItem) -> Item {
        Item::new(raw, &self.link)
    }

    fn wrap(&self, raw: RawItem) -> Option<Item> {
        raw.is_valid().then(|| Item::new(raw, &self.link))
    }

    fn wrap_all(&self, list: ItemList) -> Vec<Item> {
        list.0.into_iter().filter_map(|raw| self.wrap(raw)).collect()
    }

    /// Connect now instead of on the first call.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host cannot be reached or launched.
    pub async fn connect(&self) -> Result<()> {
        self.link.session.connect().await
    }

    pub async fn close(&self) {
        self.link.session.close().await;
    }

    /// Host version string.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn version(&self) -> Result<String> {
        self.link.session.rpc("G_Version").await?.reply().await
    }

    /// Find an item by name. `ItemType::Any` matches every type.
    ///
    /// # Errors
    ///
    /// Any RPC error. A missing item is `Ok(None)`.
    pub async fn item(&self, name: &str, item_type: ItemType) -> Result<Option<Item>> {
        let mut rpc = self.link.session.rpc("G_Item2").await?;
        rpc.send(name)?;
        rpc.send(&item_type.code())?;
        let raw: RawItem = rpc.reply().await?;
        Ok(self.wrap(raw))
    }

    /// All items of a type, in station tree order.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn items(&self, item_type: ItemType) -> Result<Vec<Item>> {
        let mut rpc = self.link.session.rpc("G_List_Items_ptr").await?;
        rpc.send(&item_type.code())?;
        let list: ItemList = rpc.reply().await?;
        Ok(self.wrap_all(list))
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn active_station(&self) -> Result<Option<Item>> {
        let raw: RawItem = self.link.session.rpc("G_ActiveStn").await?.reply().await?;
        Ok(self.wrap(raw))
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_active_station(&self, station: &Item) -> Result<()> {
        let mut rpc = self.link.session.rpc("S_ActiveStn").await?;
        rpc.send(station)?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn new_station(&self, name: &str) -> Result<Item> {
        let mut rpc = self.link.session.rpc("NewStation").await?;
        rpc.send(name)?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "station")
    }

    fn created(&self, raw: RawItem, what: &str) -> Result<Item> {
        self.wrap(raw)
            .ok_or_else(|| Error::Item(format!("host did not create the {what}")))
    }

    /// Load a station, robot, tool, CAD file or program into the station.
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` when the host could not load the file.
    pub async fn add_file(&self, path: impl AsRef<Path>, parent: Option<&Item>) -> Result<Item> {
        let path = path.as_ref().to_string_lossy();
        debug!("Loading {path}");
        let mut rpc = self
            .link
            .session
            .rpc("Add")
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(path.as_ref())?;
        rpc.send(&raw_or_none(parent))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "item")
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn add_frame(&self, name: &str, parent: Option<&Item>) -> Result<Item> {
        let mut rpc = self.link.session.rpc("Add_FRAME").await?;
        rpc.send(name)?;
        rpc.send(&raw_or_none(parent))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "frame")
    }

    /// Add an empty target under `parent`, linked to `robot`.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn add_target(
        &self,
        name: &str,
        parent: Option<&Item>,
        robot: Option<&Item>,
    ) -> Result<Item> {
        let mut rpc = self.link.session.rpc("Add_TARGET").await?;
        rpc.send(name)?;
        rpc.send(&raw_or_none(parent))?;
        rpc.send(&raw_or_none(robot))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "target")
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn add_program(&self, name: &str, robot: Option<&Item>) -> Result<Item> {
        let mut rpc = self.link.session.rpc("Add_PROG").await?;
        rpc.send(name)?;
        rpc.send(&raw_or_none(robot))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "program")
    }

    /// Add a curve from a point list: one point per row, `xyz` or `xyzijk`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if rows have fewer than 3 columns.
    pub async fn add_curve(
        &self,
        points: &Mat,
        reference: Option<&Item>,
        add_to_ref: bool,
        projection: Projection,
    ) -> Result<Item> {
        self.add_geometry("AddWire", points, reference, add_to_ref, projection)
            .await
    }

    /// Add a point cloud: one point per row, `xyz` or `xyzijk`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` if rows have fewer than 3 columns.
    pub async fn add_points(
        &self,
        points: &Mat,
        reference: Option<&Item>,
        add_to_ref: bool,
        projection: Projection,
    ) -> Result<Item> {
        self.add_geometry("AddPoints", points, reference, add_to_ref, projection)
            .await
    }

    async fn add_geometry(
        &self,
        command: &str,
        points: &Mat,
        reference: Option<&Item>,
        add_to_ref: bool,
        projection: Projection,
    ) -> Result<Item> {
        if points.cols() < 3 {
            return Err(Error::input(format!(
                "points need 3 or 6 columns, got {}",
                points.cols()
            )));
        }
        // The host expects one point per column.
        let mut rpc = self
            .link
            .session
            .rpc(command)
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(&points.transpose())?;
        rpc.send(&raw_or_none(reference))?;
        rpc.send(&i32::from(add_to_ref))?;
        rpc.send(&projection.code())?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "geometry")
    }

    /// Add a triangle mesh: three rows per triangle, `xyz` per row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Input` unless the matrix has 3 columns and a multiple
    /// of 3 rows.
    pub async fn add_shape(
        &self,
        triangles: &Mat,
        reference: Option<&Item>,
        add_to_ref: bool,
    ) -> Result<Item> {
        if triangles.cols() != 3 || triangles.rows() % 3 != 0 || triangles.is_empty() {
            return Err(Error::input(format!(
                "triangles must be (3n)x3, got {}x{}",
                triangles.rows(),
                triangles.cols()
            )));
        }
        let mut rpc = self
            .link
            .session
            .rpc("AddShape3")
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(&triangles.transpose())?;
        rpc.send(&raw_or_none(reference))?;
        rpc.send(&i32::from(add_to_ref))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "shape")
    }

    /// Paste the item last copied with [`Item::copy`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Item` if the clipboard is empty.
    pub async fn paste(&self, parent: Option<&Item>) -> Result<Item> {
        let mut rpc = self.link.session.rpc("Paste").await?;
        rpc.send(&raw_or_none(parent))?;
        let raw: RawItem = rpc.reply().await?;
        self.created(raw, "copy")
    }

    /// Save `item` (or the active station) to `path`.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn save(&self, path: impl AsRef<Path>, item: Option<&Item>) -> Result<()> {
        let path = path.as_ref().to_string_lossy();
        let mut rpc = self
            .link
            .session
            .rpc("Save")
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(path.as_ref())?;
        rpc.send(&raw_or_none(item))?;
        rpc.finish().await
    }

    /// Turn scene redraw on or off.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_render(&self, enabled: bool) -> Result<()> {
        let mut rpc = self.link.session.rpc("Render").await?;
        rpc.send(&i32::from(enabled))?;
        rpc.finish().await
    }

    /// Recompute and redraw the scene once, even with rendering off.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn update(&self) -> Result<()> {
        let mut rpc = self.link.session.rpc("Refresh").await?;
        rpc.send(&0i32)?;
        rpc.finish().await
    }

    /// Run `batch` with rendering off. Rendering is turned back on when the
    /// batch returns, fails, or is dropped before completion.
    ///
    /// # Errors
    ///
    /// The batch's error, else any error re-enabling rendering.
    pub async fn without_render<T, F>(&self, batch: F) -> Result<T>
    where
        F: AsyncFnOnce(&Client) -> Result<T>,
    {
        self.set_render(false).await?;
        let mut guard = RenderGuard {
            client: Some(self.clone()),
        };
        let result = batch(self).await;
        guard.client = None;

        let restored = self.set_render(true).await;
        let value = result?;
        restored?;
        Ok(value)
    }

    /// # Errors
    ///
    /// Returns `Error::Input` for non-positive ratios.
    pub async fn set_simulation_speed(&self, ratio: f64) -> Result<()> {
        if ratio.is_nan() || ratio <= 0.0 {
            return Err(Error::input(format!("simulation speed must be > 0, got {ratio}")));
        }
        let mut rpc = self.link.session.rpc("SimulateSpeed").await?;
        rpc.send(&ratio)?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn simulation_speed(&self) -> Result<f64> {
        self.link
            .session
            .rpc("GetSimulateSpeed")
            .await?
            .reply()
            .await
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_run_mode(&self, mode: RunMode) -> Result<()> {
        let mut rpc = self.link.session.rpc("S_RunMode").await?;
        rpc.send(&mode.code())?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Returns `Error::Protocol` if the host reports an unknown mode.
    pub async fn run_mode(&self) -> Result<RunMode> {
        let code: i32 = self.link.session.rpc("G_RunMode").await?.reply().await?;
        RunMode::from_code(code).ok_or_else(|| {
            simhost_rpc::CodecError::Malformed(format!("unknown run mode {code}")).into()
        })
    }

    /// Number of colliding pairs in the station.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn collisions(&self) -> Result<usize> {
        let n: i32 = self.link.session.rpc("Collisions").await?.reply().await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Enable or disable collision checking for the whole station.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_collision_active(&self, active: bool) -> Result<()> {
        let mut rpc = self.link.session.rpc("Collision_SetState").await?;
        rpc.send(&i32::from(active))?;
        let _changed: i32 = rpc.reply().await?;
        Ok(())
    }

    /// Station parameter, whatever its kind.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn param(&self, name: &str) -> Result<ParamValue> {
        let mut rpc = self.link.session.rpc("G_ParamV").await?;
        rpc.send(name)?;
        rpc.reply().await
    }

    /// Set a station parameter. `ParamValue::None` removes it.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_param(&self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let value = value.into();
        let mut rpc = self.link.session.rpc("S_ParamV").await?;
        rpc.send(name)?;
        rpc.send(&value)?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the parameter holds a matrix.
    pub async fn param_str(&self, name: &str) -> Result<Option<String>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            value => value
                .as_string()
                .map(Some)
                .ok_or_else(|| value.wrong_kind(name, "string")),
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the parameter is not an integer.
    pub async fn param_int(&self, name: &str) -> Result<Option<i32>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            value => value
                .as_i32()
                .map(Some)
                .ok_or_else(|| value.wrong_kind(name, "int")),
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the parameter is not numeric.
    pub async fn param_f64(&self, name: &str) -> Result<Option<f64>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| value.wrong_kind(name, "float")),
        }
    }

    /// # Errors
    ///
    /// Returns `Error::Input` if the parameter is a number or matrix.
    pub async fn param_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.param(name).await? {
            ParamValue::None => Ok(None),
            ParamValue::Bytes(b) => Ok(Some(b)),
            ParamValue::String(s) => Ok(Some(s.into_bytes())),
            value => Err(value.wrong_kind(name, "bytes")),
        }
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

    /// Station-level command, such as `"Theme"` or `"FitAll"`.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn command(&self, command: &str, value: &str) -> Result<String> {
        let mut rpc = self.link.session.rpc("SCMD").await?;
        rpc.send(command)?;
        rpc.send(value)?;
        rpc.reply().await
    }

    /// Send a command to a loaded plug-in.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn plugin_command(&self, plugin: &str, command: &str, value: &str) -> Result<String> {
        let mut rpc = self
            .link
            .session
            .rpc("PluginCommand")
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(plugin)?;
        rpc.send(command)?;
        rpc.send(value)?;
        rpc.reply().await
    }

    /// Load (`true`) or unload a plug-in by name or path.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn plugin_load(&self, plugin: &str, load: bool) -> Result<String> {
        let mut rpc = self.link.session.rpc("PluginLoad").await?;
        rpc.send(plugin)?;
        rpc.send(&i32::from(load))?;
        rpc.reply().await
    }

    /// Run a host-side program or function call by name.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn run_code(&self, code: &str, function_call: bool) -> Result<i32> {
        let mut rpc = self.link.session.rpc("RunCode").await?;
        rpc.send(code)?;
        rpc.send(&i32::from(function_call))?;
        rpc.reply().await
    }

    /// Show a message in the status bar, or as a blocking popup.
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn show_message(&self, message: &str, popup: bool) -> Result<()> {
        let mut rpc = self.link.session.rpc("ShowMessage").await?;
        if popup {
            rpc = rpc.with_timeout(LONG_TIMEOUT);
        }
        rpc.send(message)?;
        rpc.send(&i32::from(popup))?;
        rpc.finish().await
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn selection(&self) -> Result<Vec<Item>> {
        let list: ItemList = self.link.session.rpc("G_Selection").await?.reply().await?;
        Ok(self.wrap_all(list))
    }

    /// # Errors
    ///
    /// Any RPC error.
    pub async fn set_selection(&self, items: &[Item]) -> Result<()> {
        let list = ItemList(items.iter().map(Item::raw).collect());
        let mut rpc = self.link.session.rpc("S_Selection").await?;
        rpc.send(&list)?;
        rpc.finish().await
    }

    /// Render the 3-D view to an image. The host writes into a temporary
    /// directory that is removed before this returns, on every path.
    ///
    /// # Errors
    ///
    /// Any RPC error, or `Error::Io` if the image cannot be read back.
    pub async fn snapshot(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        let dir = tempfile::Builder::new().prefix("simhost-snapshot-").tempdir()?;
        let path = dir.path().join("view.png");
        let w = i32::try_from(width).map_err(|_| Error::input("width too large"))?;
        let h = i32::try_from(height).map_err(|_| Error::input("height too large"))?;

        let mut rpc = self
            .link
            .session
            .rpc("Snapshot")
            .await?
            .with_timeout(LONG_TIMEOUT);
        rpc.send(path.to_string_lossy().as_ref())?;
        rpc.send(&w)?;
        rpc.send(&h)?;
        rpc.finish().await?;

        let image = tokio::fs::read(&path).await?;
        debug!("Snapshot {width}x{height}: {} bytes", image.len());
        Ok(image)
    }

    /// Open an event channel on a separate connection to the same host.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the subscription handshake fails.
    pub async fn open_events(&self, filter: Option<&[EventType]>) -> Result<EventChannel> {
        EventChannel::subscribe(self.link.session.config(), filter).await
    }

    /// Mark `name` as running on the host. See [`AppRunner`].
    ///
    /// # Errors
    ///
    /// Any RPC error.
    pub async fn run_application(&self, name: &str) -> Result<AppRunner> {
        AppRunner::start(self.clone(), name).await
    }

    /// Last-set motion parameters for `robot`.
    #[must_use]
    pub fn motion_state(&self, robot: &Item) -> MotionState {
        self.link
            .motion()
            .get(&robot.handle())
            .cloned()
            .unwrap_or_default()
    }

    /// Drop cached motion state the event says is out of date.
    pub fn observe(&self, event: &Event) {
        let mut cache = self.link.motion();
        match event.event_type {
            EventType::ToolModified => {
                for state in cache.values_mut() {
                    state.tool = None;
                }
            }
            EventType::ItemMovedPose | EventType::ItemMoved => {
                for state in cache.values_mut() {
                    state.frame = None;
                }
            }
            EventType::ItemChanged => {
                if let Some(state) = cache.get_mut(&event.item.handle) {
                    let dof = state.dof;
                    *state = MotionState {
                        dof,
                        ..MotionState::default()
                    };
                }
            }
            EventType::StationChanged => cache.clear(),
            _ => {}
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.link.session)
            .finish_non_exhaustive()
    }
}

/// Re-enables rendering if a `without_render` batch is dropped midway.
struct RenderGuard {
    client: Option<Client>,
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.set_render(true).await {
                        warn!("Failed to re-enable rendering: {e}");
                    }
                });
            }
            Err(_) => warn!("Rendering left disabled: no runtime to restore it"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;

    fn client() -> Client {
        Client::new(SessionConfig::at("127.0.0.1", 1))
    }

    fn event(event_type: EventType, handle: u64) -> Event {
        Event {
            event_type,
            item: RawItem::new(handle, ItemType::Robot),
            payload: crate::events::EventPayload::None,
        }
    }

    #[test]
    fn test_run_mode_codes() {
        for mode in [RunMode::Simulate, RunMode::MakeRobotProg, RunMode::RunRobot] {
            assert_eq!(RunMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(RunMode::from_code(0), None);
    }

    #[test]
    fn test_observe_invalidates_motion_cache() {
        let client = client();
        let robot = client.item_from_raw(RawItem::new(5, ItemType::Robot));
        client.link.motion().insert(
            5,
            MotionState {
                dof: Some(6),
                tool: Some(Pose::transl(0.0, 0.0, 100.0)),
                frame: Some(Pose::eye()),
                rounding: Some(5.0),
                ..MotionState::default()
            },
        );

        client.observe(&event(EventType::ToolModified, 9));
        let state = client.motion_state(&robot);
        assert!(state.tool.is_none());
        assert!(state.frame.is_some());

        client.observe(&event(EventType::ItemChanged, 5));
        let state = client.motion_state(&robot);
        assert_eq!(state.dof, Some(6));
        assert!(state.rounding.is_none());

        client.observe(&event(EventType::StationChanged, 0));
        assert_eq!(client.motion_state(&robot), MotionState::default());
    }

    #[test]
    fn test_unrelated_events_keep_cache() {
        let client = client();
        let robot = client.item_from_raw(RawItem::new(5, ItemType::Robot));
        client.link.motion().insert(
            5,
            MotionState {
                rounding: Some(1.0),
                ..MotionState::default()
            },
        );
        client.observe(&event(EventType::Key, 0));
        client.observe(&event(EventType::ItemChanged, 6));
        assert_eq!(client.motion_state(&robot).rounding, Some(1.0));
    }

    #[tokio::test]
    async fn test_geometry_shape_checked_before_connecting() {
        let client = client();
        let flat = Mat::zeros(4, 2);
        let err = client
            .add_points(&flat, None, false, Projection::None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Input(_)));

        let err = client.add_shape(&Mat::zeros(4, 3), None, false).await.unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[tokio::test]
    async fn test_simulation_speed_must_be_positive() {
        let err = client().set_simulation_speed(0.0).await.unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}
