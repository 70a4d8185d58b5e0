//! Asynchronous host events.
//!
//! An [`EventChannel`] is its own TCP connection. After the normal connect
//! handshake it sends a subscription command and from then on only reads:
//! every frame is `int32 event_type`, an item, and a payload whose shape
//! depends on the event type (see [`EventPayload`]). The channel never times
//! out; it ends when the host closes the socket.
//!
//! ```no_run
//! # async fn run(client: simhost::Client) -> simhost::Result<()> {
//! use simhost::events::EventType;
//!
//! let events = client
//!     .open_events(Some(&[EventType::ProgSliderChanged, EventType::ProgSliderSet]))
//!     .await?;
//! events
//!     .listen(|event| {
//!         println!("{event}");
//!         Ok::<_, std::convert::Infallible>(())
//!     })
//!     .await
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use simhost_math::Pose;
use simhost_rpc::protocol::{EVT_SUBSCRIBE_ALL, EVT_SUBSCRIBE_FILTERED, STATUS_OK};
use simhost_rpc::wire::{DecodeResult, decode_buffered};
use simhost_rpc::{CodecError, Decode, Encode, Error, RawItem, Result, SessionConfig};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, info, trace, warn};

/// Event ids the host sends. The numbering is fixed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    SelectionTreeChanged,
    /// Superseded by [`EventType::ItemMovedPose`].
    ItemMoved,
    ReferencePicked,
    ReferenceReleased,
    ToolModified,
    CreatedIsocube,
    Selection3dChanged,
    ViewMoved,
    RobotMoved,
    Key,
    ItemMovedPose,
    CollisionMapReset,
    CollisionMapTooLarge,
    CalibMeasurement,
    Selection3dClick,
    ItemChanged,
    ItemRenamed,
    ItemVisibility,
    StationChanged,
    ProgSliderChanged,
    ProgSliderSet,
    Unknown(i32),
}

impl EventType {
    /// Every known event type, in id order.
    pub const ALL: [Self; 21] = [
        Self::SelectionTreeChanged,
        Self::ItemMoved,
        Self::ReferencePicked,
        Self::ReferenceReleased,
        Self::ToolModified,
        Self::CreatedIsocube,
        Self::Selection3dChanged,
        Self::ViewMoved,
        Self::RobotMoved,
        Self::Key,
        Self::ItemMovedPose,
        Self::CollisionMapReset,
        Self::CollisionMapTooLarge,
        Self::CalibMeasurement,
        Self::Selection3dClick,
        Self::ItemChanged,
        Self::ItemRenamed,
        Self::ItemVisibility,
        Self::StationChanged,
        Self::ProgSliderChanged,
        Self::ProgSliderSet,
    ];

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Unknown(code) => code,
            known => Self::ALL
                .iter()
                .position(|t| *t == known)
                .and_then(|i| i32::try_from(i + 1).ok())
                .unwrap_or(0),
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Self {
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(Self::Unknown(code))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown({code})"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// Geometry under the cursor for 3-D selection events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection3d {
    /// Pose of the selected item.
    pub pose: Pose,
    /// Picked point, relative to the item.
    pub xyz: [f64; 3],
    /// Surface normal at the point.
    pub ijk: [f64; 3],
    pub feature_type: i32,
    pub feature_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub pressed: bool,
    pub key: i32,
    pub modifiers: i32,
}

/// Event-specific data following the item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EventPayload {
    #[default]
    None,
    Selection3d(Selection3d),
    Key(KeyEvent),
    /// New absolute pose. `extra` holds values beyond the 16 of the pose.
    MovedPose { pose: Pose, extra: Vec<f64> },
    /// Status code, measurement id and any further values.
    Calibration { values: Vec<f64> },
    Visibility { object: bool, frame: bool },
    /// Index of the slider position.
    Slider { index: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: EventType,
    /// Item the event is about; the zero handle when there is none.
    pub item: RawItem,
    pub payload: EventPayload,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} item={:#x}", self.event_type, self.item.handle)?;
        match &self.payload {
            EventPayload::None => Ok(()),
            EventPayload::Key(key) => write!(
                f,
                " key={} {} mods={:#x}",
                key.key,
                if key.pressed { "down" } else { "up" },
                key.modifiers
            ),
            EventPayload::Slider { index } => write!(f, " slider={index}"),
            EventPayload::Visibility { object, frame } => {
                write!(f, " visible={object} frame={frame}")
            }
            EventPayload::MovedPose { pose, .. } => {
                let [x, y, z] = pose.pos();
                write!(f, " pos=({x:.3}, {y:.3}, {z:.3})")
            }
            EventPayload::Selection3d(sel) => {
                let [x, y, z] = sel.xyz;
                write!(f, " point=({x:.3}, {y:.3}, {z:.3})")
            }
            EventPayload::Calibration { values } => write!(f, " values={values:?}"),
        }
    }
}

/// Decode a field at `*at`, reporting incomplete input relative to the frame
/// start.
fn field<T: Decode>(src: &[u8], at: &mut usize) -> std::result::Result<T, CodecError> {
    match T::decode(&src[*at..]) {
        Ok((value, used)) => {
            *at += used;
            Ok(value)
        }
        Err(CodecError::Incomplete { needed }) => Err(CodecError::Incomplete {
            needed: *at + needed,
        }),
        Err(e) => Err(e),
    }
}

fn flag(src: &[u8], at: &mut usize) -> std::result::Result<bool, CodecError> {
    Ok(field::<i32>(src, at)? != 0)
}

#[allow(clippy::cast_possible_truncation)]
fn decode_selection(src: &[u8], at: &mut usize) -> std::result::Result<Selection3d, CodecError> {
    let pose: Pose = field(src, at)?;
    let mut rest = [0.0; 8];
    for v in &mut rest {
        *v = field(src, at)?;
    }
    Ok(Selection3d {
        pose,
        xyz: [rest[0], rest[1], rest[2]],
        ijk: [rest[3], rest[4], rest[5]],
        feature_type: rest[6] as i32,
        feature_id: rest[7] as i32,
    })
}

impl Decode for Event {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        let mut at = 0;
        let code: i32 = field(src, &mut at)?;
        let item: RawItem = field(src, &mut at)?;
        let event_type = EventType::from_code(code);

        let payload = match event_type {
            EventType::Selection3dChanged | EventType::Selection3dClick => {
                EventPayload::Selection3d(decode_selection(src, &mut at)?)
            }
            EventType::Key => EventPayload::Key(KeyEvent {
                pressed: flag(src, &mut at)?,
                key: field(src, &mut at)?,
                modifiers: field(src, &mut at)?,
            }),
            EventType::ItemMovedPose => {
                let n: i32 = field(src, &mut at)?;
                let n = usize::try_from(n).map_err(|_| CodecError::NegativeLength(n))?;
                if n > simhost_rpc::wire::MAX_FIELD_SIZE / 8 {
                    return Err(CodecError::TooLarge(n * 8));
                }
                if n < 16 {
                    // Too short for a pose: consume it and leave no payload.
                    for _ in 0..n {
                        field::<f64>(src, &mut at)?;
                    }
                    return Ok((
                        Event {
                            event_type,
                            item,
                            payload: EventPayload::None,
                        },
                        at,
                    ));
                }
                let pose: Pose = field(src, &mut at)?;
                let mut extra = Vec::with_capacity((n - 16).min(64));
                for _ in 16..n {
                    extra.push(field::<f64>(src, &mut at)?);
                }
                EventPayload::MovedPose { pose, extra }
            }
            EventType::CalibMeasurement => EventPayload::Calibration {
                values: field(src, &mut at)?,
            },
            EventType::ItemVisibility => EventPayload::Visibility {
                object: flag(src, &mut at)?,
                frame: flag(src, &mut at)?,
            },
            EventType::ProgSliderChanged | EventType::ProgSliderSet => EventPayload::Slider {
                index: field(src, &mut at)?,
            },
            _ => EventPayload::None,
        };

        Ok((
            Event {
                event_type,
                item,
                payload,
            },
            at,
        ))
    }
}

impl Encode for Event {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        self.event_type.code().encode(dst)?;
        self.item.encode(dst)?;
        match &self.payload {
            EventPayload::None => {}
            EventPayload::Selection3d(sel) => {
                sel.pose.encode(dst)?;
                for v in sel.xyz.iter().chain(&sel.ijk) {
                    v.encode(dst)?;
                }
                f64::from(sel.feature_type).encode(dst)?;
                f64::from(sel.feature_id).encode(dst)?;
            }
            EventPayload::Key(key) => {
                i32::from(key.pressed).encode(dst)?;
                key.key.encode(dst)?;
                key.modifiers.encode(dst)?;
            }
            EventPayload::MovedPose { pose, extra } => {
                let n = i32::try_from(16 + extra.len())
                    .map_err(|_| CodecError::TooLarge(extra.len()))?;
                n.encode(dst)?;
                pose.encode(dst)?;
                for v in extra {
                    v.encode(dst)?;
                }
            }
            EventPayload::Calibration { values } => values.encode(dst)?,
            EventPayload::Visibility { object, frame } => {
                i32::from(*object).encode(dst)?;
                i32::from(*frame).encode(dst)?;
            }
            EventPayload::Slider { index } => index.encode(dst)?,
        }
        Ok(())
    }
}

/// Frames a byte stream into [`Event`]s, dropping types outside `filter`.
#[derive(Debug, Default, Clone)]
pub struct EventCodec {
    filter: Option<HashSet<EventType>>,
}

impl EventCodec {
    #[must_use]
    pub fn new(filter: Option<&[EventType]>) -> Self {
        Self {
            filter: filter.map(|types| types.iter().copied().collect()),
        }
    }

    #[must_use]
    pub fn accepts(&self, event_type: EventType) -> bool {
        self.filter.as_ref().is_none_or(|f| f.contains(&event_type))
    }
}

impl Decoder for EventCodec {
    type Item = Event;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Event>, CodecError> {
        while let Some(event) = decode_buffered::<Event>(src)? {
            if let EventType::Unknown(code) = event.event_type {
                warn!("Received unknown event type {code}");
            }
            if event.event_type == EventType::ItemMovedPose
                && event.payload == EventPayload::None
            {
                warn!(
                    "Skipping moved pose event for {:#x} without a full pose",
                    event.item.handle
                );
                continue;
            }
            if self.accepts(event.event_type) {
                return Ok(Some(event));
            }
            trace!("Dropping filtered event {}", event.event_type);
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Event>, CodecError> {
        match self.decode(src)? {
            Some(event) => Ok(Some(event)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::UnexpectedEof),
        }
    }
}

/// `int32 n` followed by `n` int32 event ids.
struct EventIds(Vec<i32>);

impl Encode for EventIds {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        let n = i32::try_from(self.0.len()).map_err(|_| CodecError::TooLarge(self.0.len()))?;
        n.encode(dst)?;
        for id in &self.0 {
            id.encode(dst)?;
        }
        Ok(())
    }
}

/// A connection in events mode.
pub struct EventChannel {
    frames: FramedRead<OwnedReadHalf, EventCodec>,
    // Held so the host does not see a half-closed socket.
    _writer: OwnedWriteHalf,
    peer: String,
}

impl EventChannel {
    /// Connect to the host in `config` and subscribe. `None` subscribes to
    /// every event type.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host is unreachable or does not
    /// acknowledge the subscription.
    pub async fn subscribe(config: &SessionConfig, filter: Option<&[EventType]>) -> Result<Self> {
        let (mut conn, _version) = config.open_connection().await?;
        let peer = conn.peer().to_string();

        let command = match filter {
            Some(types) => {
                conn.send(EVT_SUBSCRIBE_FILTERED)?;
                conn.send(&EventIds(types.iter().map(|t| t.code()).collect()))?;
                EVT_SUBSCRIBE_FILTERED
            }
            None => {
                conn.send(EVT_SUBSCRIBE_ALL)?;
                EVT_SUBSCRIBE_ALL
            }
        };

        let ack: String = conn.recv().await?;
        if ack != command {
            return Err(Error::connection(format!(
                "{peer} did not acknowledge {command}: {ack:?}"
            )));
        }
        let version: i32 = conn.recv().await?;
        let status: i32 = conn.recv().await?;
        if status != STATUS_OK {
            let message: String = conn.recv().await?;
            return Err(Error::connection(format!(
                "event subscription refused ({status}): {message}"
            )));
        }
        info!("Subscribed to events on {peer} (version {version})");

        conn.set_timeout(None);
        let (reader, writer, leftover) = conn.into_parts();
        let mut frames = FramedRead::new(reader, EventCodec::new(filter));
        frames.read_buffer_mut().extend_from_slice(&leftover);

        Ok(Self {
            frames,
            _writer: writer,
            peer,
        })
    }

    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Next event, or `None` once the host has closed the channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for a malformed frame or a stream cut off
    /// mid-frame.
    pub async fn next_event(&mut self) -> Result<Option<Event>> {
        self.frames.next().await.transpose().map_err(Error::from)
    }

    /// Feed every event to `handler` until the host closes the channel.
    /// Handler errors are logged and the loop goes on.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the stream becomes unreadable.
    pub async fn listen<F, E>(mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(Event) -> std::result::Result<(), E>,
        E: fmt::Display,
    {
        while let Some(event) = self.next_event().await? {
            let event_type = event.event_type;
            if let Err(e) = handler(event) {
                warn!("Event handler failed on {event_type}: {e}");
            }
        }
        debug!("Event channel to {} closed", self.peer);
        Ok(())
    }

    /// Move the channel onto a background task and receive its events
    /// through a bounded queue. The queue ends after the host closes the
    /// channel or after the first error.
    #[must_use]
    pub fn subscribe_channel(mut self, capacity: usize) -> mpsc::Receiver<Result<Event>> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(async move {
            loop {
                match self.next_event().await {
                    Ok(Some(event)) => {
                        if tx.send(Ok(event)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
            debug!("Event reader for {} stopped", self.peer);
        });
        rx
    }
}

impl Stream for EventChannel {
    type Item = Result<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames)
            .poll_next(cx)
            .map(|next| next.map(|r| r.map_err(Error::from)))
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}
