//! Remote item proxy.
//!
//! An [`Item`] is a handle, the type tag the host reported with it, and a
//! non-owning pointer back to the client that minted it. It holds no other
//! state; every accessor is an RPC.
//!
//! Operations are grouped by family:
//!
//! - [`tree`]: names, parents, children, creation and deletion
//! - [`pose`]: poses, joints and kinematics
//! - [`motion`]: moves, motion tests and speed settings
//! - [`program`]: program instructions, execution and joint lists
//! - [`params`]: item parameters and commands
//! - [`simulation`]: per-item collision and visibility state

pub mod motion;
pub mod params;
pub mod pose;
pub mod program;
pub mod simulation;
pub mod tree;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use bytes::BytesMut;
use simhost_rpc::wire::DecodeResult;
use simhost_rpc::{CodecError, Decode, Encode, Error, ItemType, RawItem, Result, Session};

use crate::client::{Client, Link};

pub use motion::{Projection, Speed, Target};
pub use params::{PROG_SLIDER, RunType};
pub use pose::{JointLimits, JointsConfig};
pub use program::{Instruction, InstructionInfo, MoveKind, ProgramUpdate, UpdateOptions};

#[derive(Clone)]
pub struct Item {
    raw: RawItem,
    link: Weak<Link>,
}

impl Item {
    pub(crate) fn new(raw: RawItem, link: &Arc<Link>) -> Self {
        Self {
            raw,
            link: Arc::downgrade(link),
        }
    }

    /// An item that refers to nothing. Every RPC on it fails with
    /// `Error::Item`.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            raw: RawItem::NONE,
            link: Weak::new(),
        }
    }

    #[must_use]
    pub fn raw(&self) -> RawItem {
        self.raw
    }

    #[must_use]
    pub fn handle(&self) -> u64 {
        self.raw.handle
    }

    /// Type tag received with the handle. [`Item::query_type`] asks the host.
    #[must_use]
    pub fn item_type(&self) -> ItemType {
        self.raw.item_type()
    }

    /// False for the zero handle. A non-zero handle may still be stale; see
    /// [`Item::exists`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.raw.is_valid()
    }

    /// The same host object, called through `client`'s session.
    #[must_use]
    pub fn on(&self, client: &Client) -> Self {
        Self::new(self.raw, client.link())
    }

    /// Client that minted this item.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if that client has been dropped.
    pub fn client(&self) -> Result<Client> {
        self.link().map(Client::from_link)
    }

    pub(crate) fn link(&self) -> Result<Arc<Link>> {
        self.link
            .upgrade()
            .ok_or_else(|| Error::connection("the client that created this item is gone"))
    }

    /// Refuses the zero handle before anything reaches the wire.
    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Item("operation on an invalid item".into()))
        }
    }

    /// Session for an RPC on this item.
    pub(crate) fn session(&self) -> Result<Session> {
        self.ensure_valid()?;
        Ok(self.link()?.session.clone())
    }

    /// Client for a station-level call made on behalf of this item.
    pub(crate) fn owner(&self) -> Result<Client> {
        self.ensure_valid()?;
        self.client()
    }

    /// Wrap a handle returned by the host, sharing this item's client.
    pub(crate) fn sibling(&self, raw: RawItem) -> Self {
        Self {
            raw,
            link: self.link.clone(),
        }
    }

    /// `command(item) -> T`.
    pub(crate) async fn call<T: Decode>(&self, command: &str) -> Result<T> {
        let session = self.session()?;
        let mut rpc = session.rpc(command).await?;
        rpc.send(&self.raw)?;
        rpc.reply().await
    }

    /// `command(item, arg) -> ()`.
    pub(crate) async fn call_with<A: Encode + ?Sized>(&self, command: &str, arg: &A) -> Result<()> {
        let session = self.session()?;
        let mut rpc = session.rpc(command).await?;
        rpc.send(&self.raw)?;
        rpc.send(arg)?;
        rpc.finish().await
    }

    /// True while the host still knows this handle.
    ///
    /// # Errors
    ///
    /// Transport errors only; a stale handle returns `Ok(false)`.
    pub async fn exists(&self) -> Result<bool> {
        if !self.is_valid() {
            return Ok(false);
        }
        let found: i32 = self.call("Exists").await?;
        Ok(found != 0)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.raw.handle == other.raw.handle
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.handle.hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("handle", &format_args!("{:#x}", self.raw.handle))
            .field("type", &self.item_type())
            .finish()
    }
}

impl Encode for Item {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        self.raw.encode(dst)
    }
}

/// Optional item argument; `None` goes out as the zero handle.
pub(crate) fn raw_or_none(item: Option<&Item>) -> RawItem {
    item.map_or(RawItem::NONE, Item::raw)
}

/// `int32 n` followed by `n` items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ItemList(pub Vec<RawItem>);

impl Encode for ItemList {
    fn encode(&self, dst: &mut BytesMut) -> std::result::Result<(), CodecError> {
        let n = i32::try_from(self.0.len()).map_err(|_| CodecError::TooLarge(self.0.len()))?;
        n.encode(dst)?;
        for raw in &self.0 {
            raw.encode(dst)?;
        }
        Ok(())
    }
}

impl Decode for ItemList {
    fn decode(src: &[u8]) -> DecodeResult<Self> {
        let (n, mut at) = i32::decode(src)?;
        let n = usize::try_from(n).map_err(|_| CodecError::NegativeLength(n))?;
        // 12 bytes per item; reject counts the buffer cannot plausibly hold.
        if n > simhost_rpc::wire::MAX_FIELD_SIZE / 12 {
            return Err(CodecError::TooLarge(n));
        }
        let mut items = Vec::with_capacity(n.min(1024));
        for _ in 0..n {
            let (raw, used) = RawItem::decode(&src[at..])?;
            items.push(raw);
            at += used;
        }
        Ok((Self(items), at))
    }
}
