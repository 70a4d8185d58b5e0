//! Protocol constants and the item handle.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 20500;

/// Protocol revision this client speaks. The host reports its own during the
/// handshake; a difference is logged, not fatal.
pub const PROTOCOL_VERSION: i32 = 1;

/// Handshake greeting sent by the client.
pub const CMD_START: &str = "CMD_START";
/// Handshake reply expected from the host.
pub const READY: &str = "READY";

/// Put a fresh connection in events mode, all event types.
pub const EVT_SUBSCRIBE_ALL: &str = "RDK_EVT";
/// Put a fresh connection in events mode, followed by an array of type ids.
pub const EVT_SUBSCRIBE_FILTERED: &str = "RDK_EVT_FILTER";

pub const STATUS_OK: i32 = 0;
pub const STATUS_INVALID_ITEM: i32 = 1;
pub const STATUS_WARNING: i32 = 2;
pub const STATUS_INVALID_INPUT: i32 = 3;
pub const STATUS_NOT_LICENSED: i32 = 9;
pub const STATUS_TARGET_UNREACHABLE: i32 = 10;
pub const STATUS_STOPPED: i32 = 11;

/// Host-assigned object category carried next to every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Wildcard used by lookups; never returned by the host.
    Any,
    Station,
    Robot,
    Frame,
    Tool,
    Object,
    Target,
    Curve,
    Program,
    Instruction,
    ProgramScript,
    Machining,
    Folder,
    RobotArm,
    Camera,
    Generic,
    RobotAxes,
    Notes,
    Other(i32),
}

impl ItemType {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Any => -1,
            Self::Station => 1,
            Self::Robot => 2,
            Self::Frame => 3,
            Self::Tool => 4,
            Self::Object => 5,
            Self::Target => 6,
            Self::Curve => 7,
            Self::Program => 8,
            Self::Instruction => 9,
            Self::ProgramScript => 10,
            Self::Machining => 11,
            Self::Folder => 17,
            Self::RobotArm => 18,
            Self::Camera => 19,
            Self::Generic => 20,
            Self::RobotAxes => 21,
            Self::Notes => 22,
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Any,
            1 => Self::Station,
            2 => Self::Robot,
            3 => Self::Frame,
            4 => Self::Tool,
            5 => Self::Object,
            6 => Self::Target,
            7 => Self::Curve,
            8 => Self::Program,
            9 => Self::Instruction,
            10 => Self::ProgramScript,
            11 => Self::Machining,
            17 => Self::Folder,
            18 => Self::RobotArm,
            19 => Self::Camera,
            20 => Self::Generic,
            21 => Self::RobotAxes,
            22 => Self::Notes,
            other => Self::Other(other),
        }
    }

    /// Mechanisms that accept joint and motion commands.
    #[must_use]
    pub fn is_mechanism(self) -> bool {
        matches!(self, Self::Robot | Self::RobotArm | Self::RobotAxes)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "type {code}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Handle plus type tag as it travels on the wire. Handle `0` is "no item".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawItem {
    pub handle: u64,
    pub type_tag: i32,
}

impl RawItem {
    pub const NONE: Self = Self {
        handle: 0,
        type_tag: 0,
    };

    #[must_use]
    pub fn new(handle: u64, item_type: ItemType) -> Self {
        Self {
            handle,
            type_tag: item_type.code(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle != 0
    }

    #[must_use]
    pub fn item_type(&self) -> ItemType {
        ItemType::from_code(self.type_tag)
    }
}
