//! # Error Types
//!
//! Error handling for the Photon decoder and the loot correlation engine.
//!
//! Two families live here:
//! - [`ProtocolError`]: decode failures (bounds, unknown tags, malformed fragments)
//!   and session lifecycle misuse. Decode errors abort the current command or
//!   message only; the packet loop catches them and moves on.
//! - [`Miss`]: a correlation handler deliberately declined to act. Partial
//!   information is normal in live capture (the join response may race early
//!   inventory moves), so a miss is logged and never propagated.
//!
//! ## Example Usage
//! ```rust
//! use photon_loot::core::cursor::ByteCursor;
//! use photon_loot::error::ProtocolError;
//!
//! let mut cursor = ByteCursor::new(&[0x01]);
//! match cursor.read_u16() {
//!     Err(ProtocolError::OutOfBounds { size, .. }) => assert_eq!(size, 2),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants for lifecycle and lock failures.
pub mod constants {
    pub const ERR_LOCK_POISONED: &str = "Session state lock poisoned";
    pub const ERR_ALREADY_RUNNING: &str = "Capture session already running";
    pub const ERR_NOT_RUNNING: &str = "Capture session not running";
    pub const ERR_THREAD_SPAWN: &str = "Failed to spawn session thread";
}

// ProtocolError is the primary error type for decode and lifecycle operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Out of bounds read: position={position}, size={size}, length={length}")]
    OutOfBounds {
        position: usize,
        size: usize,
        length: usize,
    },

    #[error("Unknown type tag 0x{tag:02X} at position {position}")]
    UnknownTypeTag { tag: u8, position: usize },

    #[error("Invalid boolean byte {value} at position {position}")]
    InvalidBoolean { value: u8, position: usize },

    #[error("Value nesting exceeds maximum depth {depth}")]
    NestingTooDeep { depth: usize },

    #[error("Encrypted payloads are not supported")]
    UnsupportedEncryption,

    #[error("Negative length field: {0}")]
    NegativeLength(i32),

    #[error("Fragment write out of range: offset={offset}, len={len}, total={total}")]
    FragmentOutOfRange { offset: i64, len: usize, total: usize },

    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),

    #[error("Capture session already running")]
    SessionAlreadyRunning,

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Packet source closed")]
    SourceClosed,

    #[error("Loot observer failed: {0}")]
    Observer(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Reason a correlation handler left the world untouched or emitted nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    #[error("Parameter {0} missing")]
    MissingParameter(u8),

    #[error("Parameter {id} is not {expected}")]
    TypeMismatch { id: u8, expected: &'static str },

    #[error("Silver transfer ignored")]
    SilverTransfer,

    #[error("Crafted item signature on simple item")]
    CraftedItem,

    #[error("Move within the same container")]
    SameContainer,

    #[error("Source container not tracked")]
    ContainerNotFound,

    #[error("Chest withdrawal is not loot")]
    ChestWithdrawal,

    #[error("No tracked item in slot {0}")]
    SlotEmpty(u32),

    #[error("Item owner could not be resolved")]
    OwnerUnresolved,

    #[error("Local player not identified yet")]
    SelfUnknown,

    #[error("Item {0} not present in catalog")]
    CatalogMiss(i64),

    #[error("Join failed with return code {0}")]
    JoinFailed(u16),
}
