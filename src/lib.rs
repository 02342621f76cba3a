//! # photon-loot
//!
//! Decoder for the Photon UDP protocol and a correlation engine that turns
//! decoded game traffic into resolved loot-transfer events.
//!
//! ## Layers
//! - [`core`]: byte cursor, Protocol16 values, messages, frames, fragments
//! - [`protocol`]: event-code routing and the loot correlation handlers
//! - [`world`]: players, containers, loot items and loot events
//! - [`catalog`]: item catalog and rare-tier policy
//! - [`service`]: pipeline, capture session lifecycle, observers, export
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use photon_loot::catalog::InMemoryItemCatalog;
//! use photon_loot::config::SessionConfig;
//! use photon_loot::protocol::EventCodes;
//! use photon_loot::service::LootPipeline;
//!
//! let mut pipeline = LootPipeline::new(
//!     &SessionConfig::default(),
//!     EventCodes::default(),
//!     Arc::new(InMemoryItemCatalog::new()),
//! );
//! // too short for a Photon header: ignored
//! assert!(pipeline.process_packet(&[0x00, 0x01]).is_empty());
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;
pub mod world;

pub use crate::core::cursor::ByteCursor;
pub use crate::core::frame::FrameDecoder;
pub use crate::core::message::{DecodedMessage, MessageCodec, ParameterTable};
pub use crate::core::value::{read_value, ProtocolValue, TypeTag};
pub use config::SessionConfig;
pub use error::{Miss, ProtocolError, Result};
pub use protocol::{EventCodes, EventRouter, LootCorrelator, Route};
pub use service::{CaptureSession, LinkStatus, LootPipeline, PacketSource};
pub use world::{LootEvent, Player, WorldState};
