//! # Capture Service
//!
//! Runtime around the decoder and correlator.
//!
//! ## Components
//! - **Pipeline**: synchronous packet -> loot event path
//! - **Session**: start/stop lifecycle, capture and liveness threads
//! - **Sink**: observer fan-out and bounded channel delivery
//! - **Export**: CSV loot log and JSON export

pub mod export;
pub mod pipeline;
pub mod session;
pub mod sink;

pub use pipeline::LootPipeline;
pub use session::{CaptureSession, LinkStatus, PacketSource};
pub use sink::{ChannelObserver, LootObserver, LootSink, SubscriptionId};
