//! # Protocol Semantics
//!
//! Turns decoded Photon messages into world updates and loot events.
//!
//! ## Components
//! - **Codes**: injected numeric event/operation code table
//! - **Dispatcher**: `EventRouter`, message to semantic route via parameters 252/253
//! - **Handlers**: `LootCorrelator`, the per-route world updates and both
//!   loot evidence paths

pub mod codes;
pub mod dispatcher;
pub mod handlers;

pub use codes::EventCodes;
pub use dispatcher::{EventRouter, Route};
pub use handlers::{HandlerResult, LootCorrelator};
