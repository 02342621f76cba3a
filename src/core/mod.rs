//! # Core Protocol Components
//!
//! Low-level Photon decoding: byte cursor, Protocol16 values, messages,
//! frames and fragment reassembly.
//!
//! ## Components
//! - **Cursor**: bounds-checked big-endian reader
//! - **Value**: recursive Protocol16 value codec
//! - **Message**: operation request/response and event parameter tables
//! - **Frame**: outer header, command list and envelope unwrap
//! - **Fragment**: reassembly of `SendReliableFragment` commands
//!
//! ## Wire Format
//! ```text
//! [PeerId(2)] [Flags(1)] [CommandCount(1)] [Timestamp(4)] [Challenge(4)] [Command...]
//! ```
//!
//! ## Safety
//! - Every read is bounds-checked; failures abort one command or message only
//! - Fragment writes are checked against the declared total length
//! - Collection capacities are clamped by the bytes remaining
//! - Value nesting depth is bounded

pub mod cursor;
pub mod fragment;
pub mod frame;
pub mod message;
pub mod value;
