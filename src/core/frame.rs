//! # Photon Frames
//!
//! Outer packet framing: header, command list, reliable envelopes and
//! fragment routing.
//!
//! ## Wire Format
//! ```text
//! Header   = [PeerId(u16)] [Flags(1)] [CommandCount(1)] [Timestamp(u32)] [Challenge(i32)]
//! Command  = [Type(1)] [Channel(1)] [Flags(1)] [Reserved(1)] [Length(i32)] [Sequence(i32)] [Payload]
//! Envelope = [Marker(0xF3|0xFD)] [MessageType(1)] [Message]
//! ```
//! `Length` counts the 12-byte command header. `SendUnreliable` carries 4 extra
//! bytes ahead of its payload.
//!
//! Decode errors are contained to the command or message that raised them;
//! the remaining commands of the packet are still processed.

use tracing::{debug, trace};

use crate::core::cursor::ByteCursor;
use crate::core::fragment::{FragmentBuffer, FragmentLimits, FRAGMENT_HEADER_LENGTH};
use crate::core::message::{DecodedMessage, MessageCodec};
use crate::core::value::ValueReader;
use crate::error::{ProtocolError, Result};
use crate::utils::metrics::Metrics;

/// Outer packet header length.
pub const PHOTON_HEADER_LENGTH: usize = 12;

/// Command header length, included in each command's declared length.
pub const COMMAND_HEADER_LENGTH: usize = 12;

/// Extra bytes in front of an unreliable payload.
pub const UNRELIABLE_EXTRA_LENGTH: usize = 4;

/// Header flag value for encrypted packets.
pub const FLAG_ENCRYPTED: u8 = 0x01;

/// Header flag value for checksum-protected packets.
pub const FLAG_CRC: u8 = 0xCC;

/// Envelope markers accepted for reliable messages.
pub const ENVELOPE_MARKERS: [u8; 2] = [0xF3, 0xFD];

/// Message type values above this are encrypted.
pub const ENCRYPTED_MESSAGE_THRESHOLD: u8 = 128;

/// Command types inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Acknowledge,
    Connect,
    VerifyConnect,
    Disconnect,
    Ping,
    SendReliable,
    SendUnreliable,
    SendReliableFragment,
    Other(u8),
}

impl From<u8> for CommandType {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => CommandType::Acknowledge,
            0x02 => CommandType::Connect,
            0x03 => CommandType::VerifyConnect,
            0x04 => CommandType::Disconnect,
            0x05 => CommandType::Ping,
            0x06 => CommandType::SendReliable,
            0x07 => CommandType::SendUnreliable,
            0x08 => CommandType::SendReliableFragment,
            other => CommandType::Other(other),
        }
    }
}

/// Message type carried by a reliable envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    OperationRequest,
    OperationResponse,
    Event,
    InternalOperationRequest,
    InternalOperationResponse,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x02 => Some(MessageType::OperationRequest),
            0x03 => Some(MessageType::OperationResponse),
            0x04 => Some(MessageType::Event),
            0x06 => Some(MessageType::InternalOperationRequest),
            0x07 => Some(MessageType::InternalOperationResponse),
            _ => None,
        }
    }
}

/// Parsed outer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub peer_id: u16,
    pub flags: u8,
    pub command_count: u8,
    pub timestamp: u32,
    pub challenge: i32,
}

impl FrameHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            peer_id: cursor.read_u16()?,
            flags: cursor.read_u8()?,
            command_count: cursor.read_u8()?,
            timestamp: cursor.read_u32()?,
            challenge: cursor.read_i32()?,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags == FLAG_ENCRYPTED
    }

    pub fn is_crc_protected(&self) -> bool {
        self.flags == FLAG_CRC
    }
}

/// Parsed command header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_type: CommandType,
    pub channel: u8,
    pub flags: u8,
    pub reserved: u8,
    pub length: i32,
    pub sequence: i32,
}

impl CommandHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            command_type: CommandType::from(cursor.read_u8()?),
            channel: cursor.read_u8()?,
            flags: cursor.read_u8()?,
            reserved: cursor.read_u8()?,
            length: cursor.read_i32()?,
            sequence: cursor.read_i32()?,
        })
    }

    /// Declared payload length after the command header.
    pub fn payload_length(&self) -> Result<usize> {
        self.length
            .checked_sub(COMMAND_HEADER_LENGTH as i32)
            .and_then(|length| usize::try_from(length).ok())
            .ok_or(ProtocolError::NegativeLength(self.length))
    }
}

/// Stateful frame decoder; owns fragment reassembly state.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    codec: MessageCodec,
    fragments: FragmentBuffer,
    metrics: Option<std::sync::Arc<Metrics>>,
}

impl FrameDecoder {
    pub fn new(limits: FragmentLimits, max_value_depth: usize) -> Self {
        Self {
            codec: MessageCodec::new(ValueReader::new(max_value_depth)),
            fragments: FragmentBuffer::new(limits),
            metrics: None,
        }
    }

    /// Attach a counter set updated while decoding.
    pub fn with_metrics(mut self, metrics: std::sync::Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn pending_fragments(&self) -> &FragmentBuffer {
        &self.fragments
    }

    /// Drop all partially reassembled messages.
    pub fn reset(&mut self) {
        self.fragments.clear();
    }

    /// Decode one raw UDP payload into the messages it completes.
    pub fn handle_packet(&mut self, data: &[u8]) -> Vec<DecodedMessage> {
        let mut messages = Vec::new();
        self.record(|m| m.packet_received(data.len() as u64));

        if data.len() < PHOTON_HEADER_LENGTH {
            trace!(len = data.len(), "Packet shorter than header");
            return messages;
        }

        let mut cursor = ByteCursor::new(data);
        let header = match FrameHeader::read(&mut cursor) {
            Ok(header) => header,
            Err(e) => {
                debug!(error = %e, "Failed to read frame header");
                return messages;
            }
        };

        if header.is_encrypted() {
            trace!(peer_id = header.peer_id, "Encrypted packet skipped");
            self.record(Metrics::encrypted_discarded);
            return messages;
        }
        // checksum validation is not implemented; such packets are dropped
        if header.is_crc_protected() {
            trace!(peer_id = header.peer_id, "CRC packet skipped");
            self.record(Metrics::crc_discarded);
            return messages;
        }

        for _ in 0..header.command_count {
            if cursor.is_exhausted() {
                break;
            }
            match self.handle_command(&mut cursor, &mut messages) {
                Ok(CommandFlow::Continue) => {}
                Ok(CommandFlow::Stop) => break,
                Err(e) => {
                    // the command boundary is unknown after a header or payload read fails
                    debug!(error = %e, "Command framing error, dropping rest of packet");
                    self.record(Metrics::decode_error);
                    break;
                }
            }
        }

        messages
    }

    fn handle_command(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        messages: &mut Vec<DecodedMessage>,
    ) -> Result<CommandFlow> {
        let command = CommandHeader::read(cursor)?;
        let mut payload_length = command.payload_length()?;
        self.record(Metrics::command_processed);

        match command.command_type {
            CommandType::Disconnect => {
                trace!("Disconnect command, aborting packet");
                return Ok(CommandFlow::Stop);
            }
            CommandType::SendUnreliable => {
                cursor.skip(UNRELIABLE_EXTRA_LENGTH)?;
                payload_length = payload_length
                    .checked_sub(UNRELIABLE_EXTRA_LENGTH)
                    .ok_or(ProtocolError::NegativeLength(command.length))?;
                let payload = cursor.read_bytes(payload_length)?;
                self.handle_envelope(payload, messages);
            }
            CommandType::SendReliable => {
                let payload = cursor.read_bytes(payload_length)?;
                self.handle_envelope(payload, messages);
            }
            CommandType::SendReliableFragment => {
                let payload = cursor.read_bytes(payload_length)?;
                self.handle_fragment(payload, messages);
            }
            other => {
                trace!(command = ?other, payload_length, "Skipping command");
                cursor.skip(payload_length)?;
            }
        }
        Ok(CommandFlow::Continue)
    }

    fn handle_fragment(&mut self, envelope: &[u8], messages: &mut Vec<DecodedMessage>) {
        self.record(Metrics::fragment_received);
        if envelope.len() < FRAGMENT_HEADER_LENGTH {
            debug!(len = envelope.len(), "Fragment shorter than its header");
            self.record(Metrics::fragment_dropped);
            return;
        }
        match self.fragments.accept(envelope) {
            Ok(Some(payload)) => {
                self.record(Metrics::fragment_completed);
                self.handle_envelope(&payload, messages);
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "Fragment dropped");
                self.record(Metrics::fragment_dropped);
            }
        }
    }

    /// Unwrap a reliable envelope and decode the message inside it.
    fn handle_envelope(&mut self, payload: &[u8], messages: &mut Vec<DecodedMessage>) {
        match self.decode_envelope(payload) {
            Ok(Some(message)) => {
                self.record(Metrics::message_decoded);
                messages.push(message);
            }
            Ok(None) => {}
            Err(ProtocolError::UnsupportedEncryption) => {
                trace!("Encrypted message skipped");
                self.record(Metrics::encrypted_discarded);
            }
            Err(e) => {
                debug!(error = %e, "Message decode failed");
                self.record(Metrics::decode_error);
            }
        }
    }

    /// Decode a single envelope. `Ok(None)` means the envelope is not a
    /// message this decoder handles.
    pub fn decode_envelope(&self, payload: &[u8]) -> Result<Option<DecodedMessage>> {
        if payload.len() < 2 {
            return Ok(None);
        }
        let mut cursor = ByteCursor::new(payload);
        let marker = cursor.read_u8()?;
        if !ENVELOPE_MARKERS.contains(&marker) {
            trace!(marker, "Unknown envelope marker");
            return Ok(None);
        }
        let message_type = cursor.read_u8()?;
        if message_type > ENCRYPTED_MESSAGE_THRESHOLD {
            return Err(ProtocolError::UnsupportedEncryption);
        }
        let message = match MessageType::from_byte(message_type) {
            Some(MessageType::OperationRequest | MessageType::InternalOperationRequest) => {
                self.codec.decode_request(&mut cursor)?
            }
            Some(MessageType::OperationResponse | MessageType::InternalOperationResponse) => {
                self.codec.decode_response(&mut cursor)?
            }
            Some(MessageType::Event) => self.codec.decode_event(&mut cursor)?,
            None => {
                trace!(message_type, "Unhandled message type");
                return Ok(None);
            }
        };
        Ok(Some(message))
    }

    fn record(&self, f: impl FnOnce(&Metrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

enum CommandFlow {
    Continue,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(flags: u8, commands: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0, 1, flags, commands.len() as u8];
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&0i32.to_be_bytes());
        for c in commands {
            out.extend_from_slice(c);
        }
        out
    }

    fn command(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![kind, 0, 0, 0];
        out.extend_from_slice(&((payload.len() + COMMAND_HEADER_LENGTH) as i32).to_be_bytes());
        out.extend_from_slice(&1i32.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    // marker, event type, code 1, zero parameters
    const EMPTY_EVENT: [u8; 5] = [0xF3, 0x04, 0x01, 0x00, 0x00];

    #[test]
    fn test_reliable_event() {
        let packet = frame(0, &[command(6, &EMPTY_EVENT)]);
        let messages = FrameDecoder::default().handle_packet(&packet);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].code(), 1);
    }

    #[test]
    fn test_short_packet_ignored() {
        assert!(FrameDecoder::default().handle_packet(&[0; 11]).is_empty());
    }

    #[test]
    fn test_encrypted_and_crc_packets_discarded() {
        let cmd = command(6, &EMPTY_EVENT);
        assert!(FrameDecoder::default()
            .handle_packet(&frame(FLAG_ENCRYPTED, &[cmd.clone()]))
            .is_empty());
        assert!(FrameDecoder::default()
            .handle_packet(&frame(FLAG_CRC, &[cmd]))
            .is_empty());
    }

    #[test]
    fn test_disconnect_stops_packet() {
        let packet = frame(
            0,
            &[
                command(6, &EMPTY_EVENT),
                command(4, &[]),
                command(6, &EMPTY_EVENT),
            ],
        );
        assert_eq!(FrameDecoder::default().handle_packet(&packet).len(), 1);
    }

    #[test]
    fn test_unreliable_extra_bytes() {
        let mut payload = vec![0, 0, 0, 9];
        payload.extend_from_slice(&EMPTY_EVENT);
        let packet = frame(0, &[command(7, &payload)]);
        assert_eq!(FrameDecoder::default().handle_packet(&packet).len(), 1);
    }

    #[test]
    fn test_bad_message_does_not_abort_packet() {
        // unknown tag 0x63 inside the first event
        let broken = [0xF3, 0x04, 0x01, 0x00, 0x01, 0x00, 0x63];
        let packet = frame(0, &[command(6, &broken), command(6, &EMPTY_EVENT)]);
        assert_eq!(FrameDecoder::default().handle_packet(&packet).len(), 1);
    }

    #[test]
    fn test_encrypted_message_and_bad_marker() {
        let packet = frame(
            0,
            &[
                command(6, &[0xF3, 0x84, 0x01, 0x00, 0x00]),
                command(6, &[0x00, 0x04, 0x01, 0x00, 0x00]),
                command(1, &[0xAA; 8]),
                command(6, &EMPTY_EVENT),
            ],
        );
        assert_eq!(FrameDecoder::default().handle_packet(&packet).len(), 1);
    }
}
