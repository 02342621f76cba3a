//! # Photon Messages
//!
//! Operation requests, operation responses and events, each carrying a
//! parameter table keyed by a one-byte id.
//!
//! ## Wire Format
//! ```text
//! ParameterTable    = [Count(i16)] ([Id(1)] [Tag(1)] [Value(N)])*
//! OperationRequest  = [Code(1)] ParameterTable
//! OperationResponse = [Code(1)] [ReturnCode(u16)] [Tag(1)] [DebugMessage(N)] ParameterTable
//! EventData         = [Code(1)] ParameterTable
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::cursor::ByteCursor;
use crate::core::value::{ProtocolValue, ValueReader};
use crate::error::{Miss, Result};

/// Parameter id carrying the semantic event code inside an event.
pub const EVENT_CODE_PARAM: u8 = 252;

/// Parameter id carrying the semantic operation code inside a request/response.
pub const OPERATION_CODE_PARAM: u8 = 253;

/// Parameters of a single message. Later duplicates of an id replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterTable(BTreeMap<u8, ProtocolValue>);

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u8, value: ProtocolValue) -> Option<ProtocolValue> {
        self.0.insert(id, value)
    }

    pub fn get(&self, id: u8) -> Option<&ProtocolValue> {
        self.0.get(&id)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.0.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u8, &ProtocolValue)> {
        self.0.iter()
    }

    fn require(&self, id: u8) -> std::result::Result<&ProtocolValue, Miss> {
        self.get(id).ok_or(Miss::MissingParameter(id))
    }

    /// Integer parameter of any width.
    pub fn int(&self, id: u8) -> std::result::Result<i64, Miss> {
        self.require(id)?.as_i64().ok_or(Miss::TypeMismatch {
            id,
            expected: "integer",
        })
    }

    pub fn string(&self, id: u8) -> std::result::Result<&str, Miss> {
        self.require(id)?.as_str().ok_or(Miss::TypeMismatch {
            id,
            expected: "string",
        })
    }

    /// String parameter that may be absent or of another type; both read as empty.
    pub fn string_or_empty(&self, id: u8) -> &str {
        self.get(id).and_then(ProtocolValue::as_str).unwrap_or("")
    }

    /// Flag that defaults to `false` when absent or not a boolean.
    pub fn flag(&self, id: u8) -> bool {
        self.get(id).and_then(ProtocolValue::as_bool).unwrap_or(false)
    }

    /// Exactly 16 raw bytes, as used for container UUIDs.
    pub fn uuid_bytes(&self, id: u8) -> std::result::Result<[u8; 16], Miss> {
        let mismatch = Miss::TypeMismatch {
            id,
            expected: "16-byte array",
        };
        let bytes = self.require(id)?.to_bytes().ok_or(mismatch.clone())?;
        bytes.try_into().map_err(|_| mismatch)
    }

    pub fn int_list(&self, id: u8) -> std::result::Result<Vec<Option<i64>>, Miss> {
        self.require(id)?.to_int_list().ok_or(Miss::TypeMismatch {
            id,
            expected: "integer array",
        })
    }
}

impl FromIterator<(u8, ProtocolValue)> for ParameterTable {
    fn from_iter<T: IntoIterator<Item = (u8, ProtocolValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A fully decoded message, produced once per reassembled payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DecodedMessage {
    OperationRequest {
        code: u8,
        parameters: ParameterTable,
    },
    OperationResponse {
        code: u8,
        return_code: u16,
        debug_message: ProtocolValue,
        parameters: ParameterTable,
    },
    Event {
        code: u8,
        parameters: ParameterTable,
    },
}

impl DecodedMessage {
    pub fn parameters(&self) -> &ParameterTable {
        match self {
            DecodedMessage::OperationRequest { parameters, .. }
            | DecodedMessage::OperationResponse { parameters, .. }
            | DecodedMessage::Event { parameters, .. } => parameters,
        }
    }

    pub fn code(&self) -> u8 {
        match *self {
            DecodedMessage::OperationRequest { code, .. }
            | DecodedMessage::OperationResponse { code, .. }
            | DecodedMessage::Event { code, .. } => code,
        }
    }
}

/// Decoder for the three message shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec {
    values: ValueReader,
}

impl MessageCodec {
    pub fn new(values: ValueReader) -> Self {
        Self { values }
    }

    pub fn decode_parameter_table(&self, cursor: &mut ByteCursor<'_>) -> Result<ParameterTable> {
        // a negative count decodes as an empty table
        let count = cursor.read_i16()?.max(0);
        let mut table = ParameterTable::new();
        for _ in 0..count {
            let id = cursor.read_u8()?;
            let value = self.values.read_tagged(cursor)?;
            table.insert(id, value);
        }
        Ok(table)
    }

    pub fn decode_request(&self, cursor: &mut ByteCursor<'_>) -> Result<DecodedMessage> {
        let code = cursor.read_u8()?;
        let parameters = self.decode_parameter_table(cursor)?;
        Ok(DecodedMessage::OperationRequest { code, parameters })
    }

    pub fn decode_response(&self, cursor: &mut ByteCursor<'_>) -> Result<DecodedMessage> {
        let code = cursor.read_u8()?;
        let return_code = cursor.read_u16()?;
        let debug_message = self.values.read_tagged(cursor)?;
        let parameters = self.decode_parameter_table(cursor)?;
        Ok(DecodedMessage::OperationResponse {
            code,
            return_code,
            debug_message,
            parameters,
        })
    }

    pub fn decode_event(&self, cursor: &mut ByteCursor<'_>) -> Result<DecodedMessage> {
        let code = cursor.read_u8()?;
        let parameters = self.decode_parameter_table(cursor)?;
        Ok(DecodedMessage::Event { code, parameters })
    }
}
