//! Wire encoder used by the integration tests to build Photon packets.
#![allow(dead_code)]

use std::sync::Arc;

use photon_loot::catalog::{CatalogItem, InMemoryItemCatalog};
use photon_loot::{EventCodes, LootPipeline, ProtocolValue, SessionConfig, TypeTag};

pub const EVENT_MESSAGE: u8 = 0x04;
pub const REQUEST_MESSAGE: u8 = 0x02;
pub const RESPONSE_MESSAGE: u8 = 0x03;

pub const SEND_RELIABLE: u8 = 0x06;
pub const SEND_UNRELIABLE: u8 = 0x07;
pub const SEND_FRAGMENT: u8 = 0x08;
pub const DISCONNECT: u8 = 0x04;
pub const PING: u8 = 0x05;

/// Append the tag byte and body of `value`.
pub fn write_value(out: &mut Vec<u8>, value: &ProtocolValue) {
    out.push(tag_of(value).to_byte());
    write_body(out, value);
}

pub fn encode_value(value: &ProtocolValue) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

pub fn tag_of(value: &ProtocolValue) -> TypeTag {
    match value {
        ProtocolValue::Nil => TypeTag::Nil,
        ProtocolValue::Bool(_) => TypeTag::Boolean,
        ProtocolValue::Int8(_) => TypeTag::Int8,
        ProtocolValue::Int16(_) => TypeTag::Int16,
        ProtocolValue::Int32(_) => TypeTag::Int32,
        ProtocolValue::Int64(_) => TypeTag::Int64,
        ProtocolValue::Float32(_) => TypeTag::Float32,
        ProtocolValue::Float64(_) => TypeTag::Double,
        ProtocolValue::String(_) => TypeTag::String,
        ProtocolValue::ByteArray(_) => TypeTag::ByteArray,
        ProtocolValue::TypedArray { .. } => TypeTag::TypedArray,
        ProtocolValue::ObjectArray(_) => TypeTag::ObjectArray,
        ProtocolValue::Dictionary { .. } => TypeTag::Dictionary,
        ProtocolValue::Hashtable(_) => TypeTag::Hashtable,
        ProtocolValue::Int32Array(_) => TypeTag::Int32Array,
        ProtocolValue::StringArray(_) => TypeTag::StringArray,
    }
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Append the body of `value` without its tag byte.
pub fn write_body(out: &mut Vec<u8>, value: &ProtocolValue) {
    match value {
        ProtocolValue::Nil => {}
        ProtocolValue::Bool(b) => out.push(u8::from(*b)),
        ProtocolValue::Int8(v) => out.push(*v),
        ProtocolValue::Int16(v) => out.extend_from_slice(&v.to_be_bytes()),
        ProtocolValue::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
        ProtocolValue::Int64(v) => out.extend_from_slice(&v.to_be_bytes()),
        ProtocolValue::Float32(v) => out.extend_from_slice(&v.to_be_bytes()),
        ProtocolValue::Float64(v) => out.extend_from_slice(&v.to_be_bytes()),
        ProtocolValue::String(s) => write_string(out, s),
        ProtocolValue::ByteArray(bytes) => {
            out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        ProtocolValue::TypedArray { element, items } => {
            out.extend_from_slice(&(items.len() as u16).to_be_bytes());
            out.push(element.to_byte());
            for item in items {
                write_body(out, item);
            }
        }
        ProtocolValue::ObjectArray(items) => {
            out.extend_from_slice(&(items.len() as u16).to_be_bytes());
            for item in items {
                write_value(out, item);
            }
        }
        ProtocolValue::Dictionary {
            key,
            value,
            entries,
        } => {
            out.push(key.to_byte());
            out.push(value.to_byte());
            out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
            for (k, v) in entries {
                write_body(out, k);
                write_body(out, v);
            }
        }
        ProtocolValue::Hashtable(entries) => {
            out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
            for (k, v) in entries {
                write_value(out, k);
                write_value(out, v);
            }
        }
        ProtocolValue::Int32Array(values) => {
            out.extend_from_slice(&(values.len() as u32).to_be_bytes());
            for v in values {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        ProtocolValue::StringArray(values) => {
            out.extend_from_slice(&(values.len() as u16).to_be_bytes());
            for s in values {
                write_string(out, s);
            }
        }
    }
}

pub fn write_table(out: &mut Vec<u8>, params: &[(u8, ProtocolValue)]) {
    out.extend_from_slice(&(params.len() as i16).to_be_bytes());
    for (id, value) in params {
        out.push(*id);
        write_value(out, value);
    }
}

fn with_code(code_param: u8, code: u16, params: &[(u8, ProtocolValue)]) -> Vec<(u8, ProtocolValue)> {
    let mut all = params.to_vec();
    all.push((code_param, ProtocolValue::Int16(code)));
    all
}

/// Reliable envelope for an event whose routing code sits in parameter 252.
pub fn event_envelope(code: u16, params: &[(u8, ProtocolValue)]) -> Vec<u8> {
    let mut out = vec![0xF3, EVENT_MESSAGE, 1];
    write_table(&mut out, &with_code(252, code, params));
    out
}

/// Reliable envelope for an operation request; routing code in parameter 253.
pub fn request_envelope(code: u16, params: &[(u8, ProtocolValue)]) -> Vec<u8> {
    let mut out = vec![0xF3, REQUEST_MESSAGE, 1];
    write_table(&mut out, &with_code(253, code, params));
    out
}

pub fn response_envelope(code: u16, return_code: u16, params: &[(u8, ProtocolValue)]) -> Vec<u8> {
    let mut out = vec![0xF3, RESPONSE_MESSAGE, 1];
    out.extend_from_slice(&return_code.to_be_bytes());
    out.push(TypeTag::Nil.to_byte());
    write_table(&mut out, &with_code(253, code, params));
    out
}

/// Command with a 12-byte header; `length` covers header and payload.
pub fn command(kind: u8, sequence: i32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![kind, 0, 0, 0];
    out.extend_from_slice(&((payload.len() + 12) as i32).to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn reliable(payload: &[u8]) -> Vec<u8> {
    command(SEND_RELIABLE, 1, payload)
}

/// Unreliable commands carry four extra bytes ahead of the envelope.
pub fn unreliable(payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0, 0, 0, 0];
    body.extend_from_slice(payload);
    command(SEND_UNRELIABLE, 1, &body)
}

/// Outer frame: peer id, flags, command count, timestamp, challenge.
pub fn frame_with_flags(flags: u8, commands: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0x00, 0x01, flags, commands.len() as u8];
    out.extend_from_slice(&0x1234_5678u32.to_be_bytes());
    out.extend_from_slice(&0i32.to_be_bytes());
    for c in commands {
        out.extend_from_slice(c);
    }
    out
}

pub fn frame(commands: &[Vec<u8>]) -> Vec<u8> {
    frame_with_flags(0, commands)
}

/// Split `payload` into fragment commands of at most `chunk` data bytes.
pub fn fragment_commands(sequence: i32, payload: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = payload.chunks(chunk.max(1)).collect();
    let count = chunks.len() as i32;
    chunks
        .iter()
        .enumerate()
        .map(|(number, data)| {
            let offset = (number * chunk.max(1)) as i32;
            fragment_command(sequence, count, number as i32, payload.len() as i32, offset, data)
        })
        .collect()
}

pub fn fragment_command(
    sequence: i32,
    count: i32,
    number: i32,
    total: i32,
    offset: i32,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(20 + data.len());
    for field in [sequence, count, number, total, offset] {
        body.extend_from_slice(&field.to_be_bytes());
    }
    body.extend_from_slice(data);
    command(SEND_FRAGMENT, sequence, &body)
}

pub fn int(v: i32) -> ProtocolValue {
    ProtocolValue::Int32(v)
}

pub fn text(s: &str) -> ProtocolValue {
    ProtocolValue::String(s.to_string())
}

pub fn uuid(byte: u8) -> ProtocolValue {
    ProtocolValue::ByteArray(vec![byte; 16])
}

pub mod codes {
    pub const NEW_CHARACTER: u16 = 29;
    pub const NEW_SIMPLE_ITEM: u16 = 32;
    pub const NEW_LOOT: u16 = 98;
    pub const ATTACH_ITEM_CONTAINER: u16 = 99;
    pub const OTHER_GRABBED_LOOT: u16 = 277;
    pub const JOIN: u16 = 2;
    pub const INVENTORY_MOVE_ITEM: u16 = 21;
}

/// Code table matching the constants in [`codes`].
pub fn event_codes() -> EventCodes {
    EventCodes {
        new_character: codes::NEW_CHARACTER.into(),
        new_equipment_item: 30,
        new_siege_banner_item: 31,
        new_simple_item: codes::NEW_SIMPLE_ITEM.into(),
        new_loot: codes::NEW_LOOT.into(),
        attach_item_container: codes::ATTACH_ITEM_CONTAINER.into(),
        detach_item_container: 100,
        character_stats: 143,
        other_grabbed_loot: codes::OTHER_GRABBED_LOOT.into(),
        new_loot_chest: 387,
        inventory_put_item: 26,
        join: codes::JOIN.into(),
        inventory_move_item: codes::INVENTORY_MOVE_ITEM.into(),
    }
}

pub fn catalog() -> Arc<InMemoryItemCatalog> {
    let catalog: InMemoryItemCatalog = [
        CatalogItem::new(55, "T4_BAG").with_name("EN-US", "Adept's Bag"),
        CatalogItem::new(60, "T8_MAIN_SWORD@2").with_name("EN-US", "Elder's Broadsword"),
    ]
    .into_iter()
    .collect();
    Arc::new(catalog)
}

pub fn pipeline() -> LootPipeline {
    LootPipeline::new(&SessionConfig::default(), event_codes(), catalog())
}

/// Packet announcing another player's pickup.
pub fn other_grabbed_packet(from: &str, by: &str, item: i32, quantity: i32) -> Vec<u8> {
    frame(&[reliable(&event_envelope(
        codes::OTHER_GRABBED_LOOT,
        &[
            (1, text(from)),
            (2, text(by)),
            (3, ProtocolValue::Bool(false)),
            (4, int(item)),
            (5, int(quantity)),
        ],
    ))])
}
