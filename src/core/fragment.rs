//! # Fragment Reassembly
//!
//! Reconstructs oversized messages split across `SendReliableFragment`
//! commands that share a sequence number.
//!
//! Offsets and lengths come straight off the wire and may be malformed or
//! hostile, so every write is checked against the declared total length. The
//! number of in-flight sequences is bounded (oldest evicted first) and stale
//! sequences expire after a TTL.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::core::cursor::ByteCursor;
use crate::error::{ProtocolError, Result};

/// Fragment envelope header length: sequence, count, number, total, offset.
pub const FRAGMENT_HEADER_LENGTH: usize = 20;

/// Header fields preceding the fragment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub sequence: i32,
    pub fragment_count: i32,
    pub fragment_number: i32,
    pub total_length: i32,
    pub offset: i32,
}

impl FragmentHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        Ok(Self {
            sequence: cursor.read_i32()?,
            fragment_count: cursor.read_i32()?,
            fragment_number: cursor.read_i32()?,
            total_length: cursor.read_i32()?,
            offset: cursor.read_i32()?,
        })
    }
}

/// Partially received message for one sequence number.
#[derive(Debug)]
pub struct PendingFragment {
    total_length: usize,
    bytes_written: usize,
    buffer: BytesMut,
    seen_offsets: HashSet<usize>,
    created_at: Instant,
}

impl PendingFragment {
    fn new(total_length: usize) -> Self {
        Self {
            total_length,
            bytes_written: 0,
            buffer: BytesMut::zeroed(total_length),
            seen_offsets: HashSet::new(),
            created_at: Instant::now(),
        }
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn is_complete(&self) -> bool {
        self.bytes_written >= self.total_length
    }

    /// Copy `data` at `offset`; rejects writes past `total_length`.
    fn write(&mut self, offset: i32, data: &[u8]) -> Result<()> {
        let out_of_range = ProtocolError::FragmentOutOfRange {
            offset: i64::from(offset),
            len: data.len(),
            total: self.total_length,
        };
        let start = usize::try_from(offset).map_err(|_| out_of_range)?;
        let end = match start.checked_add(data.len()) {
            Some(end) if end <= self.total_length => end,
            _ => {
                return Err(ProtocolError::FragmentOutOfRange {
                    offset: i64::from(offset),
                    len: data.len(),
                    total: self.total_length,
                })
            }
        };
        if !self.seen_offsets.insert(start) {
            trace!(offset = start, "Duplicate fragment ignored");
            return Ok(());
        }
        self.buffer[start..end].copy_from_slice(data);
        self.bytes_written += data.len();
        Ok(())
    }
}

/// Limits applied to in-flight reassembly state.
#[derive(Debug, Clone, Copy)]
pub struct FragmentLimits {
    pub max_pending: usize,
    pub ttl: Duration,
    pub max_total_length: usize,
}

impl Default for FragmentLimits {
    fn default() -> Self {
        Self {
            max_pending: 256,
            ttl: Duration::from_secs(30),
            max_total_length: 1024 * 1024,
        }
    }
}

/// Pending fragments keyed by sequence number with FIFO eviction.
#[derive(Debug)]
pub struct FragmentBuffer {
    pending: HashMap<i32, PendingFragment>,
    insertion_order: VecDeque<i32>,
    limits: FragmentLimits,
}

impl Default for FragmentBuffer {
    fn default() -> Self {
        Self::new(FragmentLimits::default())
    }
}

impl FragmentBuffer {
    pub fn new(limits: FragmentLimits) -> Self {
        Self {
            pending: HashMap::new(),
            insertion_order: VecDeque::new(),
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, sequence: i32) -> Option<&PendingFragment> {
        self.pending.get(&sequence)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.insertion_order.clear();
    }

    /// Parse a fragment envelope and merge it. Returns the reassembled payload
    /// once every byte of the message has arrived.
    pub fn accept(&mut self, envelope: &[u8]) -> Result<Option<Bytes>> {
        let mut cursor = ByteCursor::new(envelope);
        let header = FragmentHeader::read(&mut cursor)?;
        self.insert(header, cursor.rest())
    }

    /// Merge fragment `data` described by `header`.
    pub fn insert(&mut self, header: FragmentHeader, data: &[u8]) -> Result<Option<Bytes>> {
        let total_length = usize::try_from(header.total_length)
            .ok()
            .filter(|total| *total > 0 && *total <= self.limits.max_total_length)
            .ok_or_else(|| {
                ProtocolError::InvalidFragment(format!(
                    "total length {} outside 1..={}",
                    header.total_length, self.limits.max_total_length
                ))
            })?;

        self.cleanup_expired();

        if !self.pending.contains_key(&header.sequence) {
            self.evict_to_capacity();
            self.pending
                .insert(header.sequence, PendingFragment::new(total_length));
            self.insertion_order.push_back(header.sequence);
            debug!(
                sequence = header.sequence,
                total_length,
                fragment_count = header.fragment_count,
                "Started fragment reassembly"
            );
        }

        let Some(entry) = self.pending.get_mut(&header.sequence) else {
            return Ok(None);
        };
        if entry.total_length != total_length {
            return Err(ProtocolError::InvalidFragment(format!(
                "sequence {} total length changed from {} to {}",
                header.sequence, entry.total_length, total_length
            )));
        }
        entry.write(header.offset, data)?;
        trace!(
            sequence = header.sequence,
            fragment = header.fragment_number,
            written = entry.bytes_written,
            total = entry.total_length,
            "Fragment stored"
        );

        if !entry.is_complete() {
            return Ok(None);
        }
        let completed = self.remove(header.sequence);
        Ok(completed.map(|entry| entry.buffer.freeze()))
    }

    fn remove(&mut self, sequence: i32) -> Option<PendingFragment> {
        self.insertion_order.retain(|s| *s != sequence);
        self.pending.remove(&sequence)
    }

    fn evict_to_capacity(&mut self) {
        while self.pending.len() >= self.limits.max_pending.max(1) {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            if let Some(dropped) = self.pending.remove(&oldest) {
                warn!(
                    sequence = oldest,
                    written = dropped.bytes_written,
                    total = dropped.total_length,
                    "Evicting incomplete fragment sequence"
                );
            }
        }
    }

    /// Drop sequences older than the TTL.
    pub fn cleanup_expired(&mut self) {
        let ttl = self.limits.ttl;
        let expired: Vec<i32> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.created_at.elapsed() > ttl)
            .map(|(sequence, _)| *sequence)
            .collect();
        for sequence in expired {
            debug!(sequence, "Fragment sequence expired");
            self.remove(sequence);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(sequence: i32, total: i32, offset: i32) -> FragmentHeader {
        FragmentHeader {
            sequence,
            fragment_count: 2,
            fragment_number: 0,
            total_length: total,
            offset,
        }
    }

    #[test]
    fn test_out_of_order_completion() {
        let mut buffer = FragmentBuffer::default();
        assert!(buffer.insert(header(1, 6, 3), b"def").unwrap().is_none());
        let done = buffer.insert(header(1, 6, 0), b"abc").unwrap().unwrap();
        assert_eq!(&done[..], b"abcdef");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_write_past_total_rejected() {
        let mut buffer = FragmentBuffer::default();
        let err = buffer.insert(header(1, 4, 2), b"xyz").unwrap_err();
        assert!(matches!(err, ProtocolError::FragmentOutOfRange { .. }));
        let err = buffer.insert(header(1, 4, -1), b"x").unwrap_err();
        assert!(matches!(err, ProtocolError::FragmentOutOfRange { .. }));
        assert_eq!(buffer.get(1).unwrap().bytes_written(), 0);
    }

    #[test]
    fn test_stale_sequence_expires() {
        let mut buffer = FragmentBuffer::new(FragmentLimits {
            ttl: Duration::from_millis(20),
            ..FragmentLimits::default()
        });
        assert!(buffer.insert(header(3, 6, 0), b"abc").unwrap().is_none());
        assert_eq!(buffer.len(), 1);

        std::thread::sleep(Duration::from_millis(60));
        buffer.cleanup_expired();
        assert!(buffer.get(3).is_none());
        assert!(buffer.is_empty());

        // the late half starts a fresh entry instead of completing the stale one
        assert!(buffer.insert(header(3, 6, 3), b"def").unwrap().is_none());
        assert_eq!(buffer.get(3).unwrap().bytes_written(), 3);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_expiry_runs_on_insert() {
        let mut buffer = FragmentBuffer::new(FragmentLimits {
            ttl: Duration::from_millis(20),
            ..FragmentLimits::default()
        });
        assert!(buffer.insert(header(1, 4, 0), b"ab").unwrap().is_none());
        std::thread::sleep(Duration::from_millis(60));
        assert!(buffer.insert(header(2, 4, 0), b"ab").unwrap().is_none());
        assert!(buffer.get(1).is_none());
        assert!(buffer.get(2).is_some());
    }

    #[test]
    fn test_duplicate_fragment_not_double_counted() {
        let mut buffer = FragmentBuffer::default();
        assert!(buffer.insert(header(4, 4, 0), b"ab").unwrap().is_none());
        assert!(buffer.insert(header(4, 4, 0), b"ab").unwrap().is_none());
        assert_eq!(buffer.get(4).unwrap().bytes_written(), 2);
    }

    #[test]
    fn test_invalid_total_length() {
        let mut buffer = FragmentBuffer::default();
        assert!(buffer.insert(header(1, 0, 0), b"").is_err());
        assert!(buffer.insert(header(1, -5, 0), b"a").is_err());
        assert!(buffer.insert(header(1, i32::MAX, 0), b"a").is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_total_length_mismatch() {
        let mut buffer = FragmentBuffer::default();
        buffer.insert(header(2, 8, 0), b"abcd").unwrap();
        assert!(matches!(
            buffer.insert(header(2, 9, 4), b"efgh"),
            Err(ProtocolError::InvalidFragment(_))
        ));
    }

    #[test]
    fn test_eviction_keeps_capacity() {
        let mut buffer = FragmentBuffer::new(FragmentLimits {
            max_pending: 2,
            ..FragmentLimits::default()
        });
        buffer.insert(header(1, 4, 0), b"a").unwrap();
        buffer.insert(header(2, 4, 0), b"a").unwrap();
        buffer.insert(header(3, 4, 0), b"a").unwrap();
        assert_eq!(buffer.len(), 2);
        assert!(buffer.get(1).is_none());
        assert!(buffer.get(3).is_some());
    }

    #[test]
    fn test_accept_parses_envelope() {
        let mut envelope = Vec::new();
        for field in [9i32, 1, 0, 3, 0] {
            envelope.extend_from_slice(&field.to_be_bytes());
        }
        envelope.extend_from_slice(b"xyz");
        let done = FragmentBuffer::default().accept(&envelope).unwrap().unwrap();
        assert_eq!(&done[..], b"xyz");
    }
}
