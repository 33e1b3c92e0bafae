//! Persistent circular log over the non-volatile store.
//!
//! Layout: [`RingIndex`] at offset 0, [`ExperimentHeader`] directly after
//! it, then `max_blocks` fixed-width record slots filling the remaining
//! capacity. One slot is always left unused so `head == tail` means empty
//! and nothing else; usable capacity is `max_blocks - 1` records.
//!
//! Header and ring-pointer writes run with the periodic tick suppressed.
//! A header left half-written is unrecoverable on reboot, and the tick
//! handler appends through this same structure.

use daq_common::records::{
    DATA_RECORD_SIZE, DataRecord, EXPERIMENT_HEADER_ADDRESS, EXPERIMENT_HEADER_SIZE,
    ExperimentHeader, HEADER_REGION_SIZE, RING_INDEX_ADDRESS, RING_INDEX_SIZE, RingIndex,
};
use daq_hal::store::NonVolatileStore;
use daq_hal::timer::TickGate;

/// The persistent circular log: one experiment header plus a FIFO ring of
/// data records.
pub struct Memory<S: NonVolatileStore, G: TickGate> {
    store: S,
    gate: G,
    index: RingIndex,
    max_blocks: u16,
}

impl<S: NonVolatileStore, G: TickGate> Memory<S, G> {
    /// Compute the ring geometry from the store capacity and load the
    /// persisted ring index.
    pub fn initialize(store: S, gate: G) -> Self {
        let max_blocks = ((store.capacity() - HEADER_REGION_SIZE) / DATA_RECORD_SIZE) as u16;
        let mut memory = Self {
            store,
            gate,
            index: RingIndex::default(),
            max_blocks,
        };
        let mut raw = [0u8; RING_INDEX_SIZE];
        memory.store.read_block(RING_INDEX_ADDRESS, &mut raw);
        memory.index = RingIndex::from_bytes(&raw);
        memory
    }

    /// Record slots in the data region (one is reserved as the empty
    /// marker).
    pub fn max_blocks(&self) -> u16 {
        self.max_blocks
    }

    /// Records the ring can hold.
    pub fn capacity_records(&self) -> u16 {
        self.max_blocks.saturating_sub(1)
    }

    /// Records currently stored.
    pub fn len(&self) -> u16 {
        let RingIndex { head, tail } = self.index;
        if tail >= head {
            tail - head
        } else {
            self.max_blocks - head + tail
        }
    }

    /// Whether the ring holds no records.
    pub fn is_empty(&self) -> bool {
        self.index.head == self.index.tail
    }

    /// The current ring window.
    pub fn ring_index(&self) -> RingIndex {
        self.index
    }

    /// Overwrite the experiment header region.
    pub fn persist_header(&mut self, header: &ExperimentHeader) {
        let bytes = header.to_bytes();
        self.gate.suppress();
        self.store.write_block(EXPERIMENT_HEADER_ADDRESS, &bytes);
        self.gate.restore();
    }

    /// Read the experiment header region.
    pub fn load_header(&self) -> ExperimentHeader {
        let mut raw = [0u8; EXPERIMENT_HEADER_SIZE];
        self.store.read_block(EXPERIMENT_HEADER_ADDRESS, &mut raw);
        ExperimentHeader::from_bytes(&raw)
    }

    /// Append a record at `tail`. A full ring advances `head` first — the
    /// newest record silently evicts the oldest.
    pub fn append(&mut self, record: &DataRecord) {
        let bytes = record.to_bytes();
        self.gate.suppress();
        let next = (self.index.tail + 1) % self.max_blocks;
        if next == self.index.head {
            self.index.head = (self.index.head + 1) % self.max_blocks;
        }
        self.store
            .write_block(slot_address(self.index.tail), &bytes);
        self.index.tail = next;
        self.store
            .write_block(RING_INDEX_ADDRESS, &self.index.to_bytes());
        self.gate.restore();
    }

    /// Read the record at a 0-based logical index counted from `head`.
    /// `None` past the end of the stored window.
    pub fn read(&self, logical_index: u16) -> Option<DataRecord> {
        if logical_index >= self.len() {
            return None;
        }
        let slot = (self.index.head + logical_index) % self.max_blocks;
        let mut raw = [0u8; DATA_RECORD_SIZE];
        self.store.read_block(slot_address(slot), &mut raw);
        Some(DataRecord::from_bytes(&raw))
    }

    /// Logical index where a replay of the last `n` records starts.
    ///
    /// Requests outside `1..=max_blocks` clamp to the head (the full
    /// log); a request larger than what is stored does the same.
    pub fn address_from_count(&self, n: i32) -> u16 {
        if n < 1 || n > i32::from(self.max_blocks) {
            return 0;
        }
        self.len().saturating_sub(n as u16)
    }

    /// Drop all logical content. The record bytes stay in place and are
    /// stale until overwritten.
    pub fn reset(&mut self) {
        self.gate.suppress();
        self.index = RingIndex::default();
        self.store
            .write_block(RING_INDEX_ADDRESS, &self.index.to_bytes());
        self.gate.restore();
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the backing store (power-loss simulations).
    pub fn into_store(self) -> S {
        self.store
    }
}

fn slot_address(slot: u16) -> usize {
    HEADER_REGION_SIZE + usize::from(slot) * DATA_RECORD_SIZE
}
