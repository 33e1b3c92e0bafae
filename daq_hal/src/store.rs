//! Non-volatile byte store capability.

use std::path::{Path, PathBuf};
use tracing::warn;

/// Byte-addressable non-volatile storage of fixed capacity.
///
/// The device-side implementation is an external EEPROM whose reads and
/// writes cannot fail once the part answers, so the trait is infallible.
/// Callers derive all addresses from `capacity()`; implementations may
/// assume in-range access.
pub trait NonVolatileStore {
    /// Total capacity [bytes].
    fn capacity(&self) -> usize;

    /// Fill `buf` from the bytes starting at `address`.
    fn read_block(&self, address: usize, buf: &mut [u8]);

    /// Overwrite the bytes starting at `address`.
    fn write_block(&mut self, address: usize, bytes: &[u8]);
}

/// Volatile stand-in for tests: a RAM image of the store.
#[derive(Debug, Clone)]
pub struct RamStore {
    bytes: Vec<u8>,
}

impl RamStore {
    /// Zero-filled store of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
        }
    }

    /// Snapshot of the raw content, for power-loss simulations.
    pub fn image(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Store rebuilt from a snapshot.
    pub fn from_image(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl NonVolatileStore for RamStore {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_block(&self, address: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[address..address + buf.len()]);
    }

    fn write_block(&mut self, address: usize, bytes: &[u8]) {
        self.bytes[address..address + bytes.len()].copy_from_slice(bytes);
    }
}

/// File-backed store for the simulation host.
///
/// The image loads once at open and every write flushes the whole file,
/// so a killed process leaves the same bytes a power loss would. I/O
/// errors surface at open; a failed flush is logged and the RAM image
/// stays authoritative for the rest of the session.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileStore {
    /// Open (or create) the backing file, padded or truncated to
    /// `capacity` bytes.
    pub fn open(path: &Path, capacity: usize) -> std::io::Result<Self> {
        let mut bytes = match std::fs::read(path) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        bytes.resize(capacity, 0);
        let store = Self {
            path: path.to_path_buf(),
            bytes,
        };
        std::fs::write(&store.path, &store.bytes)?;
        Ok(store)
    }

    fn flush(&self) {
        if let Err(e) = std::fs::write(&self.path, &self.bytes) {
            warn!("store flush to {:?} failed: {e}", self.path);
        }
    }
}

impl NonVolatileStore for FileStore {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_block(&self, address: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.bytes[address..address + buf.len()]);
    }

    fn write_block(&mut self, address: usize, bytes: &[u8]) {
        self.bytes[address..address + bytes.len()].copy_from_slice(bytes);
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ram_store_round_trip() {
        let mut store = RamStore::new(64);
        store.write_block(10, &[1, 2, 3]);
        let mut buf = [0u8; 3];
        store.read_block(10, &mut buf);
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daq.eeprom");

        let mut store = FileStore::open(&path, 32).unwrap();
        store.write_block(4, &[0xAA, 0xBB]);
        drop(store);

        let reopened = FileStore::open(&path, 32).unwrap();
        let mut buf = [0u8; 2];
        reopened.read_block(4, &mut buf);
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn file_store_pads_short_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daq.eeprom");
        std::fs::write(&path, [1, 2, 3]).unwrap();

        let store = FileStore::open(&path, 8).unwrap();
        assert_eq!(store.capacity(), 8);
        let mut buf = [0u8; 8];
        store.read_block(0, &mut buf);
        assert_eq!(buf, [1, 2, 3, 0, 0, 0, 0, 0]);
    }
}
