use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::{KvEngine, MemoryEngine, WriteBatch};
use crate::errors::Result;

/// In-memory engine that counts how often it is read and written.
#[derive(Debug, Default)]
pub struct CountingEngine {
    inner: MemoryEngine,
    gets: AtomicUsize,
    scans: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.gets.load(Ordering::SeqCst) + self.scans.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.gets.store(0, Ordering::SeqCst);
        self.scans.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }
}

impl KvEngine for CountingEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.inner.scan_prefix(prefix)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(batch)
    }
}
