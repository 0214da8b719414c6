//! Lightweight stream handle

use crate::pool::SlotPool;
use std::fmt;
use std::sync::Arc;

/// One logical audio source multiplexed onto the shared output
///
/// Owns its pool slot: dropping the handle (or calling [`LwStream::destroy`])
/// returns the slot to the pool, waiting for an in-flight pull to finish.
pub struct LwStream {
    pool: Arc<SlotPool>,
    index: usize,
    name: String,
    latency_ms: u32,
}

impl LwStream {
    pub(crate) fn new(pool: Arc<SlotPool>, index: usize, name: &str, latency_ms: u32) -> Self {
        Self {
            pool,
            index,
            name: name.to_string(),
            latency_ms,
        }
    }

    /// Start playback. Starting a running stream is a no-op.
    pub fn start(&self) {
        if self.pool.start(self.index) {
            log::debug!("Stream '{}' (slot {}) started", self.name, self.index);
        }
    }

    /// Stop playback. Stopping a stopped stream is a no-op.
    ///
    /// A pull already in progress completes; later passes skip this stream.
    pub fn stop(&self) {
        if self.pool.stop(self.index) {
            log::debug!("Stream '{}' (slot {}) stopped", self.name, self.index);
        }
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running(self.index)
    }

    /// Frames of this stream consumed by the mixer
    pub fn position(&self) -> u64 {
        self.pool.position(self.index)
    }

    /// Pool slot backing this stream
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    /// Destroy the stream and free its slot
    pub fn destroy(self) {}
}

impl Drop for LwStream {
    fn drop(&mut self) {
        self.pool.release(self.index);
        log::debug!("Stream '{}' released slot {}", self.name, self.index);
    }
}

impl fmt::Debug for LwStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LwStream")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("state", &self.pool.state(self.index))
            .field("latency_ms", &self.latency_ms)
            .finish()
    }
}
