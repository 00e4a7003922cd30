//! Size-aware pool of reusable upload buffers.
//!
//! The pool samples how large each buffer really got: the size the caller
//! asked for or the bytes written into it, whichever is larger. Every
//! `calibration_threshold` samples it recomputes its target buffer size from
//! that window (maximum or mean). Empty buffers are not sampled, so the
//! target never collapses to zero. Buffers go back to the pool when their
//! [`PooledBuffer`] guard is dropped, on every exit path.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;

/// How the window of requested sizes becomes the next target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolAggregate {
    #[default]
    Max,
    Mean,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub name: String,
    pub default_size: usize,
    pub calibration_threshold: usize,
    pub aggregate: PoolAggregate,
    pub tolerance: f64,
    /// Idle buffers kept at most.
    pub max_idle: usize,
}

impl PoolSettings {
    pub fn new(name: impl Into<String>, default_size: usize) -> Self {
        Self {
            name: name.into(),
            default_size,
            calibration_threshold: 1024,
            aggregate: PoolAggregate::Max,
            tolerance: 0.5,
            max_idle: 16,
        }
    }

    pub fn from_config(name: impl Into<String>, server: &ServerConfig) -> Self {
        Self {
            name: name.into(),
            default_size: server.upload_buffer_size,
            calibration_threshold: server.buffer_pool_calib_threshold.max(1),
            aggregate: server.buffer_pool_aggregate,
            tolerance: server.buffer_pool_tolerance,
            max_idle: server.concurrency.max(1),
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.calibration_threshold = threshold.max(1);
        self
    }

    pub fn with_aggregate(mut self, aggregate: PoolAggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }
}

/// Point-in-time counters, used by the memory task and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub target: usize,
    pub idle: usize,
    pub idle_bytes: usize,
    pub acquisitions: u64,
    pub reused: u64,
    pub allocated: u64,
    pub discarded: u64,
    pub calibrations: u64,
}

struct PoolState {
    idle: Vec<Vec<u8>>,
    target: usize,
    window_len: usize,
    window_max: usize,
    window_sum: usize,
    stats: PoolStats,
}

impl PoolState {
    fn sample(&mut self, size: usize, settings: &PoolSettings) {
        if size == 0 {
            return;
        }
        self.window_len += 1;
        self.window_max = self.window_max.max(size);
        self.window_sum = self.window_sum.saturating_add(size);

        if self.window_len >= settings.calibration_threshold {
            self.target = match settings.aggregate {
                PoolAggregate::Max => self.window_max,
                PoolAggregate::Mean => self.window_sum / self.window_len,
            };
            self.window_len = 0;
            self.window_max = 0;
            self.window_sum = 0;
            self.stats.calibrations += 1;
        }
    }
}

pub struct BufferPool {
    settings: PoolSettings,
    state: Mutex<PoolState>,
}

impl BufferPool {
    pub fn new(settings: PoolSettings) -> Arc<Self> {
        let target = settings.default_size;
        Arc::new(Self {
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(settings.max_idle),
                target,
                window_len: 0,
                window_max: 0,
                window_sum: 0,
                stats: PoolStats {
                    target,
                    ..PoolStats::default()
                },
            }),
            settings,
        })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// A cleared buffer with capacity of at least `max(expected, target)`.
    /// Never fails; allocation happens outside the lock.
    pub fn acquire(self: &Arc<Self>, expected: usize) -> PooledBuffer {
        let (candidate, want) = {
            let mut state = self.state.lock();
            state.stats.acquisitions += 1;
            let want = expected.max(state.target);
            let candidate = match state.idle.iter().position(|b| b.capacity() >= want) {
                Some(i) => Some(state.idle.swap_remove(i)),
                None => state.idle.pop(),
            };
            match &candidate {
                Some(b) if b.capacity() >= want => state.stats.reused += 1,
                _ => state.stats.allocated += 1,
            }
            (candidate, want)
        };

        let buf = match candidate {
            Some(mut b) => {
                if b.capacity() < want {
                    b.reserve_exact(want);
                }
                b
            }
            None => Vec::with_capacity(want),
        };

        PooledBuffer {
            buf,
            expected,
            pool: Arc::clone(self),
        }
    }

    fn release(&self, mut buf: Vec<u8>, expected: usize) {
        let used = expected.max(buf.len());
        buf.clear();
        let mut state = self.state.lock();
        state.sample(used, &self.settings);
        let limit = (state.target as f64 * (1.0 + self.settings.tolerance)) as usize;
        if buf.capacity() > limit || state.idle.len() >= self.settings.max_idle {
            state.stats.discarded += 1;
            return;
        }
        state.idle.push(buf);
    }

    /// Drop every idle buffer. Returns the bytes handed back to the allocator.
    pub fn trim(&self) -> usize {
        let drained: Vec<Vec<u8>> = {
            let mut state = self.state.lock();
            std::mem::take(&mut state.idle)
        };
        drained.iter().map(Vec::capacity).sum()
    }

    pub fn target(&self) -> usize {
        self.state.lock().target
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            target: state.target,
            idle: state.idle.len(),
            idle_bytes: state.idle.iter().map(Vec::capacity).sum(),
            ..state.stats
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("name", &self.settings.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Exclusive use of one pooled buffer. Returned to its pool on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    expected: usize,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(buf, self.expected);
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .finish()
    }
}
