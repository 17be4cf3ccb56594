//! Statistics collection for the allocator
//!
//! Feature-gated under the `stats` feature. Counters are updated on the
//! allocation paths and read out through [`Allocator::stats`].
//!
//! [`Allocator::stats`]: crate::allocator::Allocator::stats

/// Allocator statistics
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    /// Bytes currently handed out, measured in whole frames.
    pub live_bytes: usize,
    /// Bytes obtained from the backing page source.
    pub committed_bytes: usize,
    /// Peak of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Allocations served since construction.
    pub total_allocs: u64,
    /// Frames returned since construction.
    pub total_frees: u64,
    /// Frames carved off by split-on-allocate.
    pub frames_split: u64,
    /// Buddy pairs merged on free.
    pub frames_merged: u64,
}

impl HeapStats {
    pub const fn new() -> Self {
        Self {
            live_bytes: 0,
            committed_bytes: 0,
            peak_live_bytes: 0,
            total_allocs: 0,
            total_frees: 0,
            frames_split: 0,
            frames_merged: 0,
        }
    }

    /// Update the peak if current live bytes exceed it.
    pub fn update_peak(&mut self) {
        if self.live_bytes > self.peak_live_bytes {
            self.peak_live_bytes = self.live_bytes;
        }
    }

    /// Live-to-committed ratio (1.0 = every committed byte is handed out).
    pub fn utilisation(&self) -> f64 {
        if self.committed_bytes == 0 {
            1.0
        } else {
            self.live_bytes as f64 / self.committed_bytes as f64
        }
    }
}
