//! Peak level observer.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use bm_ir::SampleObserver;

/// Records the peak magnitude of each finalized block.
#[derive(Debug, Default)]
pub struct PeakMeter {
    level: Arc<AtomicU16>,
}

/// Read side of a [`PeakMeter`], safe to poll from any thread.
#[derive(Clone, Debug)]
pub struct PeakLevel(Arc<AtomicU16>);

impl PeakMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> PeakLevel {
        PeakLevel(Arc::clone(&self.level))
    }
}

impl PeakLevel {
    /// Peak of the most recent block, `0..=32768`.
    pub fn get(&self) -> u16 {
        self.0.load(Ordering::Relaxed)
    }
}

impl SampleObserver for PeakMeter {
    fn on_samples(&mut self, samples: &[i16]) {
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        self.level.store(peak, Ordering::Relaxed);
    }
}
