//! System-wide output volume.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::audio_traits::VolumeProvider;

/// Full scale of the system volume.
///
/// Unlike channel volumes this is a 16-bit quantity, giving enough range
/// to be very quiet without dropping out completely.
pub const MAX_VOLUME: i32 = 0x10000;

/// `log2(MAX_VOLUME)`.
pub const MAX_VOLUME_LOG2: u32 = 16;

/// Shared, lock-free system volume.
///
/// Written by whoever owns volume control, read by the mixer once per block.
#[derive(Debug)]
pub struct SystemVolume {
    level: AtomicU32,
}

impl SystemVolume {
    /// Create a volume at `level`, clamped to `0..=MAX_VOLUME`.
    pub fn new(level: i32) -> Self {
        Self { level: AtomicU32::new(level.clamp(0, MAX_VOLUME) as u32) }
    }

    pub fn get(&self) -> i32 {
        self.level.load(Ordering::Relaxed) as i32
    }

    /// Set the volume, clamped to `0..=MAX_VOLUME`.
    pub fn set(&self, level: i32) {
        self.level.store(level.clamp(0, MAX_VOLUME) as u32, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.get() == 0
    }
}

impl Default for SystemVolume {
    fn default() -> Self {
        Self::new(MAX_VOLUME)
    }
}

impl VolumeProvider for SystemVolume {
    fn current_volume(&self) -> i32 {
        self.get()
    }
}
