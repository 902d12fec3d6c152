//! Tracker callback cadence, counted in output frames.

use tracing::{debug, warn};

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Frame countdown to the next tracker callback.
///
/// `interval == 0` disables the callback. While enabled, the stored
/// countdown is always in `1..=interval`; reaching zero reloads it in the
/// same step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerCadence {
    interval: u32,
    countdown: u32,
}

/// Convert a callback period in microseconds to whole frames at `sample_rate`.
///
/// A nonzero period never rounds down to zero (which would mean "disabled");
/// it is raised to one frame instead.
pub fn micros_to_frames(micros: u32, sample_rate: u32) -> u32 {
    let frames = u64::from(micros) * u64::from(sample_rate) / MICROS_PER_SECOND;
    debug_assert!(micros == 0 || frames > 0, "tracker interval of {micros}us is below one frame");
    if micros > 0 && frames == 0 {
        warn!(micros, sample_rate, "tracker interval below one frame, using 1");
        return 1;
    }
    frames.min(u64::from(u32::MAX)) as u32
}

impl TrackerCadence {
    pub const fn new() -> Self {
        Self { interval: 0, countdown: 0 }
    }

    /// Set the interval in frames and restart the countdown.
    pub fn set_interval(&mut self, frames: u32) {
        self.interval = frames;
        self.countdown = frames;
        debug!(interval = frames, "tracker cadence");
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Frames left before the next callback; 0 while disabled.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn is_enabled(&self) -> bool {
        self.interval != 0
    }

    /// Upper bound on the next block so it ends exactly on a callback boundary.
    pub fn frames_until_callback(&self) -> usize {
        if self.is_enabled() {
            self.countdown as usize
        } else {
            usize::MAX
        }
    }

    /// Count `frames` of elapsed mix time. Returns true when a callback is due.
    ///
    /// `frames` must not cross a boundary; callers size their blocks with
    /// `frames_until_callback`.
    pub fn advance(&mut self, frames: usize) -> bool {
        if !self.is_enabled() {
            return false;
        }
        debug_assert!(frames <= self.countdown as usize);
        self.countdown -= frames as u32;
        if self.countdown == 0 {
            self.countdown = self.interval;
            return true;
        }
        false
    }
}
