//! Capability traits consumed by the mixing engine.

use crate::channel::{LoopMode, PlaybackState};

/// A single playback channel.
///
/// The engine owns one implementor per channel slot and drives it through
/// this capability set. How the channel produces its samples (decoding,
/// streaming, resampling) is entirely its own business.
pub trait Channel {
    /// Stream descriptor handed to `play`.
    type Source;

    /// Start playing `source` from its beginning.
    fn play(&mut self, source: Self::Source, loop_mode: LoopMode);

    /// Mix `frames` frames.
    ///
    /// With a destination, the channel adds its contribution to the
    /// existing contents (no clipping). With `None`, it only advances its
    /// position and loop state. Returns true if any audio was produced.
    fn mix(&mut self, dest: Option<&mut [i32]>, frames: usize) -> bool;

    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);

    /// Current lifecycle state.
    fn state(&self) -> PlaybackState;

    fn is_stopped(&self) -> bool {
        self.state() == PlaybackState::Stopped
    }

    fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    /// Channel volume, `0..=MAX_CHANNEL_VOLUME`.
    fn volume(&self) -> u16;
    fn set_volume(&mut self, volume: u16);

    /// Playback rate of the stream, in frames per second.
    fn set_speed(&mut self, sample_rate: u32);

    /// Playback offset, in stream frames.
    fn position(&self) -> u32;
    fn set_position(&mut self, offset: u32);

    fn set_loop(&mut self, loop_mode: LoopMode);
}

/// Destination for finalized output samples.
pub trait OutputSink {
    /// Number of frames that can be enqueued right now.
    fn writable_frames(&self) -> usize;

    /// Enqueue one finalized sample.
    fn enqueue(&mut self, sample: i16);
}

/// Source of the system-wide output volume.
pub trait VolumeProvider: Send + Sync {
    /// Current volume, `0..=MAX_VOLUME`.
    fn current_volume(&self) -> i32;
}

/// Observer notified of every finalized block, whether or not it reaches a sink.
pub trait SampleObserver: Send {
    fn on_samples(&mut self, samples: &[i16]);
}
