//! The mixer: block-pull algorithm and channel control surface.

use alloc::boxed::Box;
use alloc::sync::Arc;
use bm_ir::{
    Channel, ChannelId, LoopMode, MixBlock, OutputSink, PlaybackState, SampleObserver,
    SystemVolume, VolumeProvider, BLOCK_SIZE, DEFAULT_SAMPLE_RATE, MAX_VOLUME,
};
use tracing::trace;

use crate::cadence::{micros_to_frames, TrackerCadence};
use crate::channel_mask::ChannelMask;
use crate::channels::Channels;
use crate::finalize::finalize_block;
use crate::tracker::{Tracker, TrackerContext};

/// Mixer construction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixerConfig {
    /// Output rate in frames per second.
    pub sample_rate: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self { sample_rate: DEFAULT_SAMPLE_RATE }
    }
}

/// Where a pull sends its output.
pub enum PullTarget<'a> {
    /// A device sink. `None` while no sink is attached, in which case the
    /// pull is deferred.
    Device(Option<&'a mut dyn OutputSink>),
    /// No draining sink: mix `suggested_frames` anyway and hand the result
    /// to the observer only.
    Headless { suggested_frames: usize },
}

/// What one pull produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PullStats {
    /// Frames finalized (and enqueued, for a device sink).
    pub frames: usize,
    /// Tracker callbacks fired.
    pub callbacks: u32,
}

/// The audio mixer.
///
/// Owns the channel slots, the playing-channel mask and the tracker
/// cadence. `pull_audio` is meant to be called periodically from the
/// audio context; everything else is the control surface.
pub struct Mixer<C: Channel> {
    channels: Channels<C>,
    cadence: TrackerCadence,
    tracker: Option<Box<dyn Tracker<C>>>,
    volume: Arc<dyn VolumeProvider>,
    observer: Option<Box<dyn SampleObserver>>,
    sample_rate: u32,
}

impl<C: Channel> Mixer<C> {
    /// Create a mixer with every slot stopped and the tracker disabled.
    pub fn new(config: MixerConfig, factory: impl FnMut(ChannelId) -> C) -> Self {
        Self {
            channels: Channels::new(factory),
            cadence: TrackerCadence::new(),
            tracker: None,
            volume: Arc::new(SystemVolume::default()),
            observer: None,
            sample_rate: config.sample_rate,
        }
    }

    pub fn with_tracker(mut self, tracker: impl Tracker<C> + 'static) -> Self {
        self.tracker = Some(Box::new(tracker));
        self
    }

    pub fn with_volume(mut self, volume: Arc<dyn VolumeProvider>) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_observer(mut self, observer: impl SampleObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_tracker(&mut self, tracker: Option<Box<dyn Tracker<C>>>) {
        self.tracker = tracker;
    }

    /// Remove and return the tracker, leaving the cadence running.
    pub fn take_tracker(&mut self) -> Option<Box<dyn Tracker<C>>> {
        self.tracker.take()
    }

    pub fn set_observer(&mut self, observer: Option<Box<dyn SampleObserver>>) {
        self.observer = observer;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> &Channels<C> {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut Channels<C> {
        &mut self.channels
    }

    /// Shared handle to the playing-channel mask, for lock-free `is_playing` queries.
    pub fn channel_mask(&self) -> Arc<ChannelMask> {
        Arc::clone(self.channels.mask())
    }

    /// Stop every channel and rewind the tracker.
    pub fn init(&mut self) {
        self.channels.stop_all();
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.reset();
        }
    }

    /// Returns true if any channel is playing or paused.
    pub fn is_active(&self) -> bool {
        self.channels.is_active()
    }

    // --- Control surface ---

    pub fn play(&mut self, source: C::Source, ch: ChannelId, loop_mode: LoopMode) -> bool {
        self.channels.play(source, ch, loop_mode)
    }

    pub fn stop(&mut self, ch: ChannelId) -> bool {
        self.channels.stop(ch)
    }

    pub fn pause(&mut self, ch: ChannelId) -> bool {
        self.channels.pause(ch)
    }

    pub fn resume(&mut self, ch: ChannelId) -> bool {
        self.channels.resume(ch)
    }

    pub fn is_playing(&self, ch: ChannelId) -> bool {
        self.channels.is_playing(ch)
    }

    pub fn state(&self, ch: ChannelId) -> Option<PlaybackState> {
        self.channels.state(ch)
    }

    pub fn set_volume(&mut self, ch: ChannelId, volume: u16) -> bool {
        self.channels.set_volume(ch, volume)
    }

    pub fn volume(&self, ch: ChannelId) -> Option<u16> {
        self.channels.volume(ch)
    }

    pub fn set_speed(&mut self, ch: ChannelId, sample_rate: u32) -> bool {
        self.channels.set_speed(ch, sample_rate)
    }

    pub fn set_position(&mut self, ch: ChannelId, offset: u32) -> bool {
        self.channels.set_position(ch, offset)
    }

    pub fn position(&self, ch: ChannelId) -> Option<u32> {
        self.channels.position(ch)
    }

    pub fn set_loop(&mut self, ch: ChannelId, loop_mode: LoopMode) -> bool {
        self.channels.set_loop(ch, loop_mode)
    }

    /// Fire the tracker every `micros` microseconds of mixed audio. 0 disables it.
    pub fn set_tracker_callback_interval(&mut self, micros: u32) {
        self.cadence.set_interval(micros_to_frames(micros, self.sample_rate));
    }

    /// Tracker interval in frames; 0 when disabled.
    pub fn tracker_interval(&self) -> u32 {
        self.cadence.interval()
    }

    /// Frames until the next tracker callback; 0 when disabled.
    pub fn tracker_countdown(&self) -> u32 {
        self.cadence.countdown()
    }

    // --- Pull ---

    /// Mix as much audio as the target can take.
    pub fn pull_audio(&mut self, target: PullTarget<'_>) -> PullStats {
        #[cfg(feature = "alloc_check")]
        let stats = assert_no_alloc::assert_no_alloc(|| self.pull(target));
        #[cfg(not(feature = "alloc_check"))]
        let stats = self.pull(target);
        stats
    }

    fn pull(&mut self, target: PullTarget<'_>) -> PullStats {
        let mut stats = PullStats::default();

        if !self.channels.is_active() && !self.cadence.is_enabled() {
            return stats;
        }

        let (mut sink, mut remaining) = match target {
            PullTarget::Device(Some(sink)) => {
                let frames = sink.writable_frames();
                (Some(sink), frames)
            }
            PullTarget::Device(None) => return stats,
            PullTarget::Headless { suggested_frames } => (None, suggested_frames),
        };

        // Mixing a fraction of a block would throw away the amortization.
        if remaining < BLOCK_SIZE {
            trace!(available = remaining, "pull deferred");
            return stats;
        }

        let mut block = MixBlock::new();

        while remaining > 0 {
            let frames = BLOCK_SIZE
                .min(remaining)
                .min(self.cadence.frames_until_callback());
            debug_assert!(frames > 0);

            let volume = self.volume.current_volume();
            debug_assert!((0..=MAX_VOLUME).contains(&volume));

            let mixed = if volume != 0 {
                self.channels.mix_pass(Some(block.silence(frames)), frames)
            } else {
                // Muted: keep channel state moving without decoding or mixing.
                self.channels.mix_pass(None, frames);
                false
            };

            // Nothing to play and no tracker clock to keep: let the sink drain.
            if !mixed && !self.cadence.is_enabled() {
                break;
            }

            remaining -= frames;
            stats.frames += frames;

            let out = finalize_block(block.frames(frames), volume);
            if let Some(observer) = self.observer.as_mut() {
                observer.on_samples(&out);
            }
            if let Some(sink) = sink.as_deref_mut() {
                for &sample in &out {
                    sink.enqueue(sample);
                }
            }

            if self.cadence.advance(frames) && self.fire_tracker() {
                stats.callbacks += 1;
            }
        }

        trace!(frames = stats.frames, callbacks = stats.callbacks, "pull");
        stats
    }

    fn fire_tracker(&mut self) -> bool {
        let Some(tracker) = self.tracker.as_mut() else {
            return false;
        };

        let mut ctx = TrackerContext::new(&mut self.channels);
        tracker.on_callback(&mut ctx);

        if let Some(micros) = ctx.into_pending_interval() {
            self.cadence.set_interval(micros_to_frames(micros, self.sample_rate));
        }
        true
    }
}
