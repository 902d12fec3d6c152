//! PcmChannel: resampling playback of an in-memory sample.

use alloc::sync::Arc;
use bm_ir::{Channel, LoopMode, PlaybackState, Sample, DEFAULT_SAMPLE_RATE, MAX_CHANNEL_VOLUME};

/// Plays a shared [`Sample`] at an arbitrary rate with linear interpolation.
#[derive(Clone, Debug)]
pub struct PcmChannel {
    sample: Option<Arc<Sample>>,
    /// Read position (16.16 fixed-point, in sample frames).
    position: u64,
    /// Position step per output frame (16.16 fixed-point).
    increment: u64,
    /// Playback rate in frames per second.
    speed: u32,
    output_rate: u32,
    volume: u16,
    loop_mode: LoopMode,
    state: PlaybackState,
}

impl PcmChannel {
    /// Create a stopped channel for a mixer running at `output_rate`.
    pub fn new(output_rate: u32) -> Self {
        let mut channel = Self {
            sample: None,
            position: 0,
            increment: 0,
            speed: DEFAULT_SAMPLE_RATE,
            output_rate: output_rate.max(1),
            volume: MAX_CHANNEL_VOLUME,
            loop_mode: LoopMode::Default,
            state: PlaybackState::Stopped,
        };
        channel.set_speed(DEFAULT_SAMPLE_RATE);
        channel
    }

    pub fn sample(&self) -> Option<&Arc<Sample>> {
        self.sample.as_ref()
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }
}

/// Frame range to repeat, if the channel loops at all.
fn loop_range(sample: &Sample, loop_mode: LoopMode) -> Option<(u64, u64)> {
    let range = match loop_mode {
        LoopMode::Once => None,
        LoopMode::Default if sample.has_loop() => Some((sample.loop_start, sample.loop_end)),
        LoopMode::Default => None,
        LoopMode::Repeat if sample.has_loop() => Some((sample.loop_start, sample.loop_end)),
        LoopMode::Repeat => Some((0, sample.len() as u32)),
    };
    let len = sample.len() as u64;
    range
        .map(|(start, end)| (u64::from(start), u64::from(end).min(len)))
        .filter(|(start, end)| end > start)
}

impl Channel for PcmChannel {
    type Source = Arc<Sample>;

    fn play(&mut self, sample: Arc<Sample>, loop_mode: LoopMode) {
        self.speed = sample.sample_rate;
        self.increment = (u64::from(self.speed) << 16) / u64::from(self.output_rate);
        self.sample = Some(sample);
        self.position = 0;
        self.loop_mode = loop_mode;
        self.state = PlaybackState::Playing;
    }

    fn mix(&mut self, mut dest: Option<&mut [i32]>, frames: usize) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let Some(sample) = self.sample.as_deref() else {
            self.state = PlaybackState::Stopped;
            return false;
        };

        let looping = loop_range(sample, self.loop_mode);
        let end = match looping {
            Some((_, loop_end)) => loop_end,
            None => sample.len() as u64,
        };
        debug_assert!(dest.as_ref().map_or(true, |d| d.len() >= frames), "destination shorter than frames");
        let volume = i32::from(self.volume);
        let mut produced = false;

        for i in 0..frames {
            if self.position >> 16 >= end {
                match looping {
                    Some((start, loop_end)) => {
                        let span = (loop_end - start) << 16;
                        self.position = (start << 16) + (self.position - (start << 16)) % span;
                    }
                    None => {
                        self.state = PlaybackState::Stopped;
                        break;
                    }
                }
            }

            if let Some(slot) = dest.as_deref_mut().and_then(|d| d.get_mut(i)) {
                let value = i32::from(sample.data.get_interpolated(self.position));
                *slot += (value * volume) >> 8;
            }
            self.position += self.increment;
            produced = true;
        }

        if looping.is_none() && self.position >> 16 >= end {
            self.state = PlaybackState::Stopped;
        }
        produced
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn volume(&self) -> u16 {
        self.volume
    }

    fn set_volume(&mut self, volume: u16) {
        self.volume = volume.min(MAX_CHANNEL_VOLUME);
    }

    fn set_speed(&mut self, sample_rate: u32) {
        self.speed = sample_rate;
        self.increment = (u64::from(sample_rate) << 16) / u64::from(self.output_rate);
    }

    fn position(&self) -> u32 {
        (self.position >> 16).min(u64::from(u32::MAX)) as u32
    }

    fn set_position(&mut self, offset: u32) {
        self.position = u64::from(offset) << 16;
    }

    fn set_loop(&mut self, loop_mode: LoopMode) {
        self.loop_mode = loop_mode;
    }
}
