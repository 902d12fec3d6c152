//! In-memory PCM sample data.

use alloc::vec::Vec;
use arrayvec::ArrayString;
use core::f32::consts::TAU;

use crate::channel::DEFAULT_SAMPLE_RATE;

slotmap::new_key_type! {
    /// Key for referencing samples in a controller's sample bank.
    pub struct SampleKey;
}

/// A sample definition.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<26>,
    /// Audio data
    pub data: SampleData,
    /// Loop start position (in frames)
    pub loop_start: u32,
    /// Loop end position (in frames)
    pub loop_end: u32,
    /// Loop type used when a channel plays with `LoopMode::Default`
    pub loop_type: LoopType,
    /// Native playback rate in Hz
    pub sample_rate: u32,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono16(Vec::new()),
            loop_start: 0,
            loop_end: 0,
            loop_type: LoopType::None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Create a sample from 16-bit mono PCM.
    pub fn from_pcm16(name: &str, data: Vec<i16>, sample_rate: u32) -> Self {
        let mut sample = Self::new(name);
        sample.data = SampleData::Mono16(data);
        sample.sample_rate = sample_rate;
        sample
    }

    /// Synthesize a tone with an exponential decay.
    ///
    /// `decay` is the number of e-foldings over the whole sample; 0 keeps
    /// a constant amplitude.
    pub fn tone(
        name: &str,
        waveform: Waveform,
        frequency: f32,
        sample_rate: u32,
        frames: usize,
        decay: f32,
    ) -> Self {
        let rate = sample_rate as f32;
        let data = (0..frames)
            .map(|i| {
                let cycles = i as f32 / rate * frequency;
                let phase = cycles - libm::floorf(cycles);
                let env = if decay > 0.0 {
                    libm::expf(-decay * i as f32 / frames as f32)
                } else {
                    1.0
                };
                let value = match waveform {
                    Waveform::Sine => libm::sinf(phase * TAU),
                    Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
                    Waveform::Saw => 2.0 * phase - 1.0,
                };
                (value * env * 24_000.0) as i16
            })
            .collect();
        Self::from_pcm16(name, data, sample_rate)
    }

    /// Loop the whole sample forward.
    pub fn looped(mut self) -> Self {
        self.loop_start = 0;
        self.loop_end = self.len() as u32;
        self.loop_type = LoopType::Forward;
        self
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample has a loop.
    pub fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None && self.loop_end > self.loop_start
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// 8-bit mono samples
    Mono8(Vec<i8>),
    /// 16-bit mono samples
    Mono16(Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a sample value at position (as i16). Out of range reads are silent.
    pub fn get(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
        }
    }

    /// Get a linearly interpolated sample value.
    ///
    /// `pos_fixed` is a 16.16 fixed-point position.
    pub fn get_interpolated(&self, pos_fixed: u64) -> i16 {
        let idx = (pos_fixed >> 16) as usize;
        let frac = (pos_fixed & 0xFFFF) as i64;

        let a = self.get(idx) as i64;
        let b = self.get(idx + 1) as i64;

        (a + (((b - a) * frac) >> 16)) as i16
    }
}

/// Sample loop type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// No loop
    #[default]
    None,
    /// Forward loop
    Forward,
}

/// Waveforms for synthesized tones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
}
