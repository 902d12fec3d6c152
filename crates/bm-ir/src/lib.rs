//! Core types for the blockmix mixer.
//!
//! This crate defines the vocabulary shared by the mixing engine, the
//! output backends and the controller: channel handles and states, the
//! capability traits the engine consumes, the system volume scale and
//! in-memory sample data.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod audio_traits;
mod channel;
mod sample;
mod volume;

pub use audio_buffer::{MixBlock, BLOCK_SIZE};
pub use audio_traits::{Channel, OutputSink, SampleObserver, VolumeProvider};
pub use channel::{
    ChannelId, LoopMode, PlaybackState, DEFAULT_SAMPLE_RATE, MAX_CHANNELS, MAX_CHANNEL_VOLUME,
};
pub use sample::{LoopType, Sample, SampleData, SampleKey, Waveform};
pub use volume::{SystemVolume, MAX_VOLUME, MAX_VOLUME_LOG2};
