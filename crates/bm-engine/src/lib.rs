//! Block-pull mixing engine for blockmix.
//!
//! Mixes up to eight channels into a 16-bit mono stream, applies the
//! system volume and drives a tracker callback on an exact frame cadence.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod cadence;
mod channel_mask;
mod channels;
mod finalize;
mod mixer;
mod pcm_channel;
mod tracker;

pub use cadence::{micros_to_frames, TrackerCadence};
pub use channel_mask::{ChannelMask, SetBits};
pub use channels::Channels;
pub use finalize::{finalize_block, finalize_sample, OutputBlock};
pub use mixer::{Mixer, MixerConfig, PullStats, PullTarget};
pub use pcm_channel::PcmChannel;
pub use tracker::{FnTracker, Tracker, TrackerContext};
