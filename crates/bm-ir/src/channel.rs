//! Channel handles, lifecycle states and per-channel limits.

/// Index of a channel slot. The index is the only handle callers hold.
pub type ChannelId = u8;

/// Number of channel slots owned by a mixer.
pub const MAX_CHANNELS: usize = 8;

/// Upper bound of a channel's own volume (unity gain).
pub const MAX_CHANNEL_VOLUME: u16 = 256;

/// Output rate of the mixer, in frames per second.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

// The playing-channel mask is a single 32-bit word.
const _: () = assert!(MAX_CHANNELS <= 32);

/// Playback lifecycle of a channel slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Returns true for both `Playing` and `Paused`.
    pub fn is_active(self) -> bool {
        self != PlaybackState::Stopped
    }
}

/// How a channel behaves when it reaches the end of its stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopMode {
    /// Use the loop settings stored with the stream itself.
    #[default]
    Default,
    /// Play once and stop.
    Once,
    /// Loop forever.
    Repeat,
}
