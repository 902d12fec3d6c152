//! Channel slots, the dispatch pass and the per-channel control surface.

use alloc::sync::Arc;
use bm_ir::{Channel, ChannelId, LoopMode, PlaybackState, MAX_CHANNELS, MAX_CHANNEL_VOLUME};
use tracing::{debug, trace, warn};

use crate::channel_mask::ChannelMask;

/// The mixer's channel slots together with the playing-channel mask.
///
/// Every control operation validates its index. An out-of-range index is
/// a programming error: it trips a debug assertion, and in release builds
/// the operation does nothing and reports failure.
pub struct Channels<C> {
    slots: [C; MAX_CHANNELS],
    mask: Arc<ChannelMask>,
}

fn slot_index(ch: ChannelId) -> Option<usize> {
    let idx = usize::from(ch);
    if idx < MAX_CHANNELS {
        return Some(idx);
    }
    debug_assert!(idx < MAX_CHANNELS, "channel {ch} out of range");
    warn!(channel = ch, "channel index out of range");
    None
}

impl<C: Channel> Channels<C> {
    /// Create the slots, all stopped, building each channel with `factory`.
    pub fn new(mut factory: impl FnMut(ChannelId) -> C) -> Self {
        Self {
            slots: core::array::from_fn(|i| factory(i as ChannelId)),
            mask: Arc::new(ChannelMask::new()),
        }
    }

    /// The shared playing-channel mask.
    pub fn mask(&self) -> &Arc<ChannelMask> {
        &self.mask
    }

    /// Direct access to a slot's channel.
    pub fn get(&self, ch: ChannelId) -> Option<&C> {
        self.slots.get(usize::from(ch))
    }

    /// Returns true if any channel is playing or paused.
    pub fn is_active(&self) -> bool {
        !self.mask.is_empty()
    }

    /// Mix every playing channel into `dest`, or only advance them when `dest` is `None`.
    ///
    /// Channels that stopped on their own since the last pass have their bit
    /// cleared here. Returns true if any channel produced audio.
    pub fn mix_pass(&mut self, mut dest: Option<&mut [i32]>, frames: usize) -> bool {
        let mut produced = false;

        for ch in self.mask.snapshot() {
            let Some(slot) = self.slots.get_mut(usize::from(ch)) else {
                debug_assert!(false, "mask holds out-of-range channel {ch}");
                continue;
            };

            if slot.is_stopped() {
                self.mask.clear(ch);
                trace!(channel = ch, "channel finished");
                continue;
            }
            if slot.is_paused() {
                continue;
            }

            produced |= slot.mix(dest.as_deref_mut(), frames);
        }

        produced
    }

    /// Start `source` on `ch`. Does nothing if the channel is already playing.
    pub fn play(&mut self, source: C::Source, ch: ChannelId, loop_mode: LoopMode) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        if self.mask.contains(ch) {
            return false;
        }

        self.slots[idx].play(source, loop_mode);
        // Publish only once the slot is fully initialized.
        self.mask.set(ch);
        debug!(channel = ch, ?loop_mode, "play");
        true
    }

    pub fn stop(&mut self, ch: ChannelId) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        self.slots[idx].stop();
        self.mask.clear(ch);
        debug!(channel = ch, "stop");
        true
    }

    /// Stop every channel whose bit is set.
    pub fn stop_all(&mut self) {
        for ch in self.mask.snapshot() {
            if let Some(slot) = self.slots.get_mut(usize::from(ch)) {
                slot.stop();
            }
            self.mask.clear(ch);
        }
    }

    /// Pause `ch`. Only applies to channels that are playing.
    pub fn pause(&mut self, ch: ChannelId) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        if !self.mask.contains(ch) {
            return false;
        }
        self.slots[idx].pause();
        debug!(channel = ch, "pause");
        true
    }

    /// Resume `ch`. Only applies to channels that are playing.
    pub fn resume(&mut self, ch: ChannelId) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        if !self.mask.contains(ch) {
            return false;
        }
        self.slots[idx].resume();
        debug!(channel = ch, "resume");
        true
    }

    pub fn is_playing(&self, ch: ChannelId) -> bool {
        slot_index(ch).is_some() && self.mask.contains(ch)
    }

    pub fn state(&self, ch: ChannelId) -> Option<PlaybackState> {
        slot_index(ch).map(|idx| self.slots[idx].state())
    }

    /// Set the channel volume, clamped to `MAX_CHANNEL_VOLUME`.
    pub fn set_volume(&mut self, ch: ChannelId, volume: u16) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        self.slots[idx].set_volume(volume.min(MAX_CHANNEL_VOLUME));
        true
    }

    pub fn volume(&self, ch: ChannelId) -> Option<u16> {
        slot_index(ch).map(|idx| self.slots[idx].volume())
    }

    pub fn set_speed(&mut self, ch: ChannelId, sample_rate: u32) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        self.slots[idx].set_speed(sample_rate);
        true
    }

    pub fn set_position(&mut self, ch: ChannelId, offset: u32) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        self.slots[idx].set_position(offset);
        true
    }

    pub fn position(&self, ch: ChannelId) -> Option<u32> {
        slot_index(ch).map(|idx| self.slots[idx].position())
    }

    pub fn set_loop(&mut self, ch: ChannelId, loop_mode: LoopMode) -> bool {
        let Some(idx) = slot_index(ch) else { return false };
        self.slots[idx].set_loop(loop_mode);
        true
    }
}
