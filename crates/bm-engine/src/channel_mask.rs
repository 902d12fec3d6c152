//! Lock-free set of playing channels.

use core::sync::atomic::{AtomicU32, Ordering};

use bm_ir::{ChannelId, MAX_CHANNELS};

/// One bit per channel slot; a bit is set while the channel is playing or paused.
///
/// This is the only state the pull reads to decide which slots to visit.
/// Set and clear are single atomic read-modify-write operations, so a
/// control operation on one channel never disturbs another channel's bit.
#[derive(Debug, Default)]
pub struct ChannelMask {
    bits: AtomicU32,
}

impl ChannelMask {
    pub const fn new() -> Self {
        Self { bits: AtomicU32::new(0) }
    }

    fn bit(ch: ChannelId) -> u32 {
        debug_assert!((ch as usize) < MAX_CHANNELS);
        1 << ch
    }

    pub fn set(&self, ch: ChannelId) {
        self.bits.fetch_or(Self::bit(ch), Ordering::Release);
    }

    pub fn clear(&self, ch: ChannelId) {
        self.bits.fetch_and(!Self::bit(ch), Ordering::Release);
    }

    pub fn contains(&self, ch: ChannelId) -> bool {
        self.bits.load(Ordering::Acquire) & Self::bit(ch) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.load(Ordering::Acquire) == 0
    }

    /// Take a snapshot of the mask as a sequence of channel indices.
    pub fn snapshot(&self) -> SetBits {
        SetBits(self.bits.load(Ordering::Acquire))
    }
}

/// Channel indices of the set bits in a mask snapshot, highest index first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetBits(u32);

impl SetBits {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Bits not yet yielded.
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl Iterator for SetBits {
    type Item = ChannelId;

    fn next(&mut self) -> Option<ChannelId> {
        if self.0 == 0 {
            return None;
        }
        let idx = u32::BITS - 1 - self.0.leading_zeros();
        self.0 &= !(1 << idx);
        Some(idx as ChannelId)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SetBits {}
