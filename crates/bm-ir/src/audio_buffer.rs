//! Fixed-size mixing block.

/// Frames mixed per channel dispatch.
///
/// Small enough to live on the stack of the pull, large enough that the
/// per-channel dispatch cost is amortized over many frames.
pub const BLOCK_SIZE: usize = 32;

/// A block of mono accumulator samples.
///
/// Channels sum into the block in place, so values are kept as `i32` and
/// may exceed the 16-bit range until the block is finalized.
#[derive(Clone, Debug)]
pub struct MixBlock {
    data: [i32; BLOCK_SIZE],
}

impl Default for MixBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl MixBlock {
    /// Create a silent block.
    pub const fn new() -> Self {
        Self { data: [0; BLOCK_SIZE] }
    }

    /// Zero the first `frames` samples and return them for mixing.
    ///
    /// `frames` is clamped to `BLOCK_SIZE`.
    pub fn silence(&mut self, frames: usize) -> &mut [i32] {
        let out = self.frames_mut(frames);
        out.fill(0);
        out
    }

    /// The first `frames` samples.
    pub fn frames(&self, frames: usize) -> &[i32] {
        &self.data[..frames.min(BLOCK_SIZE)]
    }

    /// Mutable access to the first `frames` samples.
    pub fn frames_mut(&mut self, frames: usize) -> &mut [i32] {
        &mut self.data[..frames.min(BLOCK_SIZE)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_silent() {
        let block = MixBlock::new();
        assert!(block.frames(BLOCK_SIZE).iter().all(|&s| s == 0));
    }

    #[test]
    fn silence_clears_only_requested_frames() {
        let mut block = MixBlock::new();
        block.frames_mut(BLOCK_SIZE).fill(7);
        let cleared = block.silence(4);
        assert_eq!(cleared, &[0, 0, 0, 0]);
        assert_eq!(block.frames(5)[4], 7);
    }

    #[test]
    fn oversized_request_is_clamped() {
        let mut block = MixBlock::new();
        assert_eq!(block.frames_mut(BLOCK_SIZE * 2).len(), BLOCK_SIZE);
    }
}
