//! Offline rendering: drive the pull faster than real time into memory.

use bm_engine::{Mixer, PullTarget};
use bm_ir::{Channel, OutputSink, BLOCK_SIZE};
use tracing::debug;

/// Frames offered to the mixer per pull, like a device ring of this size.
const CHUNK_FRAMES: usize = 1024;

/// Sink that appends into a preallocated buffer up to `limit` samples.
struct CaptureSink<'a> {
    out: &'a mut Vec<i16>,
    limit: usize,
}

impl OutputSink for CaptureSink<'_> {
    fn writable_frames(&self) -> usize {
        self.limit.saturating_sub(self.out.len())
    }

    fn enqueue(&mut self, sample: i16) {
        self.out.push(sample);
    }
}

/// Render up to `max_frames` frames.
///
/// Stops early once the mixer has nothing left to do: every channel has
/// finished and the tracker clock is off.
pub fn render<C: Channel>(mixer: &mut Mixer<C>, max_frames: usize) -> Vec<i16> {
    // Pulls work in whole blocks; round up and trim afterwards.
    let limit = max_frames.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut out = Vec::with_capacity(limit);

    while out.len() < limit {
        let chunk_end = (out.len() + CHUNK_FRAMES).min(limit);
        let mut sink = CaptureSink { out: &mut out, limit: chunk_end };
        let stats = mixer.pull_audio(PullTarget::Device(Some(&mut sink)));
        if stats.frames == 0 {
            break;
        }
    }

    out.truncate(max_frames);
    debug!(frames = out.len(), requested = max_frames, "offline render");
    out
}
