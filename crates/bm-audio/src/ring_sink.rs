//! Lock-free output sink over a single-producer ring buffer.

use bm_ir::OutputSink;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Producer half of the mixer-to-device ring.
pub struct RingSink {
    producer: HeapProd<i16>,
    dropped: u64,
}

/// Create a ring of `capacity` frames and return both halves.
pub fn ring(capacity: usize) -> (RingSink, HeapCons<i16>) {
    let (producer, consumer) = HeapRb::<i16>::new(capacity.max(1)).split();
    (RingSink { producer, dropped: 0 }, consumer)
}

impl RingSink {
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    /// Samples discarded because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl OutputSink for RingSink {
    fn writable_frames(&self) -> usize {
        self.producer.vacant_len()
    }

    fn enqueue(&mut self, sample: i16) {
        if self.producer.try_push(sample).is_err() {
            self.dropped += 1;
        }
    }
}
