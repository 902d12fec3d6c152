//! End-to-end pull scenarios: a real channel, a ring sink and a tracker.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bm_audio::{ring, RingSink};
use bm_engine::{FnTracker, Mixer, MixerConfig, PcmChannel, PullStats, PullTarget, TrackerContext};
use bm_ir::{LoopMode, OutputSink, Sample, SampleObserver, SystemVolume, BLOCK_SIZE, MAX_VOLUME};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

const RATE: u32 = 16_000;

fn mixer() -> Mixer<PcmChannel> {
    Mixer::new(MixerConfig { sample_rate: RATE }, |_| PcmChannel::new(RATE))
}

fn counting_tracker(count: &Arc<AtomicU32>) -> FnTracker<impl FnMut(&mut TrackerContext<'_, PcmChannel>) + Send> {
    let count = Arc::clone(count);
    FnTracker::new(move |_: &mut TrackerContext<'_, PcmChannel>| {
        count.fetch_add(1, Ordering::Relaxed);
    })
}

fn pull(mixer: &mut Mixer<PcmChannel>, sink: &mut RingSink) -> PullStats {
    mixer.pull_audio(PullTarget::Device(Some(sink)))
}

fn drain(consumer: &mut HeapCons<i16>) -> Vec<i16> {
    std::iter::from_fn(|| consumer.try_pop()).collect()
}

fn constant(level: i16, frames: usize) -> Arc<Sample> {
    Arc::new(Sample::from_pcm16("c", vec![level; frames], RATE))
}

#[test]
fn callbacks_land_on_exact_frame_boundaries() {
    let fired = Arc::new(AtomicU32::new(0));
    let mut mixer = mixer().with_tracker(counting_tracker(&fired));
    // 6250us at 16kHz is exactly 100 frames
    mixer.set_tracker_callback_interval(6_250);
    assert_eq!(mixer.tracker_interval(), 100);

    let (mut sink, _consumer) = ring(250);
    let stats = pull(&mut mixer, &mut sink);
    assert_eq!(stats, PullStats { frames: 250, callbacks: 2 });
    assert_eq!(fired.load(Ordering::Relaxed), 2);
    assert_eq!(mixer.tracker_countdown(), 50);
}

#[test]
fn irregular_drain_keeps_cadence_exact() {
    let fired = Arc::new(AtomicU32::new(0));
    let mut mixer = mixer().with_tracker(counting_tracker(&fired));
    mixer.set_tracker_callback_interval(2_500); // 40 frames
    mixer.play(constant(300, 100_000), 0, LoopMode::Once);

    let (mut sink, mut consumer) = ring(700);
    let mut total = 0;
    for take in [700, 13, 250, 31, 32, 599, 64, 400] {
        total += pull(&mut mixer, &mut sink).frames;
        let drained: Vec<_> = std::iter::from_fn(|| consumer.try_pop()).take(take).collect();
        assert!(drained.iter().all(|&s| s == 300));
    }
    assert_eq!(fired.load(Ordering::Relaxed) as usize, total / 40);
    assert_eq!(mixer.tracker_countdown() as usize, 40 - total % 40);
}

#[test]
fn small_sink_space_defers_the_pull() {
    let mut mixer = mixer();
    mixer.play(constant(300, 1000), 0, LoopMode::Once);

    let (mut sink, mut consumer) = ring(100);
    assert_eq!(pull(&mut mixer, &mut sink).frames, 100);

    // 20 frames of room is less than a block: nothing happens.
    let _ = std::iter::from_fn(|| consumer.try_pop()).take(20).count();
    assert_eq!(sink.writable_frames(), 20);
    assert_eq!(pull(&mut mixer, &mut sink).frames, 0);
    assert_eq!(mixer.position(0), Some(100));

    drain(&mut consumer);
    assert_eq!(pull(&mut mixer, &mut sink).frames, 100);
    assert_eq!(mixer.position(0), Some(200));
}

#[test]
fn stream_end_clears_the_channel_on_the_next_pull() {
    let mut mixer = mixer();
    mixer.play(constant(1234, 10), 5, LoopMode::Once);

    let (mut sink, mut consumer) = ring(BLOCK_SIZE);
    pull(&mut mixer, &mut sink);
    let out = drain(&mut consumer);
    assert_eq!(&out[..10], &[1234; 10]);
    assert!(out[10..].iter().all(|&s| s == 0));
    assert!(mixer.is_playing(5));

    assert_eq!(pull(&mut mixer, &mut sink).frames, 0);
    assert!(!mixer.is_playing(5));
    assert!(!mixer.is_active());
}

#[test]
fn mute_keeps_the_clock_and_channels_moving() {
    let volume = Arc::new(SystemVolume::new(0));
    let fired = Arc::new(AtomicU32::new(0));
    let mut mixer = mixer()
        .with_volume(volume.clone())
        .with_tracker(counting_tracker(&fired));
    mixer.set_tracker_callback_interval(5_000); // 80 frames
    mixer.play(constant(5000, 10_000), 0, LoopMode::Once);

    let (mut sink, mut consumer) = ring(320);
    assert_eq!(pull(&mut mixer, &mut sink).frames, 320);
    assert!(drain(&mut consumer).iter().all(|&s| s == 0));
    assert_eq!(fired.load(Ordering::Relaxed), 4);
    assert_eq!(mixer.position(0), Some(320));

    volume.set(MAX_VOLUME);
    pull(&mut mixer, &mut sink);
    assert!(drain(&mut consumer).iter().all(|&s| s == 5000));
}

#[test]
fn system_volume_change_applies_at_the_next_block() {
    struct Halve(Arc<SystemVolume>);
    impl SampleObserver for Halve {
        fn on_samples(&mut self, _: &[i16]) {
            self.0.set(MAX_VOLUME / 2);
        }
    }

    let volume = Arc::new(SystemVolume::default());
    let mut mixer = mixer()
        .with_volume(volume.clone())
        .with_observer(Halve(volume.clone()));
    mixer.play(constant(1000, 1000), 0, LoopMode::Once);

    let (mut sink, mut consumer) = ring(2 * BLOCK_SIZE);
    pull(&mut mixer, &mut sink);
    let out = drain(&mut consumer);
    assert!(out[..BLOCK_SIZE].iter().all(|&s| s == 1000));
    assert!(out[BLOCK_SIZE..].iter().all(|&s| s == 500));
}

#[test]
fn headless_output_goes_to_the_observer() {
    struct Collect(Arc<Mutex<Vec<i16>>>);
    impl SampleObserver for Collect {
        fn on_samples(&mut self, samples: &[i16]) {
            self.0.lock().unwrap().extend_from_slice(samples);
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut mixer = mixer().with_observer(Collect(Arc::clone(&seen)));
    mixer.play(constant(-700, 1000), 7, LoopMode::Once);

    let stats = mixer.pull_audio(PullTarget::Headless { suggested_frames: 160 });
    assert_eq!(stats.frames, 160);
    assert_eq!(*seen.lock().unwrap(), vec![-700; 160]);
}

#[test]
fn channel_mask_is_readable_from_another_thread() {
    let mut mixer = mixer();
    let mask = mixer.channel_mask();
    mixer.play(constant(1, 1000), 3, LoopMode::Once);

    let seen = std::thread::spawn(move || mask.contains(3)).join().unwrap();
    assert!(seen);
}

#[test]
fn tracker_drives_channels_through_the_context() {
    let tone = constant(900, 10_000);
    let mut mixer = mixer().with_tracker(FnTracker::new(move |ctx: &mut TrackerContext<'_, PcmChannel>| {
        let channels = ctx.channels();
        if channels.is_playing(0) {
            channels.stop(0);
        } else {
            channels.play(Arc::clone(&tone), 0, LoopMode::Once);
        }
    }));
    mixer.set_tracker_callback_interval(4_000); // 64 frames

    let (mut sink, mut consumer) = ring(256);
    pull(&mut mixer, &mut sink);
    let out = drain(&mut consumer);
    assert!(out[..64].iter().all(|&s| s == 0));
    assert!(out[64..128].iter().all(|&s| s == 900));
    assert!(out[128..192].iter().all(|&s| s == 0));
    assert!(out[192..].iter().all(|&s| s == 900));
}
