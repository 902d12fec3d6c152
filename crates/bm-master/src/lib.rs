//! Headless controller for the blockmix mixer.
//!
//! Owns the sample bank and the audio thread. Control calls are queued as
//! commands and applied by the audio thread between pulls, so the mixer
//! itself is only ever touched from one thread.

mod meter;
mod offline;
mod sequencer;
mod wav;

use bm_audio::{AudioError, AudioOutput, CpalOutput};
use bm_engine::{ChannelMask, Mixer, MixerConfig, PcmChannel, PullStats, PullTarget, Tracker};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use slotmap::SlotMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// Re-export common types so callers don't need bm-ir/bm-engine directly.
pub use bm_ir::{
    ChannelId, LoopMode, Sample, SampleKey, SystemVolume, Waveform, DEFAULT_SAMPLE_RATE,
    MAX_CHANNELS, MAX_CHANNEL_VOLUME, MAX_VOLUME,
};

pub use meter::{PeakLevel, PeakMeter};
pub use offline::render;
pub use sequencer::{Step, StepSequencer};
pub use wav::{samples_to_wav, write_wav};

/// Errors from controller operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("command queue is full")]
    QueueFull,
    #[error("no sample with that key")]
    UnknownSample,
    #[error("channel {0} is out of range")]
    InvalidChannel(ChannelId),
    #[error("audio thread is not running")]
    NotRunning,
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Controller parameters.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Mixer rate for headless runs and offline renders. Device playback
    /// uses the device's own rate.
    pub sample_rate: u32,
    /// How often the audio thread pulls.
    pub pull_period: Duration,
    /// Device ring size, in milliseconds of audio.
    pub latency_ms: u32,
    /// Capacity of the control command queue.
    pub command_capacity: usize,
    /// Pull without an output device, discarding the audio.
    pub headless: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            pull_period: Duration::from_millis(5),
            latency_ms: 50,
            command_capacity: 64,
            headless: false,
        }
    }
}

type BoxedTracker = Box<dyn Tracker<PcmChannel>>;

/// A control intent, applied by the audio thread before its next pull.
enum Command {
    Play { sample: Arc<Sample>, channel: ChannelId, loop_mode: LoopMode },
    Stop(ChannelId),
    Pause(ChannelId),
    Resume(ChannelId),
    SetVolume(ChannelId, u16),
    SetSpeed(ChannelId, u32),
    SetPosition(ChannelId, u32),
    SetLoop(ChannelId, LoopMode),
    TrackerInterval(u32),
    SetTracker(Option<BoxedTracker>),
    Init,
}

/// Counters published by the audio thread.
#[derive(Default)]
struct Shared {
    stop_signal: AtomicBool,
    frames: AtomicU64,
    callbacks: AtomicU64,
}

/// What the audio thread reports once its output is up.
struct Ready {
    sample_rate: u32,
    mask: Arc<ChannelMask>,
}

struct PlaybackHandle {
    commands: HeapProd<Command>,
    mask: Arc<ChannelMask>,
    shared: Arc<Shared>,
    sample_rate: u32,
    thread: Option<JoinHandle<Option<BoxedTracker>>>,
}

/// Headless mixer controller: owns the sample bank and the audio thread.
pub struct Controller {
    config: ControllerConfig,
    samples: SlotMap<SampleKey, Arc<Sample>>,
    volume: Arc<SystemVolume>,
    meter: PeakLevel,
    tracker: Option<BoxedTracker>,
    tracker_interval_us: u32,
    playback: Option<PlaybackHandle>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            samples: SlotMap::with_key(),
            volume: Arc::new(SystemVolume::default()),
            meter: PeakMeter::new().level(),
            tracker: None,
            tracker_interval_us: 0,
            playback: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // --- Sample bank ---

    pub fn add_sample(&mut self, sample: Sample) -> SampleKey {
        self.samples.insert(Arc::new(sample))
    }

    pub fn sample(&self, key: SampleKey) -> Option<&Arc<Sample>> {
        self.samples.get(key)
    }

    /// Remove a sample from the bank. Channels already playing it keep their copy.
    pub fn remove_sample(&mut self, key: SampleKey) -> Option<Arc<Sample>> {
        self.samples.remove(key)
    }

    // --- Audio thread ---

    pub fn is_running(&self) -> bool {
        self.playback.is_some()
    }

    /// Output rate of the running mixer.
    pub fn sample_rate(&self) -> Option<u32> {
        self.playback.as_ref().map(|pb| pb.sample_rate)
    }

    /// Start the audio thread, opening the output device unless headless.
    pub fn start(&mut self) -> Result<(), ControlError> {
        self.shutdown();

        let (commands, consumer) = HeapRb::<Command>::new(self.config.command_capacity.max(1)).split();
        let shared = Arc::new(Shared::default());
        let (ready_tx, ready_rx) = sync_channel(1);

        let meter = PeakMeter::new();
        self.meter = meter.level();
        let job = AudioJob {
            config: self.config.clone(),
            commands: consumer,
            shared: Arc::clone(&shared),
            volume: Arc::clone(&self.volume),
            meter,
            tracker: self.tracker.take(),
            tracker_interval_us: self.tracker_interval_us,
        };

        let thread = std::thread::spawn(move || job.run(ready_tx));

        let ready = match ready_rx.recv() {
            Ok(Ok(ready)) => ready,
            Ok(Err(err)) => {
                self.tracker = thread.join().ok().flatten();
                return Err(err.into());
            }
            Err(_) => {
                self.tracker = thread.join().ok().flatten();
                return Err(ControlError::NotRunning);
            }
        };

        info!(rate = ready.sample_rate, headless = self.config.headless, "audio thread started");
        self.playback = Some(PlaybackHandle {
            commands,
            mask: ready.mask,
            shared,
            sample_rate: ready.sample_rate,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop the audio thread and wait for it to exit.
    ///
    /// The tracker comes back from the thread and is used again by the next `start`.
    pub fn shutdown(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.shared.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                match handle.join() {
                    Ok(tracker) => self.tracker = tracker,
                    Err(_) => warn!("audio thread panicked, tracker lost"),
                }
            }
            debug!("audio thread stopped");
        }
    }

    fn send(&mut self, command: Command) -> Result<(), ControlError> {
        let pb = self.playback.as_mut().ok_or(ControlError::NotRunning)?;
        pb.commands.try_push(command).map_err(|_| {
            warn!("control command queue full");
            ControlError::QueueFull
        })
    }

    fn check_channel(ch: ChannelId) -> Result<(), ControlError> {
        if usize::from(ch) < MAX_CHANNELS {
            Ok(())
        } else {
            Err(ControlError::InvalidChannel(ch))
        }
    }

    // --- Channel control ---

    pub fn play(&mut self, key: SampleKey, ch: ChannelId, loop_mode: LoopMode) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        let sample = self.samples.get(key).cloned().ok_or(ControlError::UnknownSample)?;
        self.send(Command::Play { sample, channel: ch, loop_mode })
    }

    pub fn stop(&mut self, ch: ChannelId) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::Stop(ch))
    }

    pub fn pause(&mut self, ch: ChannelId) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::Pause(ch))
    }

    pub fn resume(&mut self, ch: ChannelId) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::Resume(ch))
    }

    pub fn set_volume(&mut self, ch: ChannelId, volume: u16) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::SetVolume(ch, volume))
    }

    pub fn set_speed(&mut self, ch: ChannelId, sample_rate: u32) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::SetSpeed(ch, sample_rate))
    }

    pub fn set_position(&mut self, ch: ChannelId, offset: u32) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::SetPosition(ch, offset))
    }

    pub fn set_loop(&mut self, ch: ChannelId, loop_mode: LoopMode) -> Result<(), ControlError> {
        Self::check_channel(ch)?;
        self.send(Command::SetLoop(ch, loop_mode))
    }

    /// Stop every channel and rewind the tracker.
    pub fn init(&mut self) -> Result<(), ControlError> {
        self.send(Command::Init)
    }

    /// True while `ch` is playing or paused.
    ///
    /// Reads the mixer's channel mask directly, so commands still in the
    /// queue are not yet reflected.
    pub fn is_playing(&self, ch: ChannelId) -> bool {
        usize::from(ch) < MAX_CHANNELS
            && self.playback.as_ref().is_some_and(|pb| pb.mask.contains(ch))
    }

    // --- Tracker ---

    /// Install the tracker, replacing any previous one.
    pub fn set_tracker(&mut self, tracker: impl Tracker<PcmChannel> + 'static) -> Result<(), ControlError> {
        let tracker: BoxedTracker = Box::new(tracker);
        if self.playback.is_some() {
            self.send(Command::SetTracker(Some(tracker)))
        } else {
            self.tracker = Some(tracker);
            Ok(())
        }
    }

    /// Set the tracker period in microseconds; 0 disables callbacks.
    pub fn set_tracker_interval(&mut self, micros: u32) -> Result<(), ControlError> {
        if self.playback.is_some() {
            self.send(Command::TrackerInterval(micros))?;
        }
        self.tracker_interval_us = micros;
        Ok(())
    }

    // --- System volume and metering ---

    pub fn system_volume(&self) -> i32 {
        self.volume.get()
    }

    /// Set the system volume, clamped to `0..=MAX_VOLUME`. Takes effect on the next block.
    pub fn set_system_volume(&self, volume: i32) {
        self.volume.set(volume);
    }

    /// Peak magnitude of the most recently mixed block.
    pub fn peak(&self) -> u16 {
        self.meter.get()
    }

    /// Frames mixed and tracker callbacks fired since `start`.
    pub fn stats(&self) -> PullStats {
        self.playback.as_ref().map_or_else(PullStats::default, |pb| PullStats {
            frames: pb.shared.frames.load(Ordering::Relaxed) as usize,
            callbacks: pb.shared.callbacks.load(Ordering::Relaxed) as u32,
        })
    }

    // --- Offline rendering ---

    /// Render `tracker` faster than real time, at most `max_frames` frames.
    pub fn render_frames(&self, tracker: impl Tracker<PcmChannel> + 'static, max_frames: usize) -> Vec<i16> {
        let mut mixer = self.build_mixer(self.config.sample_rate).with_tracker(tracker);
        mixer.set_tracker_callback_interval(self.tracker_interval_us);
        offline::render(&mut mixer, max_frames)
    }

    pub fn render_to_wav(&self, tracker: impl Tracker<PcmChannel> + 'static, max_seconds: u32) -> Vec<u8> {
        let rate = self.config.sample_rate;
        let max_frames = (rate as usize) * (max_seconds as usize);
        let samples = self.render_frames(tracker, max_frames);
        wav::samples_to_wav(&samples, rate)
    }

    fn build_mixer(&self, sample_rate: u32) -> Mixer<PcmChannel> {
        build_mixer(sample_rate, Arc::clone(&self.volume))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_mixer(sample_rate: u32, volume: Arc<SystemVolume>) -> Mixer<PcmChannel> {
    Mixer::new(MixerConfig { sample_rate }, |_| PcmChannel::new(sample_rate)).with_volume(volume)
}

fn apply(mixer: &mut Mixer<PcmChannel>, command: Command) {
    match command {
        Command::Play { sample, channel, loop_mode } => {
            if !mixer.play(sample, channel, loop_mode) {
                debug!(channel, "play ignored, channel busy");
            }
        }
        Command::Stop(ch) => {
            mixer.stop(ch);
        }
        Command::Pause(ch) => {
            mixer.pause(ch);
        }
        Command::Resume(ch) => {
            mixer.resume(ch);
        }
        Command::SetVolume(ch, volume) => {
            mixer.set_volume(ch, volume);
        }
        Command::SetSpeed(ch, rate) => {
            mixer.set_speed(ch, rate);
        }
        Command::SetPosition(ch, offset) => {
            mixer.set_position(ch, offset);
        }
        Command::SetLoop(ch, loop_mode) => {
            mixer.set_loop(ch, loop_mode);
        }
        Command::TrackerInterval(micros) => mixer.set_tracker_callback_interval(micros),
        Command::SetTracker(tracker) => mixer.set_tracker(tracker),
        Command::Init => mixer.init(),
    }
}

/// Everything the audio thread takes ownership of.
struct AudioJob {
    config: ControllerConfig,
    commands: HeapCons<Command>,
    shared: Arc<Shared>,
    volume: Arc<SystemVolume>,
    meter: PeakMeter,
    tracker: Option<BoxedTracker>,
    tracker_interval_us: u32,
}

impl AudioJob {
    /// Run until stopped. Hands the tracker back, including when the output fails to open.
    fn run(self, ready: SyncSender<Result<Ready, AudioError>>) -> Option<BoxedTracker> {
        if self.config.headless {
            let rate = self.config.sample_rate;
            let period_frames = rate as u64 * self.config.pull_period.as_micros() as u64 / 1_000_000;
            let suggested_frames = (period_frames as usize).max(bm_ir::BLOCK_SIZE);
            return self.run_loop(rate, ready, |mixer| {
                mixer.pull_audio(PullTarget::Headless { suggested_frames })
            });
        }

        // The stream is opened here: on some hosts it cannot leave its thread.
        let (mut output, mut sink) = match CpalOutput::open(self.config.latency_ms) {
            Ok(opened) => opened,
            Err(err) => {
                let _ = ready.send(Err(err));
                return self.tracker;
            }
        };
        if let Err(err) = output.start() {
            let _ = ready.send(Err(err));
            return self.tracker;
        }

        let rate = output.sample_rate();
        let tracker =
            self.run_loop(rate, ready, |mixer| mixer.pull_audio(PullTarget::Device(Some(&mut sink))));

        if let Err(err) = output.stop() {
            warn!(%err, "failed to stop audio output");
        }
        if sink.dropped() > 0 {
            warn!(dropped = sink.dropped(), "samples dropped on a full ring");
        }
        tracker
    }

    fn run_loop(
        mut self,
        sample_rate: u32,
        ready: SyncSender<Result<Ready, AudioError>>,
        mut pull: impl FnMut(&mut Mixer<PcmChannel>) -> PullStats,
    ) -> Option<BoxedTracker> {
        let mut mixer = build_mixer(sample_rate, Arc::clone(&self.volume));
        mixer.set_tracker(self.tracker.take());
        mixer.set_tracker_callback_interval(self.tracker_interval_us);
        mixer.set_observer(Some(Box::new(self.meter)));

        if ready.send(Ok(Ready { sample_rate, mask: mixer.channel_mask() })).is_err() {
            return mixer.take_tracker();
        }

        while !self.shared.stop_signal.load(Ordering::Relaxed) {
            while let Some(command) = self.commands.try_pop() {
                apply(&mut mixer, command);
            }

            let stats = pull(&mut mixer);
            self.shared.frames.fetch_add(stats.frames as u64, Ordering::Relaxed);
            self.shared.callbacks.fetch_add(u64::from(stats.callbacks), Ordering::Relaxed);

            std::thread::sleep(self.config.pull_period);
        }

        // Commands queued before the stop still count, a tracker swap in particular.
        while let Some(command) = self.commands.try_pop() {
            apply(&mut mixer, command);
        }
        mixer.take_tracker()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn headless() -> Controller {
        Controller::new(ControllerConfig {
            headless: true,
            pull_period: Duration::from_millis(1),
            ..ControllerConfig::default()
        })
    }

    /// Poll until `cond` holds or a generous deadline passes.
    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn commands_require_a_running_thread() {
        let mut ctl = headless();
        let key = ctl.add_sample(Sample::from_pcm16("s", vec![1; 10], 16_000));
        assert!(matches!(ctl.play(key, 0, LoopMode::Once), Err(ControlError::NotRunning)));
        assert!(!ctl.is_playing(0));
    }

    #[test]
    fn invalid_channel_is_rejected_up_front() {
        let mut ctl = headless();
        assert!(matches!(ctl.stop(MAX_CHANNELS as ChannelId), Err(ControlError::InvalidChannel(8))));
    }

    #[test]
    fn unknown_sample_is_rejected() {
        let mut ctl = headless();
        let key = ctl.add_sample(Sample::new("gone"));
        ctl.remove_sample(key);
        ctl.start().unwrap();
        assert!(matches!(ctl.play(key, 0, LoopMode::Once), Err(ControlError::UnknownSample)));
    }

    #[test]
    fn headless_thread_plays_and_stops() {
        let mut ctl = headless();
        let key = ctl.add_sample(Sample::from_pcm16("loop", vec![1000; 64], 16_000).looped());
        ctl.start().unwrap();
        assert_eq!(ctl.sample_rate(), Some(16_000));

        ctl.play(key, 2, LoopMode::Default).unwrap();
        assert!(wait_for(|| ctl.is_playing(2)));
        assert!(wait_for(|| ctl.peak() == 1000));

        ctl.stop(2).unwrap();
        assert!(wait_for(|| !ctl.is_playing(2)));
        ctl.shutdown();
        assert!(!ctl.is_running());
    }

    #[test]
    fn tracker_runs_on_the_audio_thread() {
        let mut ctl = headless();
        ctl.set_tracker_interval(1_000).unwrap();
        ctl.set_tracker(StepSequencer::new(vec![vec![]; 4]).repeating()).unwrap();
        ctl.start().unwrap();
        assert!(wait_for(|| ctl.stats().callbacks >= 10));
    }

    #[test]
    fn tracker_survives_restart() {
        let mut ctl = headless();
        ctl.set_tracker_interval(1_000).unwrap();
        ctl.set_tracker(StepSequencer::new(vec![vec![]; 4]).repeating()).unwrap();
        ctl.start().unwrap();
        assert!(wait_for(|| ctl.stats().callbacks > 0));
        ctl.shutdown();

        ctl.start().unwrap();
        assert!(wait_for(|| ctl.stats().callbacks > 0));
    }

    #[test]
    fn tracker_set_while_running_is_kept_after_shutdown() {
        let mut ctl = headless();
        ctl.set_tracker_interval(1_000).unwrap();
        ctl.start().unwrap();
        ctl.set_tracker(StepSequencer::new(vec![vec![]; 4]).repeating()).unwrap();
        assert!(wait_for(|| ctl.stats().callbacks > 0));
        ctl.shutdown();
        assert!(ctl.tracker.is_some());

        ctl.start().unwrap();
        assert!(wait_for(|| ctl.stats().callbacks > 0));
    }

    #[test]
    fn start_while_running_keeps_the_tracker() {
        let mut ctl = headless();
        ctl.set_tracker_interval(1_000).unwrap();
        ctl.set_tracker(StepSequencer::new(vec![vec![]; 4]).repeating()).unwrap();
        ctl.start().unwrap();
        ctl.start().unwrap();
        assert!(wait_for(|| ctl.stats().callbacks > 0));
    }

    #[test]
    fn system_volume_is_shared_and_clamped() {
        let ctl = headless();
        ctl.set_system_volume(MAX_VOLUME * 2);
        assert_eq!(ctl.system_volume(), MAX_VOLUME);
        ctl.set_system_volume(-5);
        assert_eq!(ctl.system_volume(), 0);
    }

    #[test]
    fn full_queue_reports_overflow() {
        let mut ctl = Controller::new(ControllerConfig {
            headless: true,
            command_capacity: 2,
            pull_period: Duration::from_secs(1),
            ..ControllerConfig::default()
        });
        ctl.start().unwrap();
        let mut results = (0..256).map(|_| ctl.stop(0));
        assert!(results.any(|r| matches!(r, Err(ControlError::QueueFull))));
    }

    #[test]
    fn rejected_interval_is_not_recorded() {
        let mut ctl = Controller::new(ControllerConfig {
            headless: true,
            command_capacity: 2,
            pull_period: Duration::from_secs(1),
            ..ControllerConfig::default()
        });
        ctl.set_tracker_interval(10_000).unwrap();
        ctl.start().unwrap();
        while ctl.stop(0).is_ok() {}

        assert!(matches!(ctl.set_tracker_interval(5_000), Err(ControlError::QueueFull)));
        assert_eq!(ctl.tracker_interval_us, 10_000);
    }

    #[test]
    fn render_stops_when_the_song_ends() {
        let mut ctl = headless();
        let key = ctl.add_sample(Sample::from_pcm16("hit", vec![500; 100], 16_000));
        let hit = Arc::clone(ctl.sample(key).unwrap());
        ctl.set_tracker_interval(10_000).unwrap();

        let seq = StepSequencer::new(vec![vec![Step::Play { channel: 0, sample: hit, loop_mode: LoopMode::Once }]]);
        let out = ctl.render_frames(seq, 16_000);
        // One 160-frame row to trigger, then 100 frames of sound.
        assert!(out.len() >= 260 && out.len() < 16_000);
        assert!(out[..160].iter().all(|&s| s == 0));
        assert_eq!(out[160], 500);
    }

    #[test]
    fn render_to_wav_wraps_the_render() {
        let ctl = headless();
        let wav = ctl.render_to_wav(StepSequencer::default(), 1);
        // No tracker clock and nothing playing: just a header.
        assert_eq!(wav.len(), 44);
    }
}
