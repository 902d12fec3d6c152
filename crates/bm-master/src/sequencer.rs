//! Row-based step sequencer driven by the tracker callback.
//!
//! Each tracker callback plays one row. A row is a list of steps applied to
//! the mixer's channels; rows with no steps are rests.

use std::sync::Arc;

use bm_engine::{PcmChannel, Tracker, TrackerContext};
use bm_ir::{ChannelId, LoopMode, Sample};
use tracing::debug;

/// One action within a row.
#[derive(Clone, Debug)]
pub enum Step {
    /// Restart `channel` with `sample`.
    Play { channel: ChannelId, sample: Arc<Sample>, loop_mode: LoopMode },
    Stop(ChannelId),
    Volume(ChannelId, u16),
    /// Change the row period (microseconds).
    Tempo(u32),
}

/// A tracker that walks a list of rows, one per callback.
#[derive(Clone, Debug, Default)]
pub struct StepSequencer {
    rows: Vec<Vec<Step>>,
    row: usize,
    repeat: bool,
    finished: bool,
}

impl StepSequencer {
    pub fn new(rows: Vec<Vec<Step>>) -> Self {
        Self { rows, ..Self::default() }
    }

    /// Start over from the first row after the last one instead of stopping.
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Index of the next row to play.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn apply(step: &Step, ctx: &mut TrackerContext<'_, PcmChannel>) {
        match step {
            Step::Play { channel, sample, loop_mode } => {
                // Retrigger: a row always restarts its note.
                ctx.channels().stop(*channel);
                ctx.channels().play(Arc::clone(sample), *channel, *loop_mode);
            }
            Step::Stop(channel) => {
                ctx.channels().stop(*channel);
            }
            Step::Volume(channel, volume) => {
                ctx.channels().set_volume(*channel, *volume);
            }
            Step::Tempo(micros) => ctx.set_callback_interval(*micros),
        }
    }
}

impl Tracker<PcmChannel> for StepSequencer {
    fn on_callback(&mut self, ctx: &mut TrackerContext<'_, PcmChannel>) {
        if self.finished {
            return;
        }

        if self.row >= self.rows.len() {
            if self.repeat && !self.rows.is_empty() {
                self.row = 0;
            } else {
                // Let ringing notes play out, but stop the clock.
                self.finished = true;
                ctx.set_callback_interval(0);
                debug!(rows = self.rows.len(), "sequence finished");
                return;
            }
        }

        for step in &self.rows[self.row] {
            Self::apply(step, ctx);
        }
        self.row += 1;
    }

    fn reset(&mut self) {
        self.row = 0;
        self.finished = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_engine::{Mixer, MixerConfig, PullTarget};

    const RATE: u32 = 16_000;

    fn tone() -> Arc<Sample> {
        Arc::new(Sample::from_pcm16("tone", vec![1000; 4000], RATE))
    }

    fn mixer(seq: StepSequencer) -> Mixer<PcmChannel> {
        let mut mixer = Mixer::new(MixerConfig { sample_rate: RATE }, |_| PcmChannel::new(RATE))
            .with_tracker(seq);
        // 2ms rows: 32 frames each
        mixer.set_tracker_callback_interval(2_000);
        mixer
    }

    fn pull(mixer: &mut Mixer<PcmChannel>, frames: usize) {
        mixer.pull_audio(PullTarget::Headless { suggested_frames: frames });
    }

    fn play(channel: ChannelId, sample: &Arc<Sample>) -> Step {
        Step::Play { channel, sample: Arc::clone(sample), loop_mode: LoopMode::Once }
    }

    #[test]
    fn rows_fire_in_order() {
        let t = tone();
        let seq = StepSequencer::new(vec![
            vec![play(0, &t)],
            vec![play(1, &t)],
            vec![Step::Stop(0)],
        ]);
        let mut mixer = mixer(seq);

        pull(&mut mixer, 32);
        assert!(mixer.is_playing(0));
        assert!(!mixer.is_playing(1));

        pull(&mut mixer, 32);
        assert!(mixer.is_playing(1));

        pull(&mut mixer, 32);
        assert!(!mixer.is_playing(0));
        assert!(mixer.is_playing(1));
    }

    #[test]
    fn play_step_retriggers_a_busy_channel() {
        let t = tone();
        let seq = StepSequencer::new(vec![vec![play(0, &t)], vec![], vec![play(0, &t)]]);
        let mut mixer = mixer(seq);

        pull(&mut mixer, 64);
        assert_eq!(mixer.position(0), Some(32));
        pull(&mut mixer, 32);
        assert_eq!(mixer.position(0), Some(0));
    }

    #[test]
    fn volume_and_tempo_steps() {
        let seq = StepSequencer::new(vec![vec![Step::Volume(3, 100), Step::Tempo(4_000)]]);
        let mut mixer = mixer(seq);
        pull(&mut mixer, 32);
        assert_eq!(mixer.volume(3), Some(100));
        assert_eq!(mixer.tracker_interval(), 64);
    }

    #[test]
    fn finished_sequence_disables_the_clock() {
        let t = tone();
        let seq = StepSequencer::new(vec![vec![play(0, &t)]]);
        let mut mixer = mixer(seq);

        pull(&mut mixer, 64);
        assert_eq!(mixer.tracker_interval(), 0);
        assert!(mixer.is_playing(0));
    }

    #[test]
    fn repeating_sequence_wraps() {
        let t = tone();
        let seq = StepSequencer::new(vec![vec![play(0, &t)], vec![Step::Stop(0)]]).repeating();
        let mut mixer = mixer(seq);

        for row in 0..5 {
            pull(&mut mixer, 32);
            assert_eq!(mixer.is_playing(0), row % 2 == 0);
        }
        assert_eq!(mixer.tracker_interval(), 32);
    }

    #[test]
    fn reset_rewinds() {
        let mut seq = StepSequencer::new(vec![vec![], vec![]]);
        seq.row = 2;
        seq.finished = true;
        seq.reset();
        assert_eq!(seq.row(), 0);
        assert!(!seq.is_finished());
    }
}
