//! blockmix CLI: plays a short built-in sequence, live or to a WAV file.
//!
//! Usage:
//!   bm-cli
//!   bm-cli --wav out.wav --seconds 10
//!   RUST_LOG=bm_engine=trace bm-cli --headless

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bm_master::{
    Controller, ControllerConfig, LoopMode, Sample, Step, StepSequencer, Waveform,
    DEFAULT_SAMPLE_RATE, MAX_VOLUME,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "bm-cli", about = "Block-pull mixer demo")]
struct Args {
    /// Render offline to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,

    /// How long to play or render
    #[arg(long, default_value_t = 8)]
    seconds: u32,

    /// Row period in microseconds
    #[arg(long, default_value_t = 125_000)]
    tempo_us: u32,

    /// System volume, 0-65536
    #[arg(long, default_value_t = MAX_VOLUME)]
    volume: i32,

    /// Run the audio thread without an output device
    #[arg(long)]
    headless: bool,

    /// Rate of the generated samples, and of the mixer when not on a device
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut ctl = Controller::new(ControllerConfig {
        sample_rate: args.sample_rate,
        headless: args.headless,
        ..ControllerConfig::default()
    });
    ctl.set_system_volume(args.volume);

    let song = demo_song(&mut ctl, args.sample_rate);
    info!(rows = song.rows(), tempo_us = args.tempo_us, "demo sequence");

    let result = match &args.wav {
        Some(path) => render_to_wav(&mut ctl, song, &args, path),
        None => play_live(&mut ctl, song, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn render_to_wav(
    ctl: &mut Controller,
    song: StepSequencer,
    args: &Args,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    ctl.set_tracker_interval(args.tempo_us)?;
    println!("Rendering to {} at {} Hz...", path.display(), args.sample_rate);

    let wav = ctl.render_to_wav(song, args.seconds);
    std::fs::write(path, &wav)?;

    let frames = (wav.len() - 44) / 2;
    println!("Wrote {} frames ({:.1}s)", frames, frames as f32 / args.sample_rate as f32);
    Ok(())
}

fn play_live(
    ctl: &mut Controller,
    song: StepSequencer,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    ctl.set_tracker_interval(args.tempo_us)?;
    ctl.set_tracker(song.repeating())?;
    ctl.start()?;
    println!("Playing at {} Hz...", ctl.sample_rate().unwrap_or(args.sample_rate));

    let ticks = args.seconds * 50;
    for _ in 0..ticks {
        let peak = ctl.peak();
        let bar = "#".repeat(usize::from(peak / 1024));
        print!("\rPeak: {:5} |{:<32}| frames: {}", peak, bar, ctl.stats().frames);
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(20));
    }

    ctl.shutdown();
    println!("\rDone.{:60}", "");
    Ok(())
}

/// A four-bar arpeggio over a square-wave bass, with a closed hat on the off-beats.
fn demo_song(ctl: &mut Controller, rate: u32) -> StepSequencer {
    let mut tone = |name: &str, waveform, freq: f32, millis: usize, decay: f32| {
        let key = ctl.add_sample(Sample::tone(name, waveform, freq, rate, rate as usize * millis / 1000, decay));
        ctl.sample(key).cloned()
    };

    let lead: Vec<_> = [220.0, 261.63, 329.63, 392.0, 440.0]
        .iter()
        .filter_map(|&freq| tone("lead", Waveform::Sine, freq, 200, 3.0))
        .collect();
    let bass: Vec<_> = [55.0, 43.65, 49.0, 41.2]
        .iter()
        .filter_map(|&freq| tone("bass", Waveform::Square, freq, 1000, 1.5))
        .collect();
    let hat = tone("hat", Waveform::Saw, 5919.9, 40, 6.0);

    let play = |channel, sample: &Arc<Sample>| Step::Play {
        channel,
        sample: Arc::clone(sample),
        loop_mode: LoopMode::Once,
    };

    let arpeggio = [0, 2, 4, 2, 1, 3, 4, 3];
    let mut rows = Vec::new();
    for (bar, bass_note) in bass.iter().enumerate() {
        for beat in 0..8 {
            let mut row = Vec::new();
            if beat == 0 {
                row.push(play(0, bass_note));
                row.push(Step::Volume(0, 160));
            }
            if let Some(note) = lead.get((arpeggio[beat] + bar) % lead.len()) {
                row.push(play(1 + (beat % 2) as u8, note));
            }
            if let Some(hat) = hat.as_ref().filter(|_| beat % 2 == 1) {
                row.push(play(3, hat));
                row.push(Step::Volume(3, 64));
            }
            rows.push(row);
        }
    }

    StepSequencer::new(rows)
}
