//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::ring_sink::{ring, RingSink};
use crate::traits::{AudioError, AudioOutput};

/// CPAL-based audio output.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

#[inline]
fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

impl CpalOutput {
    /// Open the default output device.
    ///
    /// Returns the output and the sink the mixer should pull into. The ring
    /// holds `latency_ms` of audio at the device rate.
    pub fn open(latency_ms: u32) -> Result<(Self, RingSink), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;

        let config: StreamConfig = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?
            .into();

        let frames = (config.sample_rate.0 as usize * latency_ms as usize / 1000).max(64);
        let (sink, consumer) = ring(frames);

        let mut output = Self {
            device,
            config,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        };
        output.build_stream(consumer)?;

        info!(
            rate = output.config.sample_rate.0,
            channels = output.config.channels,
            ring = frames,
            "audio output opened"
        );
        Ok((output, sink))
    }

    fn build_stream(&mut self, mut consumer: HeapCons<i16>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let channels = usize::from(self.config.channels);

        let stream = self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    // Mono source: the same value on every device channel.
                    for chunk in data.chunks_mut(channels) {
                        let value = consumer.try_pop().map_or(0.0, to_f32);
                        chunk.fill(value);
                    }
                },
                |err| error!(%err, "audio stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_covers_full_scale() {
        assert_eq!(to_f32(0), 0.0);
        assert_eq!(to_f32(i16::MIN), -1.0);
        assert!(to_f32(i16::MAX) < 1.0);
        assert_eq!(to_f32(16384), 0.5);
    }
}
