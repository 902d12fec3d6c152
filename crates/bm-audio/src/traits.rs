//! Audio output trait and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("no audio device available")]
    NoDevice,
}

/// A running output device.
///
/// Samples reach the device through the [`RingSink`](crate::RingSink)
/// handed out when the output is opened.
pub trait AudioOutput {
    /// Device rate in frames per second. The mixer must run at this rate.
    fn sample_rate(&self) -> u32;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback. The device plays silence until restarted.
    fn stop(&mut self) -> Result<(), AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_cause() {
        let err = AudioError::StreamCreate("format not supported".into());
        assert_eq!(err.to_string(), "stream create error: format not supported");
        assert_eq!(AudioError::NoDevice.to_string(), "no audio device available");
    }
}
