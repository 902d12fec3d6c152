//! Audio output sinks for blockmix.

mod cpal_backend;
mod ring_sink;
mod traits;

pub use cpal_backend::CpalOutput;
pub use ring_sink::{ring, RingSink};
pub use traits::{AudioError, AudioOutput};
