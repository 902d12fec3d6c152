//! Tracker callback interface.

use bm_ir::Channel;

use crate::channels::Channels;

/// A music sequencer driven by the mixer's frame clock.
///
/// `on_callback` runs inside the pull, exactly once every tracker interval
/// of mixed frames. It may start, stop and adjust channels through the
/// context, but it cannot pull audio itself.
pub trait Tracker<C: Channel>: Send {
    fn on_callback(&mut self, ctx: &mut TrackerContext<'_, C>);

    /// Return to the start of the song.
    fn reset(&mut self) {}
}

/// Adapts a closure into a [`Tracker`].
pub struct FnTracker<F>(F);

impl<F> FnTracker<F> {
    pub fn new<C>(f: F) -> Self
    where
        C: Channel,
        F: FnMut(&mut TrackerContext<'_, C>) + Send,
    {
        Self(f)
    }
}

impl<C, F> Tracker<C> for FnTracker<F>
where
    C: Channel,
    F: FnMut(&mut TrackerContext<'_, C>) + Send,
{
    fn on_callback(&mut self, ctx: &mut TrackerContext<'_, C>) {
        (self.0)(ctx)
    }
}

/// What a tracker callback may touch.
pub struct TrackerContext<'a, C> {
    channels: &'a mut Channels<C>,
    pending_interval: Option<u32>,
}

impl<'a, C: Channel> TrackerContext<'a, C> {
    pub(crate) fn new(channels: &'a mut Channels<C>) -> Self {
        Self { channels, pending_interval: None }
    }

    /// The channel control surface.
    pub fn channels(&mut self) -> &mut Channels<C> {
        self.channels
    }

    /// Change the callback period, e.g. on a tempo change.
    ///
    /// Applied when the callback returns; the countdown restarts from the
    /// new interval at that point.
    pub fn set_callback_interval(&mut self, micros: u32) {
        self.pending_interval = Some(micros);
    }

    pub(crate) fn into_pending_interval(self) -> Option<u32> {
        self.pending_interval
    }
}
