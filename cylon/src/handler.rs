//! Entry point for input events.
//!
//! [`EventHandler::on_trigger`] may be called from a context that must not
//! block, at any point of a sweep tick. It only takes the rate lock for a
//! constant-time update and touches nothing else: no allocation, no I/O, no
//! sleeping. Callers log the returned [`Trigger`] once they are out of that
//! context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::rate::{Nudge, RateState, StepReport};

/// Identity of an input, e.g. the GPIO number of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(pub u32);

/// Maps each input channel to the way it moves the rate level.
///
/// Unbound channels step in the stored direction, same as
/// [`Nudge::Continue`].
#[derive(Debug, Clone, Default)]
pub struct ChannelBindings {
    bindings: Vec<(Channel, Nudge)>,
}

impl ChannelBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `channel` to `nudge`, replacing any earlier binding.
    #[must_use]
    pub fn bind(mut self, channel: Channel, nudge: Nudge) -> Self {
        self.bindings.retain(|(bound, _)| *bound != channel);
        self.bindings.push((channel, nudge));
        self
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.bindings.iter().map(|(channel, _)| *channel)
    }

    fn lookup(&self, channel: Channel) -> Nudge {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == channel)
            .map_or(Nudge::Continue, |(_, nudge)| *nudge)
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub channel: Channel,
    pub report: StepReport,
    /// Time since the previous event on any channel.
    pub since_last: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    rate: Arc<RateState>,
    bindings: ChannelBindings,
    epoch: Instant,
    /// Nanoseconds since `epoch` of the last event, plus one. Zero until the
    /// first event.
    last_event: AtomicU64,
}

/// Applies input events to the shared [`RateState`]. Clones share state.
#[derive(Debug, Clone)]
pub struct EventHandler {
    inner: Arc<Inner>,
}

impl EventHandler {
    pub fn new(rate: Arc<RateState>, bindings: ChannelBindings) -> Self {
        Self {
            inner: Arc::new(Inner {
                rate,
                bindings,
                epoch: Instant::now(),
                last_event: AtomicU64::new(0),
            }),
        }
    }

    /// Handles one event from `channel`, observed at `at`. Spurious events
    /// are handled like any other; debouncing is up to the event source.
    pub fn on_trigger(&self, channel: Channel, at: Instant) -> Trigger {
        let nudge = self.inner.bindings.lookup(channel);
        let report = self.inner.rate.nudge(nudge);

        let stamp = u64::try_from(at.saturating_duration_since(self.inner.epoch).as_nanos())
            .unwrap_or(u64::MAX)
            .saturating_add(1);
        let previous = self.inner.last_event.swap(stamp, Ordering::AcqRel);
        let since_last =
            (previous != 0).then(|| Duration::from_nanos(stamp.saturating_sub(previous)));

        Trigger {
            channel,
            report,
            since_last,
        }
    }
}
