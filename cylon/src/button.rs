use std::time::{Duration, Instant};

use orb_sysfs_gpio::{GpioError, InputLine};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::handler::{Channel, EventHandler, Trigger};
use crate::rate::StepEffect;

pub const BUTTON_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Presses closer together than this are treated as contact bounce.
pub const DEBOUNCE_LOCKOUT: Duration = Duration::from_millis(200);

/// Turns raw samples of an active-high button into press events.
#[derive(Debug, Clone)]
pub struct Debouncer {
    pressed: bool,
    last_press: Option<Instant>,
    lockout: Duration,
}

impl Debouncer {
    pub fn new(lockout: Duration) -> Self {
        Self {
            pressed: false,
            last_press: None,
            lockout,
        }
    }

    /// Feeds one sample, returns whether it completes a press.
    pub fn update(&mut self, high: bool, now: Instant) -> bool {
        let rising = high && !self.pressed;
        self.pressed = high;
        if !rising {
            return false;
        }
        let settled = self
            .last_press
            .is_none_or(|last| now.saturating_duration_since(last) >= self.lockout);
        if settled {
            self.last_press = Some(now);
        }
        settled
    }
}

/// Handle that can be used to join on errors from the [`Buttons`] task.
///
/// Note that dropping this handle doesn't kill the task.
#[derive(Debug)]
pub struct ButtonsJoinHandle(pub JoinHandle<Result<(), GpioError>>);

/// Provides access to the buttons. Dropping this kills the task.
#[derive(Debug)]
pub struct Buttons {
    /// Used to signal that the buttons' task should be cleanly terminated.
    pub kill_tx: oneshot::Sender<()>,
}

impl Buttons {
    /// Polls `inputs` and feeds every press to `handler`. Must be called from
    /// within a tokio runtime.
    pub fn spawn(
        inputs: Vec<(Channel, InputLine)>,
        handler: EventHandler,
    ) -> (Self, ButtonsJoinHandle) {
        let (kill_tx, mut kill_rx) = oneshot::channel();

        let task = tokio::task::spawn_blocking(move || {
            let mut inputs: Vec<_> = inputs
                .into_iter()
                .map(|(channel, line)| (channel, line, Debouncer::new(DEBOUNCE_LOCKOUT)))
                .collect();
            debug!(buttons = inputs.len(), "button polling started");

            let rt = tokio::runtime::Handle::current();
            loop {
                let interval = rt.block_on(async {
                    select! {
                        _ = &mut kill_rx => None,
                        _ = tokio::time::sleep(BUTTON_POLL_INTERVAL) => Some(()),
                    }
                });
                if interval.is_none() {
                    debug!("button polling stopped");
                    return Ok(());
                }

                for (channel, line, debouncer) in &mut inputs {
                    let high = line.is_high()?;
                    if debouncer.update(high, Instant::now()) {
                        let trigger = handler.on_trigger(*channel, Instant::now());
                        log_trigger(&trigger);
                    }
                }
            }
        });

        (Buttons { kill_tx }, ButtonsJoinHandle(task))
    }
}

fn log_trigger(trigger: &Trigger) {
    let Trigger {
        channel: Channel(channel),
        report,
        since_last,
    } = trigger;
    match report.effect {
        StepEffect::Moved => {
            debug!(channel, level = report.level, ?since_last, "button pressed")
        }
        StepEffect::Reversed => info!(
            channel,
            level = report.level,
            direction = ?report.direction,
            "rate level bound reached, reversing"
        ),
        StepEffect::Saturated => info!(
            channel,
            level = report.level,
            "rate level bound reached, press ignored"
        ),
    }
}
