//! Runs the sweep on its own thread until told to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace};

use crate::config::Config;
use crate::error::{ConfigError, CylonError, IndicatorFault};
use crate::hal::{Clock, Indicators};
use crate::handler::{ChannelBindings, EventHandler};
use crate::rate::RateState;
use crate::sweep::SweepAnimator;

const WORKER_NAME: &str = "cylon";

/// Everything one sweep needs, before it runs.
#[derive(Debug)]
pub struct Cylon<I, C> {
    animator: SweepAnimator<I>,
    clock: C,
    rate: Arc<RateState>,
}

impl<I: Indicators, C: Clock> Cylon<I, C> {
    pub fn new(config: &Config, indicators: I, clock: C) -> Result<Self, ConfigError> {
        let (base_sleep, limit) = config.validate()?;
        let rate = Arc::new(RateState::new(limit, config.policy));
        debug!(
            indicators = indicators.count(),
            ?base_sleep,
            limit = limit.get(),
            policy = ?config.policy,
            "sweep configured"
        );

        Ok(Self {
            animator: SweepAnimator::new(indicators, base_sleep, rate.clone())?,
            clock,
            rate,
        })
    }

    pub fn rate(&self) -> &Arc<RateState> {
        &self.rate
    }

    /// Handler for input events, wired to this sweep's rate level.
    pub fn event_handler(&self, bindings: ChannelBindings) -> EventHandler {
        EventHandler::new(self.rate.clone(), bindings)
    }

    /// Spawns the worker thread. Consumes the context, so a sweep can only be
    /// started once.
    pub fn start(self) -> Result<Running, CylonError> {
        let stop = Arc::new(AtomicBool::new(false));
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_owned())
            .spawn({
                let stop = stop.clone();
                move || self.run(&stop)
            })
            .map_err(CylonError::Spawn)?;

        Ok(Running {
            stop,
            worker: Some(worker),
        })
    }

    fn run(mut self, stop: &AtomicBool) -> Result<(), IndicatorFault> {
        info!("sweep worker started");
        let mut result = loop {
            if stop.load(Ordering::Acquire) {
                break Ok(());
            }
            let started = self.clock.now();
            match self.animator.tick() {
                Ok(delay) => {
                    let state = self.animator.state();
                    trace!(
                        index = state.current_index(),
                        direction = ?state.direction(),
                        ?delay,
                        "tick"
                    );
                    self.clock.sleep(delay);
                    trace!(elapsed = ?self.clock.now().duration_since(started), "tick done");
                }
                Err(fault) => {
                    error!("indicator fault, halting sweep: {fault}");
                    break Err(fault);
                }
            }
        };

        if let Err(fault) = self.animator.all_off() {
            error!("failed to turn indicators off: {fault}");
            if result.is_ok() {
                result = Err(fault);
            }
        }
        info!("sweep worker finished");
        result
    }
}

/// A sweep in progress. Dropping it stops the worker.
#[derive(Debug)]
pub struct Running {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<(), IndicatorFault>>>,
}

impl Running {
    /// Whether the worker has exited, on its own after a fault or after
    /// [`Self::stop`].
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Asks the worker to stop and waits for it, at most one tick delay.
    /// Every indicator is off once this returns.
    ///
    /// Returns the fault that halted the worker, if any. Calling it again
    /// afterwards does nothing.
    pub fn stop(&mut self) -> Result<(), CylonError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Release);
        match worker.join() {
            Ok(result) => result.map_err(CylonError::from),
            Err(_) => Err(CylonError::WorkerPanicked),
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("sweep worker failed: {err}");
        }
    }
}
