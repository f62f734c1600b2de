use std::io;

/// Rejected configuration, detected before the worker starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one indicator is required")]
    NoIndicators,
    #[error("base sleep must be longer than zero")]
    ZeroBaseSleep,
    #[error("rate limit must be greater than zero")]
    NonPositiveLimit,
    #[error("gpio {0} is assigned more than once")]
    DuplicatePin(u32),
    #[error("a single button can't leave a clamped rate limit, use the bounce policy")]
    ClampedSingleButton,
}

/// The indicator-control primitive failed. The physical state of the
/// indicator is unknown after this.
#[derive(Debug, thiserror::Error)]
#[error("failed to drive indicator {index}")]
pub struct IndicatorFault {
    pub index: usize,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl IndicatorFault {
    pub fn new(
        index: usize,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            index,
            source: source.into(),
        }
    }
}

/// Why the sweep stopped, or could not start.
#[derive(Debug, thiserror::Error)]
pub enum CylonError {
    #[error("sweep halted on indicator fault")]
    Indicator(#[from] IndicatorFault),
    #[error("failed to spawn sweep worker")]
    Spawn(#[source] io::Error),
    #[error("sweep worker panicked")]
    WorkerPanicked,
}
