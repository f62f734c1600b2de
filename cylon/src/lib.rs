//! Cylon sweep over a row of LEDs, with the sweep speed nudged by buttons.
//!
//! Two contexts share one value: the sweep worker ([`scheduler`]) reads the
//! rate level once per tick, and the [`handler`] updates it on every button
//! press. Nothing else crosses between them.
//!
//! Start with [`Cylon::new()`].

pub mod button;
pub mod config;
pub mod error;
pub mod gpio;
pub mod hal;
pub mod handler;
pub mod rate;
pub mod scheduler;
pub mod sweep;
pub mod telemetry;

pub use crate::config::{ButtonLayout, Config, Pins};
pub use crate::error::{ConfigError, CylonError, IndicatorFault};
pub use crate::hal::{Clock, Indicators, SystemClock};
pub use crate::handler::{Channel, ChannelBindings, EventHandler};
pub use crate::rate::{BoundaryPolicy, RateState};
pub use crate::scheduler::{Cylon, Running};
