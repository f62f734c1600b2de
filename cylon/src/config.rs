use std::collections::HashSet;
use std::num::NonZeroU16;
use std::time::Duration;

use crate::error::ConfigError;
use crate::handler::{Channel, ChannelBindings};
use crate::rate::{BoundaryPolicy, DEFAULT_LIMIT, Nudge, RateDirection};

/// GPIOs of the ten LEDs, in sweep order.
pub const DEFAULT_LED_PINS: [u32; 10] = [65, 46, 26, 44, 68, 67, 47, 45, 69, 66];
/// Button slowing the sweep down.
pub const DEFAULT_RAISE_PIN: u32 = 27;
/// Button speeding the sweep up.
pub const DEFAULT_LOWER_PIN: u32 = 61;
pub const DEFAULT_BASE_SLEEP: Duration = Duration::from_millis(100);

/// Parameters of the sweep itself. The number of indicators comes from the
/// indicator array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Delay between ticks at rate level zero.
    pub base_sleep: Duration,
    /// Bound of the rate level, in either direction.
    pub limit: u16,
    pub policy: BoundaryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_sleep: DEFAULT_BASE_SLEEP,
            limit: DEFAULT_LIMIT,
            policy: BoundaryPolicy::default(),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<(Duration, NonZeroU16), ConfigError> {
        if self.base_sleep.is_zero() {
            return Err(ConfigError::ZeroBaseSleep);
        }
        let limit = NonZeroU16::new(self.limit).ok_or(ConfigError::NonPositiveLimit)?;

        Ok((self.base_sleep, limit))
    }
}

/// How the buttons are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLayout {
    /// One button stepping in the stored direction.
    Single { pin: u32 },
    /// One button per direction.
    Dual { raise: u32, lower: u32 },
}

impl ButtonLayout {
    /// A single button only ever steps in the stored direction, so it needs
    /// the level to turn around on its own.
    pub fn default_policy(&self) -> BoundaryPolicy {
        match self {
            ButtonLayout::Single { .. } => BoundaryPolicy::Bounce,
            ButtonLayout::Dual { .. } => BoundaryPolicy::Clamp,
        }
    }

    pub fn pins(&self) -> Vec<u32> {
        match *self {
            ButtonLayout::Single { pin } => vec![pin],
            ButtonLayout::Dual { raise, lower } => vec![raise, lower],
        }
    }

    pub fn bindings(&self) -> ChannelBindings {
        match *self {
            ButtonLayout::Single { pin } => {
                ChannelBindings::new().bind(Channel(pin), Nudge::Continue)
            }
            ButtonLayout::Dual { raise, lower } => ChannelBindings::new()
                .bind(Channel(raise), Nudge::Toward(RateDirection::Up))
                .bind(Channel(lower), Nudge::Toward(RateDirection::Down)),
        }
    }
}

/// GPIO assignment of the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pins {
    pub leds: Vec<u32>,
    pub buttons: ButtonLayout,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            leds: DEFAULT_LED_PINS.to_vec(),
            buttons: ButtonLayout::Dual {
                raise: DEFAULT_RAISE_PIN,
                lower: DEFAULT_LOWER_PIN,
            },
        }
    }
}

impl Pins {
    /// Checks there is at least one LED, no GPIO is used twice and the
    /// buttons can move the rate level both ways under `policy`.
    pub fn validate(&self, policy: BoundaryPolicy) -> Result<(), ConfigError> {
        if self.leds.is_empty() {
            return Err(ConfigError::NoIndicators);
        }
        let single = matches!(self.buttons, ButtonLayout::Single { .. });
        if single && policy == BoundaryPolicy::Clamp {
            return Err(ConfigError::ClampedSingleButton);
        }
        let mut seen = HashSet::new();
        for pin in self.leds.iter().copied().chain(self.buttons.pins()) {
            if !seen.insert(pin) {
                return Err(ConfigError::DuplicatePin(pin));
            }
        }

        Ok(())
    }
}
