//! LEDs on sysfs GPIO lines.

use std::io;

use orb_sysfs_gpio::{Chip, GpioError, OutputLine};

use crate::error::IndicatorFault;
use crate::hal::Indicators;

/// One output line per indicator, in sweep order. Lines start off and are
/// released when the array is dropped.
#[derive(Debug)]
pub struct GpioIndicators {
    lines: Vec<OutputLine>,
}

impl GpioIndicators {
    pub fn open(chip: &Chip, pins: &[u32]) -> Result<Self, GpioError> {
        let lines = pins
            .iter()
            .map(|pin| chip.output(*pin, false))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(?pins, "LED lines initialized");

        Ok(Self { lines })
    }
}

impl Indicators for GpioIndicators {
    fn count(&self) -> usize {
        self.lines.len()
    }

    fn set(&mut self, index: usize, on: bool) -> Result<(), IndicatorFault> {
        let Some(line) = self.lines.get_mut(index) else {
            return Err(IndicatorFault::new(
                index,
                io::Error::new(io::ErrorKind::InvalidInput, "no such indicator"),
            ));
        };
        line.set(on).map_err(|err| IndicatorFault::new(index, err))
    }
}
