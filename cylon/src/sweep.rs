//! The cylon pattern: one lit indicator travelling back and forth.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, IndicatorFault};
use crate::hal::Indicators;
use crate::rate::RateState;

/// Shortest delay between two ticks, however fast the rate level asks for.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SweepDirection {
    #[default]
    Rising,
    Falling,
}

/// Position of the sweep. Edges are visited twice in a row before the
/// direction reverses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepState {
    current_index: usize,
    direction: SweepDirection,
}

impl SweepState {
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn direction(&self) -> SweepDirection {
        self.direction
    }

    /// Moves one position along a row of `count` indicators.
    fn advance(&mut self, count: usize) {
        let last = count.saturating_sub(1);
        match self.direction {
            SweepDirection::Rising if self.current_index >= last => {
                self.current_index = last;
                self.direction = SweepDirection::Falling;
            }
            SweepDirection::Rising => self.current_index += 1,
            SweepDirection::Falling if self.current_index == 0 => {
                self.direction = SweepDirection::Rising;
            }
            SweepDirection::Falling => self.current_index -= 1,
        }
    }
}

/// Delay after a tick at rate `level`. Positive levels slow the sweep down,
/// negative levels speed it up.
pub fn delay_for(base_sleep: Duration, level: i32) -> Duration {
    let factor = level.unsigned_abs();
    match level.signum() {
        0 => base_sleep,
        1 => base_sleep.saturating_mul(factor),
        _ => (base_sleep / factor).max(MIN_DELAY),
    }
}

/// Owns the indicators and walks the lit position across them.
#[derive(Debug)]
pub struct SweepAnimator<I> {
    indicators: I,
    state: SweepState,
    last_index: Option<usize>,
    base_sleep: Duration,
    rate: Arc<RateState>,
}

impl<I: Indicators> SweepAnimator<I> {
    pub fn new(
        indicators: I,
        base_sleep: Duration,
        rate: Arc<RateState>,
    ) -> Result<Self, ConfigError> {
        if indicators.count() == 0 {
            return Err(ConfigError::NoIndicators);
        }

        Ok(Self {
            indicators,
            state: SweepState::default(),
            last_index: None,
            base_sleep,
            rate,
        })
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn indicators(&self) -> &I {
        &self.indicators
    }

    /// Lights the current position, moves on and returns how long to wait
    /// before the next tick. Stops at the first indicator that can't be driven.
    pub fn tick(&mut self) -> Result<Duration, IndicatorFault> {
        if let Some(last) = self.last_index.take() {
            self.indicators.set(last, false)?;
        }
        let current = self.state.current_index;
        self.indicators.set(current, true)?;
        self.last_index = Some(current);

        self.state.advance(self.indicators.count());

        let level = self.rate.read();
        Ok(delay_for(self.base_sleep, level))
    }

    /// Drives every indicator off. All of them are attempted, the first
    /// failure is returned.
    pub fn all_off(&mut self) -> Result<(), IndicatorFault> {
        let mut first_fault = None;
        for index in 0..self.indicators.count() {
            if let Err(fault) = self.indicators.set(index, false) {
                tracing::warn!(index, "failed to turn indicator off: {fault}");
                first_fault.get_or_insert(fault);
            }
        }
        self.last_index = None;

        first_fault.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::BoundaryPolicy;
    use proptest::prelude::*;
    use std::io;
    use std::num::NonZeroU16;

    #[derive(Debug)]
    struct Row {
        lit: Vec<bool>,
        fail_on: Option<usize>,
    }

    impl Row {
        fn new(count: usize) -> Self {
            Self {
                lit: vec![false; count],
                fail_on: None,
            }
        }

        fn lit_count(&self) -> usize {
            self.lit.iter().filter(|on| **on).count()
        }
    }

    impl Indicators for Row {
        fn count(&self) -> usize {
            self.lit.len()
        }

        fn set(&mut self, index: usize, on: bool) -> Result<(), IndicatorFault> {
            if self.fail_on == Some(index) {
                return Err(IndicatorFault::new(index, io::Error::other("line stuck")));
            }
            self.lit[index] = on;
            Ok(())
        }
    }

    fn rate(policy: BoundaryPolicy) -> Arc<RateState> {
        Arc::new(RateState::new(NonZeroU16::new(10).unwrap(), policy))
    }

    fn animator(count: usize) -> SweepAnimator<Row> {
        SweepAnimator::new(
            Row::new(count),
            Duration::from_millis(100),
            rate(BoundaryPolicy::Bounce),
        )
        .unwrap()
    }

    /// Index lit by each of `ticks` ticks.
    fn trace(animator: &mut SweepAnimator<Row>, ticks: usize) -> Vec<usize> {
        (0..ticks)
            .map(|_| {
                let lit = animator.state().current_index();
                animator.tick().unwrap();
                lit
            })
            .collect()
    }

    #[test]
    fn test_triangle_wave() {
        let mut animator = animator(4);
        assert_eq!(
            trace(&mut animator, 18),
            [0, 1, 2, 3, 3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0, 0, 1]
        );
    }

    #[test]
    fn test_single_indicator_stays_lit() {
        let mut animator = animator(1);
        assert_eq!(trace(&mut animator, 5), [0, 0, 0, 0, 0]);
        assert_eq!(animator.indicators().lit, [true]);
    }

    #[test]
    fn test_empty_row_is_rejected() {
        let err = SweepAnimator::new(
            Row::new(0),
            Duration::from_millis(100),
            rate(BoundaryPolicy::Clamp),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NoIndicators);
    }

    #[test]
    fn test_first_tick_lights_only_the_first_indicator() {
        let mut animator = animator(3);
        animator.tick().unwrap();
        assert_eq!(animator.indicators().lit, [true, false, false]);
        animator.tick().unwrap();
        assert_eq!(animator.indicators().lit, [false, true, false]);
    }

    #[test]
    fn test_delay_follows_rate_level() {
        let rate = rate(BoundaryPolicy::Bounce);
        let mut animator =
            SweepAnimator::new(Row::new(10), Duration::from_millis(100), rate.clone())
                .unwrap();

        assert_eq!(animator.tick().unwrap(), Duration::from_millis(100));
        for _ in 0..3 {
            rate.apply_step();
        }
        assert_eq!(animator.tick().unwrap(), Duration::from_millis(300));
        for _ in 0..7 {
            rate.apply_step();
        }
        assert_eq!(animator.tick().unwrap(), Duration::from_millis(1000));
        rate.apply_step();
        assert_eq!(animator.tick().unwrap(), Duration::from_millis(900));
    }

    #[test]
    fn test_delay_for_negative_levels_divides() {
        let base = Duration::from_millis(100);
        assert_eq!(delay_for(base, -1), Duration::from_millis(100));
        assert_eq!(delay_for(base, -4), Duration::from_millis(25));
        assert_eq!(delay_for(base, -10), Duration::from_millis(10));
    }

    #[test]
    fn test_delay_is_floored() {
        assert_eq!(delay_for(Duration::from_millis(5), -10), MIN_DELAY);
        assert_eq!(delay_for(Duration::from_micros(1), 0), Duration::from_micros(1));
    }

    #[test]
    fn test_fault_propagates_and_all_off_tries_every_line() {
        let mut animator = animator(3);
        animator.tick().unwrap();
        animator.tick().unwrap();

        animator.indicators.fail_on = Some(1);
        let fault = animator.tick().unwrap_err();
        assert_eq!(fault.index, 1);

        let fault = animator.all_off().unwrap_err();
        assert_eq!(fault.index, 1);
        // Line 1 is stuck, the others were still switched off.
        assert!(!animator.indicators().lit[0]);
        assert!(!animator.indicators().lit[2]);
    }

    proptest! {
        #[test]
        fn prop_one_indicator_lit_after_each_tick(count in 1_usize..16, ticks in 1_usize..64) {
            let mut animator = animator(count);
            for _ in 0..ticks {
                animator.tick().unwrap();
                prop_assert_eq!(animator.indicators().lit_count(), 1);
                prop_assert!(animator.state().current_index() < count);
            }
            animator.all_off().unwrap();
            prop_assert_eq!(animator.indicators().lit_count(), 0);
        }

        #[test]
        fn prop_positions_move_by_at_most_one(count in 1_usize..16, ticks in 2_usize..64) {
            let mut animator = animator(count);
            let lit = trace(&mut animator, ticks);
            for pair in lit.windows(2) {
                prop_assert!(pair[0].abs_diff(pair[1]) <= 1);
            }
        }
    }
}
