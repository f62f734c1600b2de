//! Shared rate level, the only state the event handler and the sweep worker
//! have in common.
//!
//! The level lives behind a mutex and is never handed out by reference. Every
//! critical section is a handful of integer operations: no allocation, no
//! logging, no sleeping.

use std::num::NonZeroU16;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default bound of the rate level, in either direction.
pub const DEFAULT_LIMIT: u16 = 10;

/// What happens to events that would push the level past a bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// The level saturates; events pushing further are ignored.
    #[default]
    Clamp,
    /// The step direction reverses once the level reaches a bound.
    Bounce,
}

/// Sign of the unit step applied per event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RateDirection {
    #[default]
    Up,
    Down,
}

impl RateDirection {
    fn unit(self) -> i32 {
        match self {
            RateDirection::Up => 1,
            RateDirection::Down => -1,
        }
    }

    fn reversed(self) -> Self {
        match self {
            RateDirection::Up => RateDirection::Down,
            RateDirection::Down => RateDirection::Up,
        }
    }
}

/// How a single event moves the level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Nudge {
    /// Step in the currently stored direction.
    #[default]
    Continue,
    /// Store `direction`, then step.
    Toward(RateDirection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEffect {
    Moved,
    /// Reached (or bounced off) a bound, the stored direction now points
    /// back into the range.
    Reversed,
    /// Already at the bound under [`BoundaryPolicy::Clamp`], nothing changed.
    Saturated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub level: i32,
    pub direction: RateDirection,
    pub effect: StepEffect,
}

#[derive(Debug)]
struct Rate {
    level: i32,
    direction: RateDirection,
    limit: i32,
    policy: BoundaryPolicy,
}

impl Rate {
    fn step(&mut self) -> StepEffect {
        let mut next = self.level + self.direction.unit();
        let mut effect = StepEffect::Moved;
        if next.abs() > self.limit {
            match self.policy {
                BoundaryPolicy::Clamp => return StepEffect::Saturated,
                BoundaryPolicy::Bounce => {
                    self.direction = self.direction.reversed();
                    next = self.level + self.direction.unit();
                    effect = StepEffect::Reversed;
                }
            }
        }
        self.level = next;

        if self.policy == BoundaryPolicy::Bounce && next.abs() == self.limit {
            self.direction = if next > 0 {
                RateDirection::Down
            } else {
                RateDirection::Up
            };
            effect = StepEffect::Reversed;
        }
        effect
    }

    fn report(&self, effect: StepEffect) -> StepReport {
        StepReport {
            level: self.level,
            direction: self.direction,
            effect,
        }
    }
}

/// Signed level in `[-limit, limit]`, starting at zero and stepping up.
#[derive(Debug)]
pub struct RateState {
    inner: Mutex<Rate>,
}

impl RateState {
    pub fn new(limit: NonZeroU16, policy: BoundaryPolicy) -> Self {
        Self {
            inner: Mutex::new(Rate {
                level: 0,
                direction: RateDirection::Up,
                limit: i32::from(limit.get()),
                policy,
            }),
        }
    }

    /// Current level.
    pub fn read(&self) -> i32 {
        self.lock().level
    }

    /// Direction the next [`Self::apply_step`] moves in.
    pub fn direction(&self) -> RateDirection {
        self.lock().direction
    }

    /// Moves the level one unit in the stored direction, honoring the
    /// boundary policy.
    pub fn apply_step(&self) -> StepReport {
        self.nudge(Nudge::Continue)
    }

    /// Like [`Self::apply_step`], optionally overriding the stored direction
    /// first. Both happen in the same critical section.
    pub fn nudge(&self, nudge: Nudge) -> StepReport {
        let mut rate = self.lock();
        if let Nudge::Toward(direction) = nudge {
            rate.direction = direction;
        }
        let effect = rate.step();
        rate.report(effect)
    }

    // Every write under the lock is a plain assignment of a valid value, so a
    // panic elsewhere can't leave the state torn.
    fn lock(&self) -> MutexGuard<'_, Rate> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rate(policy: BoundaryPolicy) -> RateState {
        RateState::new(NonZeroU16::new(10).unwrap(), policy)
    }

    fn steps(rate: &RateState, n: usize) -> StepReport {
        let mut last = None;
        for _ in 0..n {
            last = Some(rate.apply_step());
        }
        last.unwrap()
    }

    #[test]
    fn test_starts_neutral_and_rising() {
        let rate = rate(BoundaryPolicy::Clamp);
        assert_eq!(rate.read(), 0);
        assert_eq!(rate.direction(), RateDirection::Up);
    }

    #[test]
    fn test_bounce_reverses_at_the_bound() {
        let rate = rate(BoundaryPolicy::Bounce);

        let report = steps(&rate, 3);
        assert_eq!(report.level, 3);
        assert_eq!(report.effect, StepEffect::Moved);
        assert_eq!(rate.direction(), RateDirection::Up);

        let report = steps(&rate, 7);
        assert_eq!(report.level, 10);
        assert_eq!(report.effect, StepEffect::Reversed);
        assert_eq!(rate.direction(), RateDirection::Down);

        let report = rate.apply_step();
        assert_eq!(report.level, 9);
        assert_eq!(report.effect, StepEffect::Moved);
    }

    #[test]
    fn test_bounce_travels_to_the_lower_bound_and_back() {
        let rate = rate(BoundaryPolicy::Bounce);
        steps(&rate, 10);

        let report = steps(&rate, 20);
        assert_eq!(report.level, -10);
        assert_eq!(report.effect, StepEffect::Reversed);
        assert_eq!(rate.direction(), RateDirection::Up);
        assert_eq!(rate.apply_step().level, -9);
    }

    #[test]
    fn test_bounce_reflects_an_outward_nudge_at_the_bound() {
        let rate = rate(BoundaryPolicy::Bounce);
        steps(&rate, 10);

        let report = rate.nudge(Nudge::Toward(RateDirection::Up));
        assert_eq!(report.level, 9);
        assert_eq!(report.effect, StepEffect::Reversed);
        assert_eq!(report.direction, RateDirection::Down);
    }

    #[test]
    fn test_clamp_saturates_at_the_bound() {
        let rate = rate(BoundaryPolicy::Clamp);

        assert_eq!(steps(&rate, 10).level, 10);
        let report = rate.apply_step();
        assert_eq!(report.level, 10);
        assert_eq!(report.effect, StepEffect::Saturated);
        assert_eq!(rate.direction(), RateDirection::Up);

        let report = steps(&rate, 5);
        assert_eq!(report.level, 10);
        assert_eq!(report.effect, StepEffect::Saturated);
    }

    #[test]
    fn test_clamp_leaves_the_bound_on_an_opposite_event() {
        let rate = rate(BoundaryPolicy::Clamp);
        steps(&rate, 11);

        let report = rate.nudge(Nudge::Toward(RateDirection::Down));
        assert_eq!(report.level, 9);
        assert_eq!(report.effect, StepEffect::Moved);
        assert_eq!(rate.direction(), RateDirection::Down);
    }

    #[test]
    fn test_clamp_lower_bound() {
        let rate = rate(BoundaryPolicy::Clamp);
        for _ in 0..15 {
            rate.nudge(Nudge::Toward(RateDirection::Down));
        }
        assert_eq!(rate.read(), -10);
    }

    #[test]
    fn test_limit_of_one() {
        let rate = RateState::new(NonZeroU16::MIN, BoundaryPolicy::Bounce);
        let levels: Vec<i32> = (0..5).map(|_| rate.apply_step().level).collect();
        assert_eq!(levels, [1, 0, -1, 0, 1]);
    }

    fn policy() -> impl Strategy<Value = BoundaryPolicy> {
        prop_oneof![Just(BoundaryPolicy::Clamp), Just(BoundaryPolicy::Bounce)]
    }

    fn nudge() -> impl Strategy<Value = Nudge> {
        prop_oneof![
            Just(Nudge::Continue),
            Just(Nudge::Toward(RateDirection::Up)),
            Just(Nudge::Toward(RateDirection::Down)),
        ]
    }

    proptest! {
        #[test]
        fn prop_level_stays_in_range(
            limit in 1_u16..=20,
            policy in policy(),
            nudges in prop::collection::vec(nudge(), 0..200),
        ) {
            let rate = RateState::new(NonZeroU16::new(limit).unwrap(), policy);
            let limit = i32::from(limit);
            for nudge in nudges {
                let report = rate.nudge(nudge);
                prop_assert!((-limit..=limit).contains(&report.level));
                prop_assert_eq!(report.level, rate.read());
            }
        }

        #[test]
        fn prop_each_event_moves_at_most_one_unit(
            policy in policy(),
            nudges in prop::collection::vec(nudge(), 1..100),
        ) {
            let rate = rate(policy);
            let mut previous = rate.read();
            for nudge in nudges {
                let report = rate.nudge(nudge);
                prop_assert!((report.level - previous).abs() <= 1);
                prop_assert_eq!(
                    report.effect == StepEffect::Saturated,
                    report.level == previous,
                );
                previous = report.level;
            }
        }
    }
}
