//! Race bookkeeping.
//!
//! `RaceState` is the only mutable state the aggregator shares between
//! listener callbacks. It never calls out to transfers or listeners: every
//! method decides what should happen and returns it, and the caller acts on
//! the decision after releasing the lock.

use peerfetch_core::PromotionPolicy;

/// Where the race is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Constructed, source location not started yet.
    Idle,
    /// Source location started, no winner yet.
    Running,
    /// Finished; no further decisions are made.
    Decided(Resolution),
}

/// How a decided race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// The transfer at this roster index completed first.
    Won(usize),
    /// Every transfer failed or was cancelled externally.
    Exhausted,
    /// The caller cancelled the whole race.
    Cancelled,
}

/// Result of a successful `begin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Start {
    /// Roster index of the selected transfer.
    pub selected: usize,
    /// Live transfers to consider for source location, selected first.
    pub order: Vec<usize>,
}

/// Result of the first completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Victory {
    /// Roster index that was selected before the winner took over.
    pub previous_selected: usize,
    /// Live transfers that lost and must be retired.
    pub losers: Vec<usize>,
    /// Whether the initial selection had been announced.
    pub announced: bool,
}

/// Result of recording a failed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    /// Whether the failed transfer was the selected one.
    pub was_selected: bool,
    /// New selection, if the policy promoted a standby.
    pub promoted: Option<usize>,
    /// Whether this failure left no live transfer.
    pub exhausted: bool,
}

/// Mutable race state guarded by the aggregator's mutex.
#[derive(Debug)]
pub(crate) struct RaceState {
    selected: usize,
    phase: Phase,
    dead: Vec<bool>,
}

impl RaceState {
    /// Create state for a roster of `len` transfers with index 0 selected.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            selected: 0,
            phase: Phase::Idle,
            dead: vec![false; len],
        }
    }

    pub(crate) const fn selected(&self) -> usize {
        self.selected
    }

    pub(crate) const fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) const fn is_decided(&self) -> bool {
        matches!(self.phase, Phase::Decided(_))
    }

    /// Whether `index` still takes part in an undecided race.
    pub(crate) fn is_live(&self, index: usize) -> bool {
        !self.is_decided() && !self.dead[index]
    }

    /// Live roster indices, selected first, then the rest in roster order.
    fn live_order(&self) -> Vec<usize> {
        std::iter::once(self.selected)
            .chain((0..self.dead.len()).filter(|&i| i != self.selected))
            .filter(|&i| !self.dead[i])
            .collect()
    }

    /// Live roster indices other than `except`.
    fn live_except(&self, except: usize) -> Vec<usize> {
        (0..self.dead.len())
            .filter(|&i| i != except && !self.dead[i])
            .collect()
    }

    /// Move from idle to running.
    ///
    /// Returns `None` if source location was already started or the race is
    /// already decided.
    pub(crate) fn begin(&mut self) -> Option<Start> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.phase = Phase::Running;
        Some(Start {
            selected: self.selected,
            order: self.live_order(),
        })
    }

    /// Record a completion.
    ///
    /// Only the first completion wins; later ones return `None`. The winner
    /// becomes the selected transfer.
    pub(crate) fn complete(&mut self, index: usize) -> Option<Victory> {
        if self.is_decided() || self.dead[index] {
            return None;
        }
        let previous_selected = self.selected;
        let announced = self.phase != Phase::Idle;
        self.selected = index;
        self.phase = Phase::Decided(Resolution::Won(index));
        Some(Victory {
            previous_selected,
            losers: self.live_except(index),
            announced,
        })
    }

    /// Record a failed or externally cancelled transfer.
    ///
    /// Returns `None` if the race is decided or the transfer was already
    /// recorded as dead.
    pub(crate) fn fail(&mut self, index: usize, policy: PromotionPolicy) -> Option<Failure> {
        if self.is_decided() || self.dead[index] {
            return None;
        }
        self.dead[index] = true;

        let was_selected = self.selected == index;
        let len = self.dead.len();
        let next_live = (1..len)
            .map(|offset| (index + offset) % len)
            .find(|&i| !self.dead[i]);

        let exhausted = next_live.is_none();
        if exhausted {
            self.phase = Phase::Decided(Resolution::Exhausted);
        }

        let promoted = match (was_selected, policy, next_live) {
            (true, PromotionPolicy::NextStandby, Some(next)) => {
                self.selected = next;
                Some(next)
            }
            _ => None,
        };

        Some(Failure {
            was_selected,
            promoted,
            exhausted,
        })
    }

    /// Decide the race as cancelled.
    ///
    /// Returns the live transfers to retire, or `None` if already decided.
    pub(crate) fn cancel(&mut self) -> Option<Vec<usize>> {
        if self.is_decided() {
            return None;
        }
        self.phase = Phase::Decided(Resolution::Cancelled);
        Some(self.live_except(usize::MAX))
    }

    /// Live transfers that are still worth talking to.
    pub(crate) fn live(&self) -> Vec<usize> {
        if self.is_decided() {
            return Vec::new();
        }
        self.live_except(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_only_once() {
        let mut race = RaceState::new(3);
        let start = race.begin().unwrap();
        assert_eq!(start.selected, 0);
        assert_eq!(start.order, vec![0, 1, 2]);
        assert!(race.begin().is_none());
        assert_eq!(race.phase(), Phase::Running);
    }

    #[test]
    fn first_completion_wins() {
        let mut race = RaceState::new(4);
        race.begin();

        let victory = race.complete(2).unwrap();
        assert_eq!(victory.previous_selected, 0);
        assert_eq!(victory.losers, vec![0, 1, 3]);
        assert_eq!(race.selected(), 2);
        assert_eq!(race.phase(), Phase::Decided(Resolution::Won(2)));

        // A second completion is absorbed.
        assert!(race.complete(1).is_none());
        assert_eq!(race.selected(), 2);
    }

    #[test]
    fn completion_before_start_still_wins() {
        let mut race = RaceState::new(2);
        let victory = race.complete(0).unwrap();
        assert_eq!(victory.previous_selected, 0);
        assert!(!victory.announced);
        assert!(race.begin().is_none());
    }

    #[test]
    fn decided_race_has_no_live_transfers() {
        let mut race = RaceState::new(3);
        race.begin();
        race.fail(1, PromotionPolicy::NextStandby);
        assert!(race.is_live(0));
        assert!(!race.is_live(1));

        let victory = race.complete(0).unwrap();
        assert!(victory.announced);
        assert!(!race.is_live(0));
        assert!(!race.is_live(2));
    }

    #[test]
    fn losers_skip_dead_transfers() {
        let mut race = RaceState::new(4);
        race.begin();
        race.fail(3, PromotionPolicy::NextStandby);
        let victory = race.complete(1).unwrap();
        assert_eq!(victory.losers, vec![0, 2]);
    }

    #[test]
    fn selected_failure_promotes_next_live_standby() {
        let mut race = RaceState::new(4);
        race.begin();
        race.fail(1, PromotionPolicy::NextStandby);

        let failure = race.fail(0, PromotionPolicy::NextStandby).unwrap();
        assert!(failure.was_selected);
        assert_eq!(failure.promoted, Some(2));
        assert!(!failure.exhausted);
        assert_eq!(race.selected(), 2);
    }

    #[test]
    fn promotion_wraps_around_the_roster() {
        let mut race = RaceState::new(3);
        race.begin();
        race.fail(0, PromotionPolicy::NextStandby);
        assert_eq!(race.selected(), 1);
        race.fail(2, PromotionPolicy::NextStandby);

        let failure = race.fail(1, PromotionPolicy::NextStandby).unwrap();
        assert!(failure.exhausted);
        assert_eq!(failure.promoted, None);
    }

    #[test]
    fn retain_policy_keeps_selection() {
        let mut race = RaceState::new(3);
        race.begin();
        let failure = race.fail(0, PromotionPolicy::Retain).unwrap();
        assert!(failure.was_selected);
        assert_eq!(failure.promoted, None);
        assert_eq!(race.selected(), 0);

        // The dead selected transfer cannot win afterwards.
        assert!(race.complete(0).is_none());
        assert!(race.complete(1).is_some());
    }

    #[test]
    fn standby_failure_does_not_touch_selection() {
        let mut race = RaceState::new(3);
        race.begin();
        let failure = race.fail(2, PromotionPolicy::NextStandby).unwrap();
        assert!(!failure.was_selected);
        assert_eq!(failure.promoted, None);
        assert_eq!(race.selected(), 0);
    }

    #[test]
    fn repeated_failure_is_ignored() {
        let mut race = RaceState::new(2);
        race.begin();
        assert!(race.fail(1, PromotionPolicy::NextStandby).is_some());
        assert!(race.fail(1, PromotionPolicy::NextStandby).is_none());
    }

    #[test]
    fn exhaustion_decides_the_race() {
        let mut race = RaceState::new(2);
        race.begin();
        race.fail(0, PromotionPolicy::NextStandby);
        let failure = race.fail(1, PromotionPolicy::NextStandby).unwrap();
        assert!(failure.exhausted);
        assert_eq!(race.phase(), Phase::Decided(Resolution::Exhausted));
        assert!(race.live().is_empty());
    }

    #[test]
    fn cancel_retires_live_transfers_once() {
        let mut race = RaceState::new(3);
        race.begin();
        race.fail(1, PromotionPolicy::NextStandby);
        assert_eq!(race.cancel(), Some(vec![0, 2]));
        assert_eq!(race.cancel(), None);
        assert!(race.complete(0).is_none());
    }
}
