//! Stagnation detection: step aside first, drop the goal if that fails.

use super::{Agent, PartnerView};
use crate::grid::{Coord, Grid};
use crate::kitchen::Kitchen;
use rand::{Rng, seq::IndexedRandom};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stagnation {
    Progressing,
    Retreating,
    HardReset,
}

/// Tracks how long an agent has stayed on one cell without progress.
#[derive(Debug, Clone)]
pub struct BlockageMonitor {
    state: Stagnation,
    since: f64,
    last_pos: Coord,
}

impl BlockageMonitor {
    pub fn new(pos: Coord, now: f64) -> Self {
        Self {
            state: Stagnation::Progressing,
            since: now,
            last_pos: pos,
        }
    }

    /// Classify the current stagnation. Moving restarts the timer.
    pub fn observe(
        &mut self,
        pos: Coord,
        now: f64,
        retreat_after: f64,
        reset_after: f64,
    ) -> Stagnation {
        if pos != self.last_pos {
            self.reset(pos, now);
            return self.state;
        }
        let stagnant = now - self.since;
        self.state = if stagnant > reset_after {
            Stagnation::HardReset
        } else if stagnant >= retreat_after {
            Stagnation::Retreating
        } else {
            Stagnation::Progressing
        };
        self.state
    }

    pub fn reset(&mut self, pos: Coord, now: f64) {
        self.state = Stagnation::Progressing;
        self.since = now;
        self.last_pos = pos;
    }
}

impl Agent {
    /// Returns `true` when recovery took over this tick.
    pub(super) fn check_blockage<R: Rng + ?Sized>(
        &mut self,
        kitchen: &Kitchen,
        partner: Option<&PartnerView>,
        rng: &mut R,
    ) -> bool {
        let now = kitchen.now();
        let state = self.monitor.observe(
            self.pos,
            now,
            self.tuning.retreat_threshold_s,
            self.tuning.block_timeout_s,
        );
        match state {
            Stagnation::Progressing => false,
            Stagnation::Retreating => self.retreat(kitchen.grid(), partner, now, rng),
            Stagnation::HardReset => {
                self.hard_reset(now);
                true
            }
        }
    }

    /// Step onto a random free neighbour that is neither the partner's cell
    /// nor the planned next step, then pause.
    fn retreat<R: Rng + ?Sized>(
        &mut self,
        grid: &Grid,
        partner: Option<&PartnerView>,
        now: f64,
        rng: &mut R,
    ) -> bool {
        let partner_pos = partner.map(|p| p.pos);
        let planned = self.path.front().copied();
        let candidates: Vec<Coord> = self
            .pos
            .neighbours()
            .into_iter()
            .filter(|&cell| !grid.is_blocking(cell))
            .filter(|&cell| Some(cell) != partner_pos && Some(cell) != planned)
            .collect();
        let Some(&cell) = candidates.choose(rng) else {
            return false;
        };

        log::debug!("agent {} retreats from {} to {cell}", self.id, self.pos);
        self.path = VecDeque::from([cell]);
        self.step(grid, now);
        self.pause_until = now + self.tuning.retreat_pause_s;
        true
    }

    /// Forget the current goal entirely and pause.
    fn hard_reset(&mut self, now: f64) {
        log::debug!(
            "agent {} resets at {} after {:.1}s without progress",
            self.id,
            self.pos,
            self.tuning.block_timeout_s
        );
        self.path.clear();
        self.target_station = None;
        self.order = None;
        self.next_requirement = 0;
        self.assembly_target = None;
        self.pause_until = now + self.tuning.reset_pause_s;
        self.mark_progress(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testkit::{agent, kitchen};
    use crate::recipe::{FoodState, IngredientRequirement, Recipe};

    const CORRIDOR: [&str; 3] = ["#######", "#B...S#", "#######"];

    fn toast() -> Recipe {
        Recipe::new(
            "Toast",
            vec![IngredientRequirement::new("bread", &[FoodState::Cut])],
        )
    }

    #[test]
    fn monitor_thresholds() {
        let pos = Coord::new(1, 1);
        let mut monitor = BlockageMonitor::new(pos, 0.0);
        assert_eq!(monitor.observe(pos, 1.9, 2.0, 5.0), Stagnation::Progressing);
        assert_eq!(monitor.observe(pos, 2.0, 2.0, 5.0), Stagnation::Retreating);
        assert_eq!(monitor.observe(pos, 5.0, 2.0, 5.0), Stagnation::Retreating);
        assert_eq!(monitor.observe(pos, 5.1, 2.0, 5.0), Stagnation::HardReset);
        assert_eq!(
            monitor.observe(Coord::new(2, 1), 5.2, 2.0, 5.0),
            Stagnation::Progressing
        );
        assert_eq!(
            monitor.observe(Coord::new(2, 1), 6.0, 2.0, 5.0),
            Stagnation::Progressing
        );
    }

    #[test]
    fn retreat_at_threshold_moves_within_one_tick() {
        let (mut k, mut rng) = kitchen(&CORRIDOR, &["bread"], &[toast()], 1);
        let mut a = agent(0, Coord::new(3, 1), Some(1));
        let b = agent(1, Coord::new(2, 1), Some(0));
        k.advance_clock(2.0);

        a.advance(&mut k, Some(&b.view()), &mut rng);
        assert_eq!(a.pos, Coord::new(4, 1));
        assert_eq!(a.pause_until, 2.0 + a.tuning.retreat_pause_s);
        assert_eq!(a.monitor.state, Stagnation::Progressing);
    }

    #[test]
    fn retreat_avoids_the_planned_step() {
        let (mut k, mut rng) = kitchen(&CORRIDOR, &["bread"], &[toast()], 1);
        let mut a = agent(0, Coord::new(3, 1), None);
        a.path = VecDeque::from([Coord::new(4, 1), Coord::new(5, 1)]);
        k.advance_clock(2.0);

        a.advance(&mut k, None, &mut rng);
        assert_eq!(a.pos, Coord::new(2, 1));
    }

    #[test]
    fn hard_reset_clears_goal() {
        let (mut k, mut rng) = kitchen(&CORRIDOR, &["bread"], &[toast()], 1);
        let mut a = agent(0, Coord::new(3, 1), None);
        a.order = Some(k.orders()[0].id);
        a.path = VecDeque::from([Coord::new(4, 1)]);
        a.target_station = Some(Coord::new(5, 1));
        k.advance_clock(5.5);

        a.advance(&mut k, None, &mut rng);
        assert_eq!(a.order, None);
        assert!(a.path.is_empty());
        assert_eq!(a.target_station, None);
        assert_eq!(a.pos, Coord::new(3, 1));
        assert_eq!(a.pause_until, 5.5 + a.tuning.reset_pause_s);
    }

    #[test]
    fn boxed_in_agent_keeps_waiting() {
        let (mut k, mut rng) = kitchen(&["#####", "#B.S#", "#####"], &["bread"], &[toast()], 1);
        let mut a = agent(0, Coord::new(2, 1), None);
        k.advance_clock(3.0);
        assert!(!a.check_blockage(&k, None, &mut rng));
        assert_eq!(a.pos, Coord::new(2, 1));
        assert_eq!(a.monitor.state, Stagnation::Retreating);
    }
}
