//! Kitchen agents: per-agent state and the per-tick decision cycle.
//!
//! Each tick an agent that is not paused first checks for stagnation, then
//! either acts on the station it stands next to, plans a new goal, or walks
//! one step of its current route.

mod coordination;
mod executor;
mod planner;
mod recovery;

pub use coordination::PartnerView;
pub use planner::Strategy;

use crate::config::AgentConfig;
use crate::grid::{Coord, Grid};
use crate::kitchen::{ActionKind, Kitchen, OrderId, PendingAction};
use crate::recipe::{FoodItem, FoodState};
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use recovery::BlockageMonitor;
use std::collections::VecDeque;

/// Index of an agent in the engine's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub usize);

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Movement and recovery parameters shared by all agents.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub move_every_ticks: u32,
    pub retreat_threshold_s: f64,
    pub block_timeout_s: f64,
    pub retreat_pause_s: f64,
    pub reset_pause_s: f64,
    yield_pause: Uniform<f64>,
}

impl Tuning {
    pub fn from_config(cfg: &AgentConfig) -> Result<Self> {
        let yield_pause = Uniform::new_inclusive(cfg.yield_pause_min_s, cfg.yield_pause_max_s)
            .context("failed to build yield pause distribution")?;
        Ok(Self {
            move_every_ticks: cfg.move_every_ticks,
            retreat_threshold_s: cfg.retreat_threshold_s,
            block_timeout_s: cfg.block_timeout_s,
            retreat_pause_s: cfg.retreat_pause_s,
            reset_pause_s: cfg.reset_pause_s,
            yield_pause,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    strategy: Strategy,
    partner: Option<AgentId>,
    tuning: Tuning,

    pos: Coord,
    item: Option<FoodItem>,

    path: VecDeque<Coord>,
    /// Station the current route leads to, visible to the partner.
    target_station: Option<Coord>,
    order: Option<OrderId>,
    next_requirement: usize,
    assembly_target: Option<Coord>,

    move_counter: u32,
    monitor: BlockageMonitor,
    pause_until: f64,
}

impl Agent {
    pub fn new(
        id: AgentId,
        strategy: Strategy,
        pos: Coord,
        partner: Option<AgentId>,
        tuning: Tuning,
        now: f64,
    ) -> Self {
        Self {
            id,
            strategy,
            partner,
            tuning,
            pos,
            item: None,
            path: VecDeque::new(),
            target_station: None,
            order: None,
            next_requirement: 0,
            assembly_target: None,
            move_counter: 0,
            monitor: BlockageMonitor::new(pos, now),
            pause_until: 0.0,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn partner(&self) -> Option<AgentId> {
        self.partner
    }

    pub fn pos(&self) -> Coord {
        self.pos
    }

    pub fn item(&self) -> Option<&FoodItem> {
        self.item.as_ref()
    }

    /// Snapshot the partner reads during its own turn.
    pub fn view(&self) -> PartnerView {
        PartnerView {
            id: self.id,
            pos: self.pos,
            next_steps: self.path.iter().take(2).copied().collect(),
            target_station: self.target_station,
            order: self.order,
        }
    }

    /// Run one tick of the decision cycle.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        kitchen: &mut Kitchen,
        partner: Option<&PartnerView>,
        rng: &mut R,
    ) {
        let now = kitchen.now();
        if now < self.pause_until {
            return;
        }

        if self.check_blockage(kitchen, partner, rng) {
            return;
        }

        if self.path.is_empty() {
            if !self.try_action(kitchen, partner, rng) {
                self.plan(kitchen, partner);
            }
            return;
        }

        self.move_counter += 1;
        if self.move_counter < self.tuning.move_every_ticks {
            return;
        }

        if partner.is_some_and(|p| self.path.front() == Some(&p.pos)) {
            // Let the partner pass before replanning.
            self.path.clear();
            self.pause_until = now + self.tuning.yield_pause.sample(rng);
        } else {
            self.step(kitchen.grid(), now);
            self.move_counter = 0;
        }

        if self.path.is_empty() && self.try_action(kitchen, partner, rng) {
            self.mark_progress(now);
        }
    }

    /// Walk the next cell of the route.
    fn step(&mut self, grid: &Grid, now: f64) {
        let Some(next) = self.path.pop_front() else {
            return;
        };
        if !self.pos.is_adjacent(next) || grid.is_blocking(next) {
            log::trace!("agent {} dropped invalid step {next}", self.id);
            self.path.clear();
            return;
        }
        self.pos = next;
        self.mark_progress(now);
    }

    /// Reset the stagnation timer.
    pub fn mark_progress(&mut self, now: f64) {
        self.monitor.reset(self.pos, now);
    }

    /// Apply the outcome of a finished blocking action.
    pub fn finish_action(&mut self, action: &PendingAction, now: f64) {
        match action.kind {
            ActionKind::Cut => {
                if let Some(item) = self.item.as_mut() {
                    item.transform(FoodState::Cut);
                }
            }
        }
        self.mark_progress(now);
    }
}
