//! Two-agent coordination: station reservation and collision avoidance.

use super::{Agent, AgentId};
use crate::grid::{Coord, Grid};
use crate::kitchen::OrderId;
use crate::pathfinder::{find_path, stations_to_adjacent_cells};
use std::collections::BTreeSet;

/// What an agent may know about its partner during its own turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerView {
    pub id: AgentId,
    pub pos: Coord,
    /// At most the next two cells of the partner's route.
    pub next_steps: Vec<Coord>,
    pub target_station: Option<Coord>,
    pub order: Option<OrderId>,
}

/// Cells to avoid when routing: the partner's cell and its next steps.
pub fn dynamic_obstacles(partner: Option<&PartnerView>) -> BTreeSet<Coord> {
    partner
        .map(|p| std::iter::once(p.pos).chain(p.next_steps.iter().copied()).collect())
        .unwrap_or_default()
}

/// `station` is claimed by the partner and the partner has priority on it.
///
/// The closer agent wins; on equal distance the lower id wins.
pub fn yields_station(
    station: Coord,
    me: AgentId,
    my_pos: Coord,
    partner: Option<&PartnerView>,
) -> bool {
    let Some(partner) = partner else {
        return false;
    };
    if partner.target_station != Some(station) {
        return false;
    }
    let mine = my_pos.manhattan(station);
    let theirs = partner.pos.manhattan(station);
    (mine, me) > (theirs, partner.id)
}

/// Drop the stations the partner has priority on.
///
/// Falls back to every candidate when nothing is left, so a single shared
/// station is never reserved away for good.
pub fn reserve_stations(
    candidates: &[Coord],
    me: AgentId,
    my_pos: Coord,
    partner: Option<&PartnerView>,
) -> Vec<Coord> {
    let kept: Vec<Coord> = candidates
        .iter()
        .copied()
        .filter(|&station| !yields_station(station, me, my_pos, partner))
        .collect();
    if kept.is_empty() {
        candidates.to_vec()
    } else {
        kept
    }
}

impl Agent {
    /// Plan a route next to one of `stations`.
    ///
    /// Clears the route and target when no station can be reached.
    pub(super) fn route_to(
        &mut self,
        grid: &Grid,
        partner: Option<&PartnerView>,
        stations: &[Coord],
    ) -> bool {
        let candidates = reserve_stations(stations, self.id, self.pos, partner);
        let obstacles = dynamic_obstacles(partner);
        let goals = stations_to_adjacent_cells(grid, &candidates, &obstacles);

        let Some(path) = find_path(grid, self.pos, &goals, &obstacles) else {
            log::trace!("agent {} found no route from {}", self.id, self.pos);
            self.path.clear();
            self.target_station = None;
            return false;
        };

        let end = path.last().copied().unwrap_or(self.pos);
        self.target_station = candidates
            .iter()
            .copied()
            .min_by_key(|station| station.manhattan(end));
        self.path = path.into();
        self.move_counter = 0;
        true
    }
}
