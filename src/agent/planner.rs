//! Order selection and goal planning.

use super::{Agent, PartnerView};
use crate::grid::{Coord, StationKind};
use crate::kitchen::{Kitchen, Order, OrderId};
use crate::recipe::{FoodItem, FoodState, Recipe, match_flags, possible_recipes};
use serde::{Deserialize, Serialize};

/// How an agent ranks the open orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Pool order.
    Naive,
    /// Shortest estimated preparation time first.
    Simple,
    /// Highest difficulty first.
    Complex,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Naive => "naive",
            Strategy::Simple => "simple",
            Strategy::Complex => "complex",
        };
        f.write_str(name)
    }
}

impl Agent {
    /// Pick an order, avoiding the partner's unless it is the only one.
    pub(super) fn choose_order(
        &self,
        kitchen: &Kitchen,
        partner: Option<&PartnerView>,
    ) -> Option<OrderId> {
        let mut ranked: Vec<&Order> = kitchen.orders().iter().collect();
        match self.strategy {
            Strategy::Naive => {}
            Strategy::Simple => {
                let timing = kitchen.timing();
                ranked.sort_by(|a, b| {
                    a.recipe
                        .estimated_time(timing)
                        .total_cmp(&b.recipe.estimated_time(timing))
                });
            }
            Strategy::Complex => {
                ranked.sort_by_key(|order| std::cmp::Reverse(order.recipe.difficulty()));
            }
        }

        let taken = partner.and_then(|p| p.order);
        ranked
            .iter()
            .find(|order| Some(order.id) != taken)
            .or(ranked.first())
            .map(|order| order.id)
    }

    /// Keep the chosen order if it is still open, otherwise pick a new one.
    pub(super) fn ensure_order_valid(&mut self, kitchen: &Kitchen, partner: Option<&PartnerView>) {
        if self.order.is_some_and(|id| kitchen.order(id).is_some()) {
            return;
        }
        if let Some(stale) = self.order {
            log::debug!("agent {} drops closed order {stale:?}", self.id);
        }
        self.select_order(kitchen, partner);
    }

    pub(super) fn select_order(&mut self, kitchen: &Kitchen, partner: Option<&PartnerView>) {
        self.order = self.choose_order(kitchen, partner);
        self.next_requirement = 0;
        self.assembly_target = None;
        if let Some(order) = self.order.and_then(|id| kitchen.order(id)) {
            log::debug!(
                "agent {} ({}) takes order {:?} for {:?}",
                self.id,
                self.strategy,
                order.id,
                order.recipe.name
            );
        }
    }

    /// Choose the next goal and route towards it.
    pub(super) fn plan(&mut self, kitchen: &Kitchen, partner: Option<&PartnerView>) {
        self.ensure_order_valid(kitchen, partner);

        if let Some(item) = &self.item {
            if kitchen.is_dish(&item.name) {
                let services = kitchen.grid().stations(StationKind::Service).to_vec();
                self.route_to(kitchen.grid(), partner, &services);
                return;
            }
        }

        let Some(recipe) = self
            .order
            .and_then(|id| kitchen.order(id))
            .map(|order| order.recipe.clone())
        else {
            return;
        };

        if let Some(item) = self.item.clone() {
            self.plan_for_item(kitchen, partner, &recipe, &item);
            return;
        }

        let ready = kitchen.ready_cookers();
        if !ready.is_empty() && self.route_to(kitchen.grid(), partner, &ready) {
            return;
        }

        if let Some(plate) = finished_plate(kitchen) {
            self.assembly_target = Some(plate);
            self.route_to(kitchen.grid(), partner, &[plate]);
            return;
        }

        if let Some((buffer, complete)) = self.best_buffer(kitchen, &recipe) {
            self.assembly_target = Some(buffer);
            if complete {
                self.route_to(kitchen.grid(), partner, &[buffer]);
                return;
            }
        } else {
            self.assembly_target = None;
        }

        if let Some(idx) = self.next_open_requirement(kitchen, &recipe) {
            self.next_requirement = idx;
            let bins = kitchen.grid().bins_supplying(&recipe.requirements[idx].name);
            self.route_to(kitchen.grid(), partner, &bins);
        }
    }

    /// Route the held item to its next transformation or to assembly.
    fn plan_for_item(
        &mut self,
        kitchen: &Kitchen,
        partner: Option<&PartnerView>,
        recipe: &Recipe,
        item: &FoodItem,
    ) {
        let next = recipe
            .requirement_for(&item.name)
            .and_then(|req| req.next_state(item.state));
        let grid = kitchen.grid();

        match next {
            Some(FoodState::Cut) if item.state == FoodState::RawFromBin => {
                let boards = grid.stations(StationKind::CuttingBoard).to_vec();
                self.route_to(grid, partner, &boards);
            }
            Some(FoodState::Cooked) if item.state != FoodState::Cooked => {
                let cookers = grid.cookers();
                let free: Vec<Coord> = cookers
                    .iter()
                    .copied()
                    .filter(|&cooker| kitchen.cooking_slot(cooker).is_none())
                    .collect();
                let targets = if free.is_empty() { cookers } else { free };
                self.route_to(grid, partner, &targets);
            }
            _ => {
                let targets = self.assembly_targets(kitchen, item);
                self.route_to(grid, partner, &targets);
            }
        }
    }

    /// Assembly stations worth bringing `item` to, best first.
    fn assembly_targets(&self, kitchen: &Kitchen, item: &FoodItem) -> Vec<Coord> {
        let fits = |station: Coord| {
            let buffer = kitchen.buffer(station);
            if buffer.is_empty() {
                return true;
            }
            let mut tentative = buffer.to_vec();
            tentative.push(item.clone());
            !possible_recipes(&tentative, kitchen.open_recipes()).is_empty()
        };

        if let Some(target) = self.assembly_target.filter(|&target| fits(target)) {
            return vec![target];
        }
        let all = kitchen.grid().stations(StationKind::Assembly);
        let fitting: Vec<Coord> = all.iter().copied().filter(|&station| fits(station)).collect();
        if fitting.is_empty() {
            all.to_vec()
        } else {
            fitting
        }
    }

    /// Buffer holding most of `recipe`, nearest first on ties, and whether
    /// it already completes the recipe.
    fn best_buffer(&self, kitchen: &Kitchen, recipe: &Recipe) -> Option<(Coord, bool)> {
        let mut best: Option<(Coord, usize, u32, bool)> = None;
        for (&station, stock) in kitchen.buffers() {
            let flags = match_flags(stock, recipe);
            let matches = flags.iter().filter(|&&flag| flag).count();
            if matches == 0 {
                continue;
            }
            let dist = self.pos.manhattan(station);
            let better = best.is_none_or(|(_, best_matches, best_dist, _)| {
                matches > best_matches || (matches == best_matches && dist < best_dist)
            });
            if better {
                best = Some((station, matches, dist, flags.iter().all(|&flag| flag)));
            }
        }
        best.map(|(station, _, _, complete)| (station, complete))
    }

    /// First requirement not already covered by the held item, an assembly
    /// buffer or a cooking slot, and whose ingredient is not being cooked.
    pub(super) fn next_open_requirement(&self, kitchen: &Kitchen, recipe: &Recipe) -> Option<usize> {
        let cooking: Vec<&FoodItem> = kitchen.cooking_slots().map(|(_, slot)| &slot.item).collect();
        let mut present: Vec<FoodItem> = self.item.iter().cloned().collect();
        for (_, stock) in kitchen.buffers() {
            present.extend(stock.iter().cloned());
        }
        for item in &cooking {
            if let Some(state) = recipe
                .requirement_for(&item.name)
                .and_then(|req| req.final_state())
            {
                present.push(FoodItem {
                    name: item.name.clone(),
                    state,
                });
            }
        }

        let covered = match_flags(&present, recipe);
        recipe
            .requirements
            .iter()
            .zip(covered)
            .position(|(req, covered)| {
                !covered && !cooking.iter().any(|item| item.name == req.name)
            })
    }
}

/// Assembly station holding a finished dish some open order wants.
fn finished_plate(kitchen: &Kitchen) -> Option<Coord> {
    kitchen
        .buffers()
        .find(|(_, stock)| matches!(stock.as_slice(), [dish] if kitchen.is_dish(&dish.name)))
        .map(|(&station, _)| station)
}
