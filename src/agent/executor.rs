//! Station interactions, tried in a fixed order each time an agent stops.

use super::{Agent, PartnerView};
use crate::grid::{Coord, StationKind};
use crate::kitchen::{ActionKind, Kitchen};
use crate::pathfinder::adjacent_station;
use crate::recipe::{FoodItem, FoodState, Recipe, accepts_all, is_complete, possible_recipes};
use rand::Rng;

impl Agent {
    /// Interact with an adjacent station. Returns `true` if anything changed.
    ///
    /// Bins, cutting boards, cookers, assembly and service are tried in that
    /// order and the first applicable interaction wins.
    pub(super) fn try_action<R: Rng + ?Sized>(
        &mut self,
        kitchen: &mut Kitchen,
        partner: Option<&PartnerView>,
        rng: &mut R,
    ) -> bool {
        self.ensure_order_valid(kitchen, partner);
        let now = kitchen.now();
        let recipe = self
            .order
            .and_then(|id| kitchen.order(id))
            .map(|order| order.recipe.clone());

        let acted = self.take_from_bin(kitchen, recipe.as_ref())
            || self.cut(kitchen, recipe.as_ref())
            || self.cook(kitchen, recipe.as_ref())
            || self.assemble(kitchen, partner, recipe.as_ref(), now)
            || self.serve(kitchen, partner, rng);
        if acted {
            self.mark_progress(now);
        }
        acted
    }

    fn take_from_bin(&mut self, kitchen: &Kitchen, recipe: Option<&Recipe>) -> bool {
        if self.item.is_some() {
            return false;
        }
        let Some(recipe) = recipe.filter(|recipe| !recipe.requirements.is_empty()) else {
            return false;
        };
        let wanted = &recipe.requirements[self.next_requirement % recipe.requirements.len()].name;

        let grid = kitchen.grid();
        let supplied = grid.stations(StationKind::Bin).iter().any(|&bin| {
            self.pos.is_adjacent(bin) && grid.bin_supply(bin).is_some_and(|s| s.supplies(wanted))
        });
        if !supplied {
            return false;
        }
        log::trace!("agent {} takes {wanted:?} from a bin", self.id);
        self.item = Some(FoodItem::from_bin(wanted));
        true
    }

    fn cut(&mut self, kitchen: &mut Kitchen, recipe: Option<&Recipe>) -> bool {
        let (Some(item), Some(recipe)) = (&self.item, recipe) else {
            return false;
        };
        if item.state != FoodState::RawFromBin {
            return false;
        }
        let next = recipe
            .requirement_for(&item.name)
            .and_then(|req| req.next_state(item.state));
        if next != Some(FoodState::Cut) {
            return false;
        }
        let board = kitchen
            .grid()
            .stations(StationKind::CuttingBoard)
            .iter()
            .copied()
            .find(|&board| self.pos.is_adjacent(board) && !kitchen.is_station_busy(board));
        let Some(board) = board else {
            return false;
        };
        let duration = kitchen.timing().cut_duration(&item.name);
        kitchen.register_blocking_action(self.id, ActionKind::Cut, board, duration);
        true
    }

    fn cook(&mut self, kitchen: &mut Kitchen, recipe: Option<&Recipe>) -> bool {
        let cookers: Vec<Coord> = kitchen
            .grid()
            .cookers()
            .into_iter()
            .filter(|&cooker| self.pos.is_adjacent(cooker))
            .collect();
        if cookers.is_empty() {
            return false;
        }

        if self.item.is_none() {
            for &cooker in &cookers {
                if let Some(cooked) = kitchen.take_cooked(cooker) {
                    log::trace!("agent {} collects {:?} at {cooker}", self.id, cooked.name);
                    self.item = Some(cooked);
                    return true;
                }
            }
            return false;
        }

        let (Some(item), Some(recipe)) = (&self.item, recipe) else {
            return false;
        };
        if !matches!(item.state, FoodState::RawFromBin | FoodState::Cut) {
            return false;
        }
        let next = recipe
            .requirement_for(&item.name)
            .and_then(|req| req.next_state(item.state));
        if next != Some(FoodState::Cooked) {
            return false;
        }
        let Some(cooker) = cookers
            .into_iter()
            .find(|&cooker| kitchen.cooking_slot(cooker).is_none())
        else {
            return false;
        };

        let duration = kitchen.timing().cook_duration(&item.name);
        if let Some(item) = self.item.take() {
            kitchen.start_cooking(cooker, item, duration);
        }
        true
    }

    fn assemble(
        &mut self,
        kitchen: &mut Kitchen,
        partner: Option<&PartnerView>,
        recipe: Option<&Recipe>,
        now: f64,
    ) -> bool {
        let Some(station) =
            adjacent_station(self.pos, kitchen.grid().stations(StationKind::Assembly))
        else {
            return false;
        };
        if self.item.as_ref().is_some_and(|item| kitchen.is_dish(&item.name)) {
            return false;
        }
        let open: Vec<Recipe> = kitchen.open_recipes().cloned().collect();
        let buffer = kitchen.buffer_mut(station);

        if !buffer.is_empty()
            && !is_finished_dish(buffer, &open)
            && !open.iter().any(|recipe| accepts_all(buffer, recipe))
        {
            log::debug!("agent {} clears stale buffer at {station}", self.id);
            buffer.clear();
            self.mark_progress(now);
        }

        let Some(item) = self.item.take() else {
            let done = recipe
                .filter(|recipe| is_complete(buffer, recipe))
                .or_else(|| open.iter().find(|recipe| is_complete(buffer, recipe)));
            if let Some(done) = done {
                if !buffer.is_empty() {
                    collapse(buffer, done);
                    log::trace!("agent {} plates {:?} at {station}", self.id, done.name);
                    return true;
                }
            }
            if is_finished_dish(buffer, &open) {
                self.item = buffer.pop();
                let services = kitchen.grid().stations(StationKind::Service).to_vec();
                self.route_to(kitchen.grid(), partner, &services);
                return true;
            }
            return false;
        };

        let mut tentative = buffer.clone();
        tentative.push(item.clone());
        let possible = possible_recipes(&tentative, &open);
        if !possible.is_empty() {
            let completed = possible.into_iter().find(|recipe| is_complete(&tentative, recipe));
            *buffer = tentative;
            if let Some(done) = completed {
                collapse(buffer, done);
                log::trace!("agent {} plates {:?} at {station}", self.id, done.name);
            }
            return true;
        }
        if buffer.is_empty() {
            buffer.push(item);
            return true;
        }
        if possible_recipes(std::slice::from_ref(&item), &open).is_empty() {
            log::debug!("agent {} discards unusable {:?}", self.id, item.name);
            return true;
        }
        self.item = Some(item);
        false
    }

    fn serve<R: Rng + ?Sized>(
        &mut self,
        kitchen: &mut Kitchen,
        partner: Option<&PartnerView>,
        rng: &mut R,
    ) -> bool {
        let Some(item) = &self.item else {
            return false;
        };
        if adjacent_station(self.pos, kitchen.grid().stations(StationKind::Service)).is_none() {
            return false;
        }
        let Some(served) = kitchen.deliver(item, rng) else {
            return false;
        };
        self.item = None;

        let mine_gone = self.order.is_none_or(|id| id == served || kitchen.order(id).is_none());
        if mine_gone {
            self.select_order(kitchen, partner);
        }
        self.next_requirement = 0;
        self.assembly_target = None;
        true
    }
}

/// A lone plated dish that an open order is waiting for.
fn is_finished_dish(buffer: &[FoodItem], open: &[Recipe]) -> bool {
    matches!(buffer, [dish] if dish.state == FoodState::Cooked
        && open.iter().any(|recipe| recipe.name == dish.name))
}

fn collapse(buffer: &mut Vec<FoodItem>, recipe: &Recipe) {
    buffer.clear();
    buffer.push(FoodItem::dish(recipe));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testkit::{agent, kitchen};
    use crate::recipe::IngredientRequirement;
    use FoodState::{Cooked, Cut, RawFromBin};

    const LAYOUT: [&str; 5] = [
        "#######", //
        "#B.C.O#", //
        "#B....#", //
        "#A...S#", //
        "#######",
    ];

    fn item(name: &str, state: FoodState) -> FoodItem {
        FoodItem {
            name: name.to_string(),
            state,
        }
    }

    fn salad() -> Recipe {
        Recipe::new(
            "Mixed salad",
            vec![
                IngredientRequirement::new("lettuce", &[Cut]),
                IngredientRequirement::new("tomato", &[Cut]),
            ],
        )
    }

    fn steak() -> Recipe {
        Recipe::new(
            "Steak",
            vec![IngredientRequirement::new("meat", &[Cut, Cooked])],
        )
    }

    #[test]
    fn bin_hands_out_the_wanted_ingredient() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce"], &[salad()], 1);
        let mut a = agent(0, Coord::new(2, 1), None);
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, Some(item("lettuce", RawFromBin)));
    }

    #[test]
    fn bin_with_the_wrong_supply_is_ignored() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["tomato"], &[salad()], 1);
        let mut a = agent(0, Coord::new(2, 1), None);
        assert!(!a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, None);
    }

    #[test]
    fn cutting_registers_a_blocking_action() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce"], &[salad()], 1);
        let mut a = agent(0, Coord::new(3, 2), None);
        a.item = Some(item("lettuce", RawFromBin));
        assert!(a.try_action(&mut k, None, &mut rng));
        let action = k.pending_action(a.id).unwrap();
        assert_eq!(action.station, Coord::new(3, 1));
        assert_eq!(action.ends_at, k.timing().cut_duration("lettuce"));

        // The board is taken until the cut finishes.
        let mut b = agent(1, Coord::new(4, 1), None);
        b.item = Some(item("tomato", RawFromBin));
        assert!(!b.try_action(&mut k, None, &mut rng));
    }

    #[test]
    fn cooking_starts_and_collects() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["meat"], &[steak()], 1);
        let oven = Coord::new(5, 1);
        let mut a = agent(0, Coord::new(5, 2), None);
        a.item = Some(item("meat", Cut));

        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, None);
        assert!(k.cooking_slot(oven).is_some());

        assert!(!a.try_action(&mut k, None, &mut rng));
        k.advance_clock(k.timing().cook_duration("meat"));
        k.update_cooking();
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, Some(item("meat", Cooked)));
    }

    #[test]
    fn raw_meat_is_not_cooked_before_cutting() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["meat"], &[steak()], 1);
        let mut a = agent(0, Coord::new(5, 2), None);
        a.item = Some(item("meat", RawFromBin));
        assert!(!a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, Some(item("meat", RawFromBin)));
    }

    #[test]
    fn deposits_collapse_into_a_dish() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce", "tomato"], &[salad()], 1);
        let assembly = Coord::new(1, 3);
        let mut a = agent(0, Coord::new(2, 3), None);

        a.item = Some(item("tomato", Cut));
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(k.buffer(assembly), &[item("tomato", Cut)]);

        a.item = Some(item("lettuce", Cut));
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(k.buffer(assembly), &[FoodItem::dish(&salad())]);
        assert_eq!(a.item, None);

        // Next stop picks the dish up and heads for service.
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, Some(FoodItem::dish(&salad())));
        assert!(k.buffer(assembly).is_empty());
        assert_eq!(a.target_station, Some(Coord::new(5, 3)));
    }

    #[test]
    fn stale_buffer_is_cleared() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce", "tomato"], &[salad()], 1);
        let assembly = Coord::new(1, 3);
        k.buffer_mut(assembly).push(item("pasta", Cooked));
        let mut a = agent(0, Coord::new(2, 3), None);
        a.item = Some(item("lettuce", Cut));

        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(k.buffer(assembly), &[item("lettuce", Cut)]);
    }

    #[test]
    fn unusable_item_is_discarded_on_a_busy_buffer() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce", "tomato"], &[salad()], 1);
        let assembly = Coord::new(1, 3);
        k.buffer_mut(assembly).push(item("lettuce", Cut));
        let mut a = agent(0, Coord::new(2, 3), None);

        a.item = Some(item("tomato", RawFromBin));
        assert!(a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, None);
        assert_eq!(k.buffer(assembly), &[item("lettuce", Cut)]);

        // Usable elsewhere: kept in hand.
        a.item = Some(item("lettuce", Cut));
        assert!(!a.try_action(&mut k, None, &mut rng));
        assert_eq!(a.item, Some(item("lettuce", Cut)));
    }

    #[test]
    fn service_scores_and_reselects() {
        let (mut k, mut rng) = kitchen(&LAYOUT, &["lettuce", "tomato"], &[salad()], 1);
        let mut a = agent(0, Coord::new(4, 3), None);
        a.item = Some(FoodItem::dish(&salad()));
        assert!(a.try_action(&mut k, None, &mut rng));

        assert_eq!(a.item, None);
        assert_eq!(k.score(), salad().difficulty());
        assert_eq!(k.deliveries().len(), 1);
        assert_eq!(k.orders().len(), 1);
        // The served order is gone; the agent moved on to its replacement.
        assert_eq!(a.order, Some(k.orders()[0].id));
    }
}
