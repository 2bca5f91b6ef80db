//! Shared kitchen state both agents read and mutate.
//!
//! There is no locking: the engine hands `&mut Kitchen` to one agent at a
//! time, in a fixed order, so whichever agent runs first in a tick wins any
//! claim on a cooking slot or assembly buffer.

use crate::agent::AgentId;
use crate::config::TimingConfig;
use crate::grid::{Coord, Grid, StationKind};
use crate::recipe::{CatalogEntry, FoodItem, FoodState, Recipe};
use anyhow::{Context, Result};
use rand::Rng;
use rand_distr::{Distribution, weighted::WeightedIndex};
use std::collections::BTreeMap;

/// Ticket of an open order. Two orders for the same recipe are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(u64);

#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub recipe: Recipe,
}

#[derive(Debug, Clone)]
pub struct CookingSlot {
    pub item: FoodItem,
    pub ready_at: f64,
}

impl CookingSlot {
    pub fn is_ready(&self, now: f64) -> bool {
        now >= self.ready_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Cut,
}

/// Blocking action an agent is busy with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub station: Coord,
    pub ends_at: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipe: String,
    pub complexity: u32,
    pub points: u32,
    pub at: f64,
}

pub struct Kitchen {
    grid: Grid,
    timing: TimingConfig,
    catalog: Vec<Recipe>,
    order_dist: WeightedIndex<f64>,
    orders: Vec<Order>,
    next_order_id: u64,
    cooking: BTreeMap<Coord, CookingSlot>,
    buffers: BTreeMap<Coord, Vec<FoodItem>>,
    pending: BTreeMap<AgentId, PendingAction>,
    now: f64,
    score: u32,
    deliveries: Vec<Delivery>,
}

impl Kitchen {
    /// Create a kitchen and draw its first `open_orders` orders.
    pub fn new<R: Rng + ?Sized>(
        grid: Grid,
        timing: TimingConfig,
        catalog: &[CatalogEntry],
        open_orders: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let order_dist = WeightedIndex::new(catalog.iter().map(|entry| entry.weight))
            .context("failed to build recipe distribution")?;
        let buffers = grid
            .stations(StationKind::Assembly)
            .iter()
            .map(|&pos| (pos, Vec::new()))
            .collect();

        let mut kitchen = Self {
            grid,
            timing,
            catalog: catalog.iter().map(|entry| entry.recipe.clone()).collect(),
            order_dist,
            orders: Vec::with_capacity(open_orders),
            next_order_id: 0,
            cooking: BTreeMap::new(),
            buffers,
            pending: BTreeMap::new(),
            now: 0.0,
            score: 0,
            deliveries: Vec::new(),
        };
        for _ in 0..open_orders {
            kitchen.open_order(rng);
        }
        Ok(kitchen)
    }

    fn open_order<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let recipe = self.catalog[self.order_dist.sample(rng)].clone();
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        log::trace!("order {id:?} opened for {:?}", recipe.name);
        self.orders.push(Order { id, recipe });
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn advance_clock(&mut self, dt: f64) {
        self.now += dt;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }

    // --- Orders ---

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    pub fn open_recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.orders.iter().map(|order| &order.recipe)
    }

    /// Some open order is for a dish called `name`.
    pub fn is_dish(&self, name: &str) -> bool {
        self.open_recipes().any(|recipe| recipe.name == name)
    }

    /// Serve a finished dish: the first open order for it is closed, its
    /// difficulty is scored and a new order replaces it.
    pub fn deliver<R: Rng + ?Sized>(&mut self, dish: &FoodItem, rng: &mut R) -> Option<OrderId> {
        let idx = self
            .orders
            .iter()
            .position(|order| order.recipe.name == dish.name)?;
        let order = self.orders.remove(idx);

        let points = order.recipe.difficulty();
        self.score += points;
        self.deliveries.push(Delivery {
            recipe: order.recipe.name.clone(),
            complexity: order.recipe.complexity(),
            points,
            at: self.now,
        });
        log::debug!(
            "delivered {:?} for {points} points at {:.1}s (score {})",
            order.recipe.name,
            self.now,
            self.score
        );

        self.open_order(rng);
        Some(order.id)
    }

    // --- Blocking actions ---

    pub fn register_blocking_action(
        &mut self,
        agent: AgentId,
        kind: ActionKind,
        station: Coord,
        duration: f64,
    ) {
        let ends_at = self.now + duration;
        log::trace!("agent {agent} busy with {kind:?} at {station} until {ends_at:.1}s");
        self.pending.insert(
            agent,
            PendingAction {
                kind,
                station,
                ends_at,
            },
        );
    }

    pub fn pending_action(&self, agent: AgentId) -> Option<&PendingAction> {
        self.pending.get(&agent)
    }

    pub fn is_station_busy(&self, station: Coord) -> bool {
        self.pending.values().any(|action| action.station == station)
    }

    /// Remove and return the agent's pending action once its time is up.
    pub fn take_finished_action(&mut self, agent: AgentId) -> Option<PendingAction> {
        let action = self.pending.get(&agent)?;
        if self.now < action.ends_at {
            return None;
        }
        self.pending.remove(&agent)
    }

    // --- Cooking ---

    pub fn start_cooking(&mut self, station: Coord, item: FoodItem, duration: f64) {
        log::trace!("cooking {:?} at {station} for {duration:.1}s", item.name);
        self.cooking.insert(
            station,
            CookingSlot {
                item,
                ready_at: self.now + duration,
            },
        );
    }

    pub fn cooking_slot(&self, station: Coord) -> Option<&CookingSlot> {
        self.cooking.get(&station)
    }

    pub fn cooking_slots(&self) -> impl Iterator<Item = (&Coord, &CookingSlot)> {
        self.cooking.iter()
    }

    /// Turn every item whose cooking time has elapsed into its cooked form.
    pub fn update_cooking(&mut self) {
        let now = self.now;
        for slot in self.cooking.values_mut() {
            if slot.is_ready(now) && slot.item.state != FoodState::Cooked {
                slot.item.transform(FoodState::Cooked);
            }
        }
    }

    pub fn ready_cookers(&self) -> Vec<Coord> {
        self.cooking
            .iter()
            .filter(|(_, slot)| slot.is_ready(self.now))
            .map(|(&pos, _)| pos)
            .collect()
    }

    /// Take a finished item off its station.
    pub fn take_cooked(&mut self, station: Coord) -> Option<FoodItem> {
        if !self.cooking.get(&station)?.is_ready(self.now) {
            return None;
        }
        let mut item = self.cooking.remove(&station)?.item;
        item.transform(FoodState::Cooked);
        Some(item)
    }

    // --- Assembly ---

    pub fn buffer(&self, station: Coord) -> &[FoodItem] {
        self.buffers.get(&station).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn buffer_mut(&mut self, station: Coord) -> &mut Vec<FoodItem> {
        self.buffers.entry(station).or_default()
    }

    pub fn buffers(&self) -> impl Iterator<Item = (&Coord, &Vec<FoodItem>)> {
        self.buffers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::default_layout;
    use crate::recipe::{IngredientRequirement, default_catalog};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn kitchen(catalog: &[CatalogEntry]) -> (Kitchen, ChaCha12Rng) {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let grid = Grid::parse(&default_layout()).unwrap();
        let kitchen = Kitchen::new(grid, TimingConfig::default(), catalog, 3, &mut rng).unwrap();
        (kitchen, rng)
    }

    fn single(name: &str, ingredient: &str, chain: &[FoodState]) -> CatalogEntry {
        CatalogEntry {
            recipe: Recipe::new(name, vec![IngredientRequirement::new(ingredient, chain)]),
            weight: 1.0,
        }
    }

    #[test]
    fn new_kitchen_opens_distinct_orders() {
        let (kitchen, _) = kitchen(&default_catalog());
        let ids: Vec<_> = kitchen.orders().iter().map(|order| order.id).collect();
        assert_eq!(ids, vec![OrderId(0), OrderId(1), OrderId(2)]);
        assert_eq!(kitchen.buffers().count(), 2);
    }

    #[test]
    fn delivery_scores_and_rotates_the_pool() {
        let catalog = [single("Chopped salad", "lettuce", &[FoodState::Cut])];
        let (mut kitchen, mut rng) = kitchen(&catalog);
        let dish = FoodItem::dish(&catalog[0].recipe);

        let served = kitchen.deliver(&dish, &mut rng);
        assert_eq!(served, Some(OrderId(0)));
        assert_eq!(kitchen.score(), catalog[0].recipe.difficulty());
        assert_eq!(kitchen.orders().len(), 3);
        assert_eq!(kitchen.orders().last().map(|order| order.id), Some(OrderId(3)));
        assert_eq!(kitchen.deliveries().len(), 1);

        let junk = FoodItem::from_bin("lettuce");
        assert_eq!(kitchen.deliver(&junk, &mut rng), None);
    }

    #[test]
    fn cooking_slot_lifecycle() {
        let (mut kitchen, _) = kitchen(&default_catalog());
        let oven = Coord::new(4, 1);
        kitchen.start_cooking(oven, FoodItem::from_bin("pasta"), 2.0);

        kitchen.advance_clock(1.0);
        kitchen.update_cooking();
        assert!(kitchen.ready_cookers().is_empty());
        assert!(kitchen.take_cooked(oven).is_none());

        kitchen.advance_clock(1.0);
        kitchen.update_cooking();
        assert_eq!(kitchen.ready_cookers(), vec![oven]);
        assert_eq!(
            kitchen.cooking_slot(oven).map(|slot| slot.item.state),
            Some(FoodState::Cooked)
        );
        let item = kitchen.take_cooked(oven).unwrap();
        assert_eq!(item.state, FoodState::Cooked);
        assert!(kitchen.cooking_slot(oven).is_none());
    }

    #[test]
    fn pending_action_blocks_station_until_done() {
        let (mut kitchen, _) = kitchen(&default_catalog());
        let board = Coord::new(3, 1);
        kitchen.register_blocking_action(AgentId(0), ActionKind::Cut, board, 1.0);
        assert!(kitchen.is_station_busy(board));
        assert!(kitchen.take_finished_action(AgentId(0)).is_none());

        kitchen.advance_clock(1.0);
        let action = kitchen.take_finished_action(AgentId(0)).unwrap();
        assert_eq!(action.kind, ActionKind::Cut);
        assert!(!kitchen.is_station_busy(board));
    }
}
