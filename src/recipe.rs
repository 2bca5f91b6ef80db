//! Food items, recipes and the recipe matcher.

use crate::config::TimingConfig;
use serde::{Deserialize, Serialize};

/// Ingredients the wildcard vegetable bin can hand out.
pub const VEGETABLES: [&str; 5] = ["tomato", "lettuce", "eggplant", "zucchini", "pepper"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodState {
    RawFromBin,
    Cut,
    Cooked,
}

/// A single piece of food held by exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub state: FoodState,
}

impl FoodItem {
    pub fn from_bin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: FoodState::RawFromBin,
        }
    }

    /// Finished plate named after the recipe it completes.
    pub fn dish(recipe: &Recipe) -> Self {
        Self {
            name: recipe.name.clone(),
            state: FoodState::Cooked,
        }
    }

    pub fn transform(&mut self, state: FoodState) {
        self.state = state;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub name: String,
    /// Ordered transformations; the last one is the state the recipe expects.
    pub chain: Vec<FoodState>,
}

impl IngredientRequirement {
    pub fn new(name: &str, chain: &[FoodState]) -> Self {
        Self {
            name: name.to_string(),
            chain: chain.to_vec(),
        }
    }

    pub fn final_state(&self) -> Option<FoodState> {
        self.chain.last().copied()
    }

    /// Next transformation for an item currently in `state`.
    ///
    /// A state outside the chain means the chain has not started yet.
    pub fn next_state(&self, state: FoodState) -> Option<FoodState> {
        match self.chain.iter().position(|&s| s == state) {
            Some(idx) => self.chain.get(idx + 1).copied(),
            None => self.chain.first().copied(),
        }
    }

    fn accepts(&self, item: &FoodItem) -> bool {
        self.name == item.name && self.final_state() == Some(item.state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub requirements: Vec<IngredientRequirement>,
}

impl Recipe {
    pub fn new(name: &str, requirements: Vec<IngredientRequirement>) -> Self {
        Self {
            name: name.to_string(),
            requirements,
        }
    }

    /// Total number of transformations across requirements.
    pub fn complexity(&self) -> u32 {
        self.requirements.iter().map(|req| req.chain.len() as u32).sum()
    }

    /// Pickup, every transformation and the deposit, per requirement.
    pub fn interactions(&self) -> u32 {
        self.requirements
            .iter()
            .map(|req| req.chain.len() as u32 + 2)
            .sum()
    }

    pub fn difficulty(&self) -> u32 {
        difficulty_from(self.complexity(), self.interactions())
    }

    /// Expected seconds of station work, assembly overhead included.
    pub fn estimated_time(&self, timing: &TimingConfig) -> f64 {
        self.requirements
            .iter()
            .map(|req| {
                let mut secs = timing.assembly_overhead_s;
                if req.chain.contains(&FoodState::Cut) {
                    secs += timing.cut_duration(&req.name);
                }
                if req.chain.contains(&FoodState::Cooked) {
                    secs += timing.cook_duration(&req.name);
                }
                secs
            })
            .sum()
    }

    /// First requirement using the ingredient `name`.
    pub fn requirement_for(&self, name: &str) -> Option<&IngredientRequirement> {
        self.requirements.iter().find(|req| req.name == name)
    }
}

pub fn difficulty_from(complexity: u32, interactions: u32) -> u32 {
    complexity * interactions
}

/// Greedy first-fit assignment of `items` to requirements.
///
/// Each item, in order, takes the first unmatched requirement with the same
/// name whose final state equals the item's state. Unassignable items are
/// ignored.
pub fn match_flags(items: &[FoodItem], recipe: &Recipe) -> Vec<bool> {
    let mut flags = vec![false; recipe.requirements.len()];
    for item in items {
        if let Some(idx) = first_free(&flags, item, recipe) {
            flags[idx] = true;
        }
    }
    flags
}

fn first_free(flags: &[bool], item: &FoodItem, recipe: &Recipe) -> Option<usize> {
    recipe
        .requirements
        .iter()
        .zip(flags)
        .position(|(req, &taken)| !taken && req.accepts(item))
}

pub fn is_complete(items: &[FoodItem], recipe: &Recipe) -> bool {
    match_flags(items, recipe).into_iter().all(|flag| flag)
}

/// Every item finds its own requirement in `recipe`.
pub fn accepts_all(items: &[FoodItem], recipe: &Recipe) -> bool {
    let mut flags = vec![false; recipe.requirements.len()];
    for item in items {
        match first_free(&flags, item, recipe) {
            Some(idx) => flags[idx] = true,
            None => return false,
        }
    }
    true
}

/// Recipes that could still absorb all of `items`.
pub fn possible_recipes<'a, I>(items: &[FoodItem], recipes: I) -> Vec<&'a Recipe>
where
    I: IntoIterator<Item = &'a Recipe>,
{
    recipes
        .into_iter()
        .filter(|recipe| accepts_all(items, recipe))
        .collect()
}

/// Catalog entry from which new orders are drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub recipe: Recipe,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

pub fn default_catalog() -> Vec<CatalogEntry> {
    use FoodState::{Cooked, Cut};
    let entry = |name: &str, requirements: Vec<IngredientRequirement>| CatalogEntry {
        recipe: Recipe::new(name, requirements),
        weight: default_weight(),
    };
    vec![
        entry(
            "Pan-fried tomato",
            vec![IngredientRequirement::new("tomato", &[Cooked])],
        ),
        entry(
            "Cooked meat",
            vec![IngredientRequirement::new("meat", &[Cut, Cooked])],
        ),
        entry(
            "Plain pasta",
            vec![IngredientRequirement::new("pasta", &[Cooked])],
        ),
        entry(
            "Chopped salad",
            vec![IngredientRequirement::new("lettuce", &[Cut])],
        ),
        entry(
            "Mixed salad",
            vec![
                IngredientRequirement::new("lettuce", &[Cut]),
                IngredientRequirement::new("tomato", &[Cut]),
            ],
        ),
        entry(
            "Pasta bolognese",
            vec![
                IngredientRequirement::new("pasta", &[Cooked]),
                IngredientRequirement::new("meat", &[Cut, Cooked]),
            ],
        ),
        entry(
            "Sandwich",
            vec![
                IngredientRequirement::new("meat", &[Cut, Cooked]),
                IngredientRequirement::new("lettuce", &[Cut]),
            ],
        ),
    ]
}
