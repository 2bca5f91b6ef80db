use crate::agent::Strategy;
use crate::grid::{Coord, Grid, default_layout};
use crate::recipe::{CatalogEntry, default_catalog};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use. Every section has
/// defaults, so a file only needs the values it changes.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub kitchen: KitchenConfig,
    pub timing: TimingConfig,
    pub agents: AgentConfig,
    pub session: SessionConfig,
    /// Catalog new orders are drawn from.
    pub recipes: Vec<CatalogEntry>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KitchenConfig {
    /// Grid rows (`#` wall, `.` floor, `B` `C` `O` `P` `A` `S` stations).
    pub layout: Vec<String>,
    /// Ingredient handed out by each bin, assigned round-robin.
    /// `"vegetable"` makes a wildcard vegetable bin.
    pub bin_supplies: Vec<String>,
    /// Number of simultaneously open orders.
    pub open_orders: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Per-ingredient cutting time in seconds.
    pub cut_s: BTreeMap<String, f64>,
    /// Per-ingredient cooking time in seconds.
    pub cook_s: BTreeMap<String, f64>,
    pub default_cut_s: f64,
    pub default_cook_s: f64,
    /// Per-ingredient overhead used when estimating recipe time.
    pub assembly_overhead_s: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// One strategy per agent.
    pub strategies: Vec<Strategy>,
    /// One spawn cell per agent.
    pub spawns: Vec<Coord>,
    /// Ticks between two movement steps.
    pub move_every_ticks: u32,
    /// Stagnation after which the agent steps aside.
    pub retreat_threshold_s: f64,
    /// Stagnation after which the agent drops its goal entirely.
    pub block_timeout_s: f64,
    pub retreat_pause_s: f64,
    pub reset_pause_s: f64,
    /// Bounds of the random wait when the partner stands on the next step.
    pub yield_pause_min_s: f64,
    pub yield_pause_max_s: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of a session in simulated seconds.
    pub duration_s: f64,
    /// Simulated seconds per tick.
    pub dt: f64,
    /// RNG seed; OS entropy when absent.
    pub seed: Option<u64>,
    /// Number of ticks between progress reports.
    pub ticks_per_report: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kitchen: KitchenConfig::default(),
            timing: TimingConfig::default(),
            agents: AgentConfig::default(),
            session: SessionConfig::default(),
            recipes: default_catalog(),
        }
    }
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            bin_supplies: ["tomato", "meat", "pasta", "lettuce"]
                .into_iter()
                .map(String::from)
                .collect(),
            open_orders: 3,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cut_s: BTreeMap::new(),
            cook_s: BTreeMap::new(),
            default_cut_s: 1.0,
            default_cook_s: 2.0,
            assembly_overhead_s: 1.0,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            strategies: vec![Strategy::Naive, Strategy::Naive],
            spawns: vec![Coord::new(2, 2), Coord::new(5, 2)],
            move_every_ticks: 1,
            retreat_threshold_s: 2.0,
            block_timeout_s: 5.0,
            retreat_pause_s: 1.5,
            reset_pause_s: 1.0,
            yield_pause_min_s: 0.2,
            yield_pause_max_s: 0.8,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_s: 90.0,
            dt: 0.1,
            seed: None,
            ticks_per_report: 150,
        }
    }
}

impl TimingConfig {
    pub fn cut_duration(&self, ingredient: &str) -> f64 {
        self.cut_s
            .get(ingredient)
            .copied()
            .unwrap_or(self.default_cut_s)
    }

    pub fn cook_duration(&self, ingredient: &str) -> f64 {
        self.cook_s
            .get(ingredient)
            .copied()
            .unwrap_or(self.default_cook_s)
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Performs validation on all parameters
    /// before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.kitchen.validate().context("invalid kitchen")?;
        self.timing.validate().context("invalid timing")?;
        self.agents.validate().context("invalid agents")?;
        self.session.validate().context("invalid session")?;

        check_num(self.recipes.len(), 1..1000).context("invalid number of recipes")?;
        for entry in &self.recipes {
            check_recipe(entry).with_context(|| format!("invalid recipe {:?}", entry.recipe.name))?;
        }

        Ok(())
    }
}

impl KitchenConfig {
    fn validate(&self) -> Result<()> {
        Grid::parse(&self.layout).context("invalid layout")?;
        check_num(self.bin_supplies.len(), 1..100).context("invalid number of bin supplies")?;
        if self.bin_supplies.iter().any(|name| name.is_empty()) {
            bail!("bin supplies must be non-empty names");
        }
        check_num(self.open_orders, 1..100).context("invalid number of open orders")?;
        Ok(())
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.default_cut_s, 0.0..1000.0).context("invalid default cutting time")?;
        check_num(self.default_cook_s, 0.0..1000.0).context("invalid default cooking time")?;
        check_num(self.assembly_overhead_s, 0.0..1000.0)
            .context("invalid assembly overhead")?;
        for (name, &secs) in self.cut_s.iter().chain(&self.cook_s) {
            check_num(secs, 0.0..1000.0).with_context(|| format!("invalid time for {name:?}"))?;
        }
        Ok(())
    }
}

impl AgentConfig {
    fn validate(&self) -> Result<()> {
        let n_agents = self.strategies.len();
        check_num(n_agents, 1..=2).context("invalid number of agents")?;
        if self.spawns.len() != n_agents {
            bail!(
                "spawn count must be {n_agents}, but is {}",
                self.spawns.len()
            );
        }
        if n_agents == 2 && self.spawns[0] == self.spawns[1] {
            bail!("agents must spawn on distinct cells");
        }

        check_num(self.move_every_ticks, 1..100).context("invalid movement rate")?;
        check_num(self.retreat_threshold_s, 0.0..1000.0).context("invalid retreat threshold")?;
        check_num(self.block_timeout_s, self.retreat_threshold_s..1000.0)
            .context("invalid block timeout")?;
        check_num(self.retreat_pause_s, 0.0..100.0).context("invalid retreat pause")?;
        check_num(self.reset_pause_s, 0.0..100.0).context("invalid reset pause")?;
        check_num(self.yield_pause_min_s, 0.0..100.0).context("invalid minimum yield pause")?;
        check_num(self.yield_pause_max_s, self.yield_pause_min_s..100.0)
            .context("invalid maximum yield pause")?;
        Ok(())
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.duration_s, 0.0..1_000_000.0).context("invalid session duration")?;
        if self.dt <= 0.0 {
            bail!("tick length must be positive, but is {}", self.dt);
        }
        check_num(self.dt, 0.0..=10.0).context("invalid tick length")?;
        check_num(self.ticks_per_report, 1..1_000_000).context("invalid report interval")?;
        Ok(())
    }
}

fn check_recipe(entry: &CatalogEntry) -> Result<()> {
    if entry.recipe.name.is_empty() {
        bail!("recipe name must not be empty");
    }
    if !entry.weight.is_finite() || entry.weight <= 0.0 {
        bail!("weight must be positive, but is {}", entry.weight);
    }
    check_num(entry.recipe.requirements.len(), 1..100).context("invalid number of requirements")?;
    for req in &entry.recipe.requirements {
        if req.chain.is_empty() {
            bail!("requirement {:?} must have at least one state", req.name);
        }
    }
    Ok(())
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
