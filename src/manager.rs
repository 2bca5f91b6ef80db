use crate::agent::Strategy;
use crate::config::Config;
use crate::engine::{Engine, SessionReport};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use std::path::Path;

pub struct Manager {
    cfg: Config,
}

/// Aggregated results of all benchmark sessions played with one strategy.
#[derive(Debug, Clone)]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub sessions: usize,
    pub score: AccumulatorReport,
    pub deliveries: AccumulatorReport,
    pub avg_complexity: AccumulatorReport,
    pub steps_per_point: AccumulatorReport,
    pub walking_pct: AccumulatorReport,
    pub working_pct: AccumulatorReport,
    pub idle_pct: AccumulatorReport,
}

#[derive(Default)]
struct SummaryBuilder {
    score: Accumulator,
    deliveries: Accumulator,
    avg_complexity: Accumulator,
    steps_per_point: Accumulator,
    walking_pct: Accumulator,
    working_pct: Accumulator,
    idle_pct: Accumulator,
}

impl SummaryBuilder {
    fn add(&mut self, report: &SessionReport) {
        self.score.add(report.score as f64);
        self.deliveries.add(report.deliveries as f64);
        self.avg_complexity.add(report.avg_complexity);
        if let Some(ratio) = report.steps_per_point {
            self.steps_per_point.add(ratio);
        }
        let (walking, working, idle) = report.activity.percentages();
        self.walking_pct.add(walking);
        self.working_pct.add(working);
        self.idle_pct.add(idle);
    }

    fn finish(&self, strategy: Strategy, sessions: usize) -> StrategySummary {
        StrategySummary {
            strategy,
            sessions,
            score: self.score.report(),
            deliveries: self.deliveries.report(),
            avg_complexity: self.avg_complexity.report(),
            steps_per_point: self.steps_per_point.report(),
            walking_pct: self.walking_pct.report(),
            working_pct: self.working_pct.report(),
            idle_pct: self.idle_pct.report(),
        }
    }
}

impl StrategySummary {
    fn log(&self) {
        log::info!("{} over {} sessions:", self.strategy, self.sessions);
        log::info!("  score           {}", self.score);
        log::info!("  deliveries      {}", self.deliveries);
        log::info!("  complexity      {}", self.avg_complexity);
        log::info!("  steps per point {}", self.steps_per_point);
        log::info!(
            "  walking {} %, working {} %, idle {} %",
            self.walking_pct,
            self.working_pct,
            self.idle_pct
        );
    }
}

impl Manager {
    pub fn new<P: AsRef<Path>>(config_file: P) -> Result<Self> {
        let cfg = Config::from_file(config_file).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self::from_config(cfg))
    }

    pub fn from_config(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Play one session with the configured agents.
    pub fn run_session(&self) -> Result<SessionReport> {
        let mut engine =
            Engine::new(self.cfg.clone()).context("failed to construct engine")?;
        let report = engine.run_session();
        report.log();
        Ok(report)
    }

    /// Play `sessions` sessions per strategy, every agent using that
    /// strategy, and aggregate the reports.
    ///
    /// With a configured seed, session `i` uses `seed + i`, so every strategy
    /// faces the same sequence of orders.
    pub fn run_benchmark(
        &self,
        sessions: usize,
        strategies: &[Strategy],
    ) -> Result<Vec<StrategySummary>> {
        let mut summaries = Vec::with_capacity(strategies.len());
        for &strategy in strategies {
            let mut builder = SummaryBuilder::default();
            for session in 0..sessions {
                let mut cfg = self.cfg.clone();
                cfg.agents.strategies = vec![strategy; cfg.agents.strategies.len()];
                cfg.session.seed = cfg.session.seed.map(|seed| seed.wrapping_add(session as u64));

                let mut engine = Engine::new(cfg).with_context(|| {
                    format!("failed to construct engine for {strategy} session {session}")
                })?;
                let report = engine.run_session();
                log::info!("{strategy} session {session}: score {}", report.score);
                builder.add(&report);
            }

            let summary = builder.finish(strategy, sessions);
            summary.log();
            summaries.push(summary);
        }
        Ok(summaries)
    }
}
