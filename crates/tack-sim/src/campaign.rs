//! Campaign runner for deterministic simulation campaigns.
//!
//! Executes many seeds with shared parameters, collecting pass/fail
//! results and identifying the first failing seed for replay.

use std::ops::Range;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tack_core::order::{OutOfRangePolicy, UnknownItemPolicy};

use crate::oracle::InvariantViolation;
use crate::workload::Workload;
use crate::{SimulationConfig, SimulationResult, Simulator};

/// Campaign-level configuration controlling how many seeds to run and
/// what simulation parameters to use for each seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g., `0..100`.
    pub seed_range: Range<u64>,
    pub boards: usize,
    pub lists_per_board: usize,
    pub cards_per_list: usize,
    /// Operations per seed.
    pub steps: u64,
    /// Chance of a deliberately invalid position or mapping (percent, 0–100).
    pub stray_percent: u8,
    pub out_of_range: OutOfRangePolicy,
    pub unknown_items: UnknownItemPolicy,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..100,
            boards: 2,
            lists_per_board: 3,
            cards_per_list: 4,
            steps: 200,
            stray_percent: 10,
            out_of_range: OutOfRangePolicy::Reject,
            unknown_items: UnknownItemPolicy::Skip,
        }
    }
}

impl CampaignConfig {
    /// Build a [`SimulationConfig`] for a specific seed.
    #[must_use]
    pub fn sim_config_for_seed(&self, seed: u64) -> SimulationConfig {
        SimulationConfig {
            seed,
            boards: self.boards,
            lists_per_board: self.lists_per_board,
            cards_per_list: self.cards_per_list,
            steps: self.steps,
            workload: Workload {
                stray_percent: self.stray_percent,
                ..Workload::default()
            },
            out_of_range: self.out_of_range,
            unknown_items: self.unknown_items,
        }
    }

    /// Validate configuration before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.seed_range.is_empty() {
            bail!("seed_range must not be empty");
        }
        if self.boards == 0 {
            bail!("boards must be > 0");
        }
        if self.lists_per_board == 0 {
            bail!("lists_per_board must be > 0");
        }
        if self.steps == 0 {
            bail!("steps must be > 0");
        }
        if self.stray_percent > 100 {
            bail!("stray_percent must be <= 100");
        }
        Ok(())
    }
}

/// Failure details for a single seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: u64,
    /// Violations with store ids replaced by aliases.
    pub violations: Vec<String>,
}

/// Aggregate report produced by a campaign run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignReport {
    pub seeds_run: usize,
    pub seeds_passed: usize,
    /// First seed that failed (for prioritized replay).
    pub first_failure: Option<u64>,
    pub failures: Vec<SeedFailure>,
    /// Seeds that saw a rejection, a no-op, and a cross-container move.
    pub interesting_states_reached: usize,
    pub steps_applied: usize,
    pub steps_rejected: usize,
}

impl CampaignReport {
    /// True if every seed passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Detailed trace produced by replaying a single seed.
#[derive(Debug, Clone)]
pub struct DetailedTrace {
    pub result: SimulationResult,
    /// Violations rendered with aliases, in the order found.
    pub violations: Vec<String>,
}

/// Run a full campaign across all seeds in the config.
///
/// # Errors
///
/// Returns an error if config validation fails or a simulation encounters
/// an internal error.
pub fn run_campaign(config: &CampaignConfig) -> Result<CampaignReport> {
    config.validate()?;

    let mut report = CampaignReport {
        seeds_run: 0,
        seeds_passed: 0,
        first_failure: None,
        failures: Vec::new(),
        interesting_states_reached: 0,
        steps_applied: 0,
        steps_rejected: 0,
    };

    for seed in config.seed_range.clone() {
        report.seeds_run += 1;
        let result = run_single_seed(seed, config)?;
        report.steps_applied += result.stats.applied;
        report.steps_rejected += result.stats.rejected;
        if result.interesting_state_reached {
            report.interesting_states_reached += 1;
        }

        if result.passed() {
            report.seeds_passed += 1;
        } else {
            tracing::warn!(seed, violations = result.violations.len(), "seed failed");
            if report.first_failure.is_none() {
                report.first_failure = Some(seed);
            }
            report.failures.push(SeedFailure {
                seed,
                violations: render_violations(&result),
            });
        }
    }

    tracing::info!(
        seeds = report.seeds_run,
        passed = report.seeds_passed,
        interesting = report.interesting_states_reached,
        "campaign finished"
    );
    Ok(report)
}

/// Run a single seed.
///
/// # Errors
///
/// Returns an error if the simulation itself fails (store setup, read
/// back). Invariant violations are reported in the result.
pub fn run_single_seed(seed: u64, config: &CampaignConfig) -> Result<SimulationResult> {
    Simulator::new(config.sim_config_for_seed(seed))?.run()
}

/// Replay a single seed with full trace details for debugging.
///
/// # Errors
///
/// Returns an error when config validation or simulation fails.
pub fn replay_seed(seed: u64, config: &CampaignConfig) -> Result<DetailedTrace> {
    config.validate()?;
    let result = run_single_seed(seed, config)?;
    let violations = render_violations(&result);
    Ok(DetailedTrace { result, violations })
}

fn render_violations(result: &SimulationResult) -> Vec<String> {
    result
        .violations
        .iter()
        .map(|v| result.alias_text(&format_violation(v)))
        .collect()
}

/// Format an invariant violation into a human-readable string.
#[must_use]
pub fn format_violation(v: &InvariantViolation) -> String {
    match v {
        InvariantViolation::Density {
            step,
            container,
            positions,
        } => format!("Density: step {step}: {container} holds positions {positions:?}"),
        InvariantViolation::Conservation {
            step,
            container,
            before,
            after,
            expected,
        } => format!(
            "Conservation: step {step}: {container} went from {before} to {after} items \
             (expected {expected})"
        ),
        InvariantViolation::OutcomeMismatch {
            step,
            observed,
            expected,
        } => format!("OutcomeMismatch: step {step}: store {observed}, model {expected}"),
        InvariantViolation::RejectedWrote { step, containers } => {
            format!("RejectedWrote: step {step}: failed operation changed {containers:?}")
        }
        InvariantViolation::NoopWrote { step, containers } => {
            format!("NoopWrote: step {step}: no-op changed {containers:?}")
        }
        InvariantViolation::Divergence {
            step,
            container,
            expected,
            observed,
        } => format!(
            "Divergence: step {step}: {container} is {observed:?}, model has {expected:?}"
        ),
        InvariantViolation::ChangedCount {
            step,
            observed,
            expected,
        } => format!(
            "ChangedCount: step {step}: store rewrote {observed} rows, model expects {expected}"
        ),
    }
}
