use serde::Serialize;
use tack_core::order::is_dense;

use crate::layout::{Applied, Layout, Model};
use crate::workload::SimOp;

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "invariant", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// A container's stored positions are not exactly `0..N`.
    Density {
        step: u64,
        container: String,
        positions: Vec<i64>,
    },

    /// A move did not change the counts by exactly +1/-1 (or 0 within one
    /// container), or a reorder changed a count at all.
    Conservation {
        step: u64,
        container: String,
        before: usize,
        after: usize,
        expected: usize,
    },

    /// The service and the reference model disagree on success.
    OutcomeMismatch {
        step: u64,
        observed: String,
        expected: String,
    },

    /// A failed operation left something behind.
    RejectedWrote { step: u64, containers: Vec<String> },

    /// A reported no-op changed positions or versions.
    NoopWrote { step: u64, containers: Vec<String> },

    /// The stored order differs from the reference model.
    Divergence {
        step: u64,
        container: String,
        expected: Vec<String>,
        observed: Vec<String>,
    },

    /// The service reported a different number of rewritten rows.
    ChangedCount {
        step: u64,
        observed: usize,
        expected: usize,
    },
}

/// Everything the oracle needs about one step.
#[derive(Debug, Clone, Copy)]
pub struct StepCheck<'a> {
    pub step: u64,
    pub op: &'a SimOp,
    pub before: &'a Layout,
    pub after: &'a Layout,
    /// Service result: what it applied, or the error code it failed with.
    pub observed: &'a Result<Applied, String>,
    /// Model result: what it applied, or why it refused.
    pub expected: &'a Result<Applied, String>,
    /// The model after `expected` (unchanged when it refused).
    pub model: &'a Model,
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Per-step position checks.
///
/// # Invariants checked
///
/// 1. **Density** (`check_density`): every container sits at `0..N`.
/// 2. **Conservation** (`check_conservation`): moves shift one item
///    between containers, reorders keep counts.
/// 3. **No silent writes** (`check_untouched`): no-ops and rejected
///    operations leave positions and versions alone.
/// 4. **Agreement** (`check_agreement`): the store matches a model driven
///    by the pure ordering functions, including the reported row count.
pub struct PositionOracle;

impl PositionOracle {
    #[must_use]
    pub fn check_density(step: u64, layout: &Layout) -> OracleResult {
        let violations = layout
            .containers()
            .filter(|(_, positions)| !is_dense(positions.iter().copied()))
            .map(|(container, positions)| InvariantViolation::Density {
                step,
                container,
                positions,
            })
            .collect();
        OracleResult::from_violations(violations)
    }

    #[must_use]
    pub fn check_conservation(check: &StepCheck<'_>) -> OracleResult {
        if check.observed.is_err() {
            return OracleResult::pass();
        }
        let (b, a) = (check.before, check.after);
        let mut violations = Vec::new();
        let mut expect = |container: String, before: usize, after: usize, expected: usize| {
            if after != expected {
                violations.push(InvariantViolation::Conservation {
                    step: check.step,
                    container,
                    before,
                    after,
                    expected,
                });
            }
        };

        match check.op {
            SimOp::MoveCard { card, target, .. } => {
                let source = b
                    .cards
                    .iter()
                    .find_map(|(list, rows)| rows.iter().any(|(c, _)| c == card).then_some(list));
                if let Some(source) = source.filter(|s| *s != target) {
                    let (sb, tb) = (b.cards_in(source), b.cards_in(target));
                    expect(source.to_string(), sb, a.cards_in(source), sb.saturating_sub(1));
                    expect(target.to_string(), tb, a.cards_in(target), tb + 1);
                }
                expect("cards".into(), b.card_count(), a.card_count(), b.card_count());
            }
            SimOp::MoveList { list, target, .. } => {
                let source = b
                    .lists
                    .iter()
                    .find_map(|(board, rows)| rows.iter().any(|(l, _)| l == list).then_some(board));
                if let Some(source) = source.filter(|s| *s != target) {
                    let (sb, tb) = (b.lists_on(source), b.lists_on(target));
                    expect(source.to_string(), sb, a.lists_on(source), sb.saturating_sub(1));
                    expect(target.to_string(), tb, a.lists_on(target), tb + 1);
                }
                expect("lists".into(), b.list_count(), a.list_count(), b.list_count());
                expect("cards".into(), b.card_count(), a.card_count(), b.card_count());
            }
            SimOp::ReorderCards { list, .. } => {
                let n = b.cards_in(list);
                expect(list.to_string(), n, a.cards_in(list), n);
            }
            SimOp::ReorderLists { board, .. } => {
                let n = b.lists_on(board);
                expect(board.to_string(), n, a.lists_on(board), n);
            }
            SimOp::CreateCard { list, .. } => {
                let n = b.cards_in(list);
                expect(list.to_string(), n, a.cards_in(list), n + 1);
            }
            SimOp::DeleteCard { .. } => {
                let n = b.card_count();
                expect("cards".into(), n, a.card_count(), n.saturating_sub(1));
            }
        }
        OracleResult::from_violations(violations)
    }

    /// Rejected operations and no-ops must leave the layout, versions
    /// included, exactly as it was.
    #[must_use]
    pub fn check_untouched(check: &StepCheck<'_>) -> OracleResult {
        let quiet = match check.observed {
            Err(_) => true,
            Ok(applied) => applied.noop,
        };
        if !quiet || check.before == check.after {
            return OracleResult::pass();
        }

        let containers = touched(check.before, check.after);
        let violation = if check.observed.is_err() {
            InvariantViolation::RejectedWrote {
                step: check.step,
                containers,
            }
        } else {
            InvariantViolation::NoopWrote {
                step: check.step,
                containers,
            }
        };
        OracleResult::from_violations(vec![violation])
    }

    #[must_use]
    pub fn check_agreement(check: &StepCheck<'_>) -> OracleResult {
        let mut violations = Vec::new();
        match (check.observed, check.expected) {
            (Ok(observed), Ok(expected)) => {
                if check.op.reports_changes() && observed.changed != expected.changed {
                    violations.push(InvariantViolation::ChangedCount {
                        step: check.step,
                        observed: observed.changed,
                        expected: expected.changed,
                    });
                }
                if observed.noop != expected.noop {
                    violations.push(InvariantViolation::OutcomeMismatch {
                        step: check.step,
                        observed: format!("noop={}", observed.noop),
                        expected: format!("noop={}", expected.noop),
                    });
                }
            }
            (Err(_), Err(_)) => {}
            (observed, expected) => violations.push(InvariantViolation::OutcomeMismatch {
                step: check.step,
                observed: describe(observed),
                expected: describe(expected),
            }),
        }

        for (container, expected, observed) in check.model.divergences(check.after) {
            violations.push(InvariantViolation::Divergence {
                step: check.step,
                container,
                expected,
                observed,
            });
        }
        OracleResult::from_violations(violations)
    }

    /// Run every check for one step.
    #[must_use]
    pub fn check_step(check: &StepCheck<'_>) -> OracleResult {
        Self::check_density(check.step, check.after)
            .merge(Self::check_conservation(check))
            .merge(Self::check_untouched(check))
            .merge(Self::check_agreement(check))
    }
}

fn describe(result: &Result<Applied, String>) -> String {
    match result {
        Ok(applied) => format!("applied (changed={}, noop={})", applied.changed, applied.noop),
        Err(reason) => format!("rejected ({reason})"),
    }
}

/// Containers whose rows or version differ between two layouts.
fn touched(before: &Layout, after: &Layout) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (board, rows) in &after.lists {
        if before.lists.get(board) != Some(rows) {
            out.push(board.to_string());
        }
    }
    for (list, rows) in &after.cards {
        if before.cards.get(list) != Some(rows) {
            out.push(list.to_string());
        }
    }
    for (container, version) in &after.versions {
        if before.versions.get(container) != Some(version) && !out.contains(container) {
            out.push(container.clone());
        }
    }
    out
}
