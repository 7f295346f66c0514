//! tack-sim library: seeded differential simulation of board positions.
//!
//! A [`Simulator`] drives a real [`Service`] over an in-memory store with
//! a seeded stream of moves, reorders, creates, and deletes, many of them
//! deliberately invalid. After every step the [`oracle`] compares the
//! stored layout with a [`layout::Model`] maintained by the pure
//! [`tack_core::order`] functions.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Determinism**: store ids are random, so traces name items by
//!   alias (`card#3`) and every choice is made by creation order.

pub mod campaign;
pub mod layout;
pub mod oracle;
pub mod rng;
pub mod workload;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;
use tack_core::Service;
use tack_core::authz::AllowAll;
use tack_core::config::ProjectConfig;
use tack_core::db;
use tack_core::model::{BoardId, CardId, ListId, UserId};
use tack_core::order::{OrderError, OutOfRangePolicy, UnknownItemPolicy};
use tack_core::service::NewCard;

use crate::layout::{Applied, Layout, Model};
use crate::oracle::{InvariantViolation, PositionOracle, StepCheck};
use crate::rng::DeterministicRng;
use crate::workload::{OpKind, SimOp, Workload, next_op};

/// Stand-in for a card the store refused to create.
const UNCREATED_CARD: &str = "c-uncreated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationConfig {
    pub seed: u64,
    pub boards: usize,
    pub lists_per_board: usize,
    pub cards_per_list: usize,
    pub steps: u64,
    pub workload: Workload,
    pub out_of_range: OutOfRangePolicy,
    pub unknown_items: UnknownItemPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            boards: 2,
            lists_per_board: 3,
            cards_per_list: 4,
            steps: 200,
            workload: Workload::default(),
            out_of_range: OutOfRangePolicy::Reject,
            unknown_items: UnknownItemPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepResult {
    Applied { changed: usize, noop: bool },
    Rejected { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub step: u64,
    pub kind: OpKind,
    /// The operation with every id replaced by its alias.
    pub detail: String,
    #[serde(flatten)]
    pub result: StepResult,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub applied: usize,
    pub rejected: usize,
    pub noops: usize,
    pub cross_moves: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub seed: u64,
    pub trace: Vec<TraceEvent>,
    /// Violations of the first failing step, plus any found by the final
    /// density scan.
    pub violations: Vec<InvariantViolation>,
    pub final_layout: Layout,
    /// Store id to alias, for rendering violations.
    pub aliases: BTreeMap<String, String>,
    pub stats: SimStats,
    /// The run saw a rejection, a no-op, and a cross-container move.
    pub interesting_state_reached: bool,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Replace every store id in `text` with its alias.
    #[must_use]
    pub fn alias_text(&self, text: &str) -> String {
        self.aliases
            .iter()
            .fold(text.to_string(), |acc, (id, alias)| acc.replace(id.as_str(), alias))
    }
}

pub struct Simulator {
    config: SimulationConfig,
    svc: Service<AllowAll>,
    actor: UserId,
    rng: DeterministicRng,
    boards: Vec<BoardId>,
    lists: Vec<ListId>,
    model: Model,
    aliases: BTreeMap<String, String>,
    cards_created: usize,
}

impl Simulator {
    /// Seed a fresh in-memory store with the configured boards, lists,
    /// and cards.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or seeded.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let mut project = ProjectConfig::default();
        project.moves.out_of_range = config.out_of_range;
        project.reorder.unknown_items = config.unknown_items;
        let svc = Service::with_parts(db::open_in_memory()?, project, AllowAll);

        let mut sim = Self {
            rng: DeterministicRng::new(config.seed),
            config,
            svc,
            actor: UserId::new("sim"),
            boards: Vec::new(),
            lists: Vec::new(),
            model: Model::default(),
            aliases: BTreeMap::new(),
            cards_created: 0,
        };
        sim.seed_store()?;
        Ok(sim)
    }

    fn seed_store(&mut self) -> Result<()> {
        for b in 0..self.config.boards {
            let board = self
                .svc
                .create_board(&self.actor, &format!("Board {b}"), "")?;
            self.alias(board.id.as_str(), format!("board#{b}"));
            for _ in 0..self.config.lists_per_board {
                let n = self.lists.len();
                let list = self
                    .svc
                    .create_list(&self.actor, &board.id, &format!("List {n}"), None)?;
                self.alias(list.id.as_str(), format!("list#{n}"));
                for _ in 0..self.config.cards_per_list {
                    self.create_card(&list.id, None)?;
                }
                self.lists.push(list.id);
            }
            self.boards.push(board.id);
        }
        self.model = Model::from_layout(&Layout::load(&self.svc, &self.boards)?);
        tracing::debug!(
            seed = self.config.seed,
            boards = self.boards.len(),
            lists = self.lists.len(),
            cards = self.model.card_count(),
            "seeded simulation store"
        );
        Ok(())
    }

    fn alias(&mut self, id: &str, alias: String) {
        self.aliases.insert(id.to_string(), alias);
    }

    fn alias_of(&self, id: &str) -> String {
        self.aliases
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn create_card(&mut self, list: &ListId, position: Option<i64>) -> tack_core::Result<CardId> {
        let n = self.cards_created;
        let card = NewCard::titled(format!("Card {n}"));
        let created = self.svc.create_card(&self.actor, list, &card, position)?;
        self.cards_created += 1;
        self.alias(created.id.as_str(), format!("card#{n}"));
        Ok(created.id)
    }

    /// Run every configured step, stopping after the first step that
    /// breaks an invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read back.
    pub fn run(&mut self) -> Result<SimulationResult> {
        let mut trace = Vec::new();
        let mut violations = Vec::new();
        let mut stats = SimStats::default();

        for step in 0..self.config.steps {
            let Some(op) = next_op(
                &self.model,
                &self.boards,
                &self.lists,
                &mut self.rng,
                &self.config.workload,
            ) else {
                break;
            };
            let (event, found) = self.step(step, &op, &mut stats)?;
            trace.push(event);
            if !found.is_empty() {
                tracing::warn!(step, violations = found.len(), "invariant violated");
                violations = found;
                break;
            }
        }

        let final_layout = Layout::load(&self.svc, &self.boards)?;
        let report = self.svc.check_density()?;
        violations.extend(report.violations.into_iter().map(|v| InvariantViolation::Density {
            step: self.config.steps,
            container: v.container,
            positions: v.positions,
        }));

        let interesting_state_reached = stats.rejected > 0 && stats.noops > 0 && stats.cross_moves > 0;
        tracing::info!(
            seed = self.config.seed,
            steps = trace.len(),
            applied = stats.applied,
            rejected = stats.rejected,
            violations = violations.len(),
            "simulation finished"
        );

        Ok(SimulationResult {
            seed: self.config.seed,
            trace,
            violations,
            final_layout,
            aliases: self.aliases.clone(),
            stats,
            interesting_state_reached,
        })
    }

    fn step(
        &mut self,
        step: u64,
        op: &SimOp,
        stats: &mut SimStats,
    ) -> Result<(TraceEvent, Vec<InvariantViolation>)> {
        let before = Layout::load(&self.svc, &self.boards)?;
        let cross = self.is_cross_move(op);
        let (observed, created) = self.apply(op);
        let after = Layout::load(&self.svc, &self.boards)?;

        let mut model = self.model.clone();
        let expected = self
            .predict(&mut model, op, created)
            .map_err(|err| err.to_string());
        if expected.is_err() {
            model = self.model.clone();
        }

        let check = StepCheck {
            step,
            op,
            before: &before,
            after: &after,
            observed: &observed,
            expected: &expected,
            model: &model,
        };
        let verdict = PositionOracle::check_step(&check);
        self.model = model;

        let result = match &observed {
            Ok(applied) => {
                stats.applied += 1;
                if applied.noop {
                    stats.noops += 1;
                }
                if cross {
                    stats.cross_moves += 1;
                }
                StepResult::Applied {
                    changed: applied.changed,
                    noop: applied.noop,
                }
            }
            Err(code) => {
                stats.rejected += 1;
                StepResult::Rejected { code: code.clone() }
            }
        };
        let event = TraceEvent {
            step,
            kind: op.kind(),
            detail: self.describe(op),
            result,
        };
        tracing::trace!(step, kind = %event.kind, detail = %event.detail, "step");
        Ok((event, verdict.violations))
    }

    fn is_cross_move(&self, op: &SimOp) -> bool {
        match op {
            SimOp::MoveCard { card, target, .. } => self.model.list_of(card) != Some(target),
            SimOp::MoveList { list, target, .. } => self.model.board_of(list) != Some(target),
            _ => false,
        }
    }

    /// Apply `op` to the store. Failures become their error code.
    fn apply(&mut self, op: &SimOp) -> (std::result::Result<Applied, String>, Option<CardId>) {
        let actor = self.actor.clone();
        let code = |err: tack_core::TackError| err.error_code().code().to_string();
        match op {
            SimOp::MoveCard {
                card,
                target,
                position,
            } => {
                let outcome = self.svc.move_card(&actor, card, target, *position);
                (outcome.map(|o| moved(o.changed, o.noop)).map_err(code), None)
            }
            SimOp::MoveList {
                list,
                target,
                position,
            } => {
                let outcome = self.svc.move_list(&actor, list, target, *position);
                (outcome.map(|o| moved(o.changed, o.noop)).map_err(code), None)
            }
            SimOp::ReorderCards { list, mapping } => {
                let outcome = self.svc.reorder_cards(&actor, list, mapping, None);
                (outcome.map(|o| moved(o.changed, o.changed == 0)).map_err(code), None)
            }
            SimOp::ReorderLists { board, mapping } => {
                let outcome = self.svc.reorder_lists(&actor, board, mapping, None);
                (outcome.map(|o| moved(o.changed, o.changed == 0)).map_err(code), None)
            }
            SimOp::CreateCard { list, position } => match self.create_card(list, *position) {
                Ok(id) => (Ok(Applied::default()), Some(id)),
                Err(err) => (Err(code(err)), None),
            },
            SimOp::DeleteCard { card } => {
                let outcome = self.svc.delete_card(&actor, card);
                (outcome.map(|r| moved(r.shifted, false)).map_err(code), None)
            }
        }
    }

    /// Apply `op` to `model` the way the store should have.
    fn predict(
        &self,
        model: &mut Model,
        op: &SimOp,
        created: Option<CardId>,
    ) -> std::result::Result<Applied, OrderError> {
        let (out_of_range, unknown_items) = (self.config.out_of_range, self.config.unknown_items);
        match op {
            SimOp::MoveCard {
                card,
                target,
                position,
            } => model.move_card(card, target, *position, out_of_range),
            SimOp::MoveList {
                list,
                target,
                position,
            } => model.move_list(list, target, *position, out_of_range),
            SimOp::ReorderCards { list, mapping } => {
                model.reorder_cards(list, mapping, unknown_items)
            }
            SimOp::ReorderLists { board, mapping } => {
                model.reorder_lists(board, mapping, unknown_items)
            }
            SimOp::CreateCard { list, position } => {
                let card = created.unwrap_or_else(|| CardId::new(UNCREATED_CARD));
                model.insert_card(list, card, *position, out_of_range)
            }
            SimOp::DeleteCard { card } => model.remove_card(card),
        }
    }

    fn describe(&self, op: &SimOp) -> String {
        match op {
            SimOp::MoveCard {
                card,
                target,
                position,
            } => format!(
                "{} -> {} @{position}",
                self.alias_of(card.as_str()),
                self.alias_of(target.as_str())
            ),
            SimOp::MoveList {
                list,
                target,
                position,
            } => format!(
                "{} -> {} @{position}",
                self.alias_of(list.as_str()),
                self.alias_of(target.as_str())
            ),
            SimOp::ReorderCards { list, mapping } => {
                let entries = mapping.iter().map(|(c, p)| (self.alias_of(c.as_str()), *p));
                format!("{} {}", self.alias_of(list.as_str()), render_mapping(entries))
            }
            SimOp::ReorderLists { board, mapping } => {
                let entries = mapping.iter().map(|(l, p)| (self.alias_of(l.as_str()), *p));
                format!("{} {}", self.alias_of(board.as_str()), render_mapping(entries))
            }
            SimOp::CreateCard { list, position } => match position {
                Some(position) => format!("{} @{position}", self.alias_of(list.as_str())),
                None => format!("{} @end", self.alias_of(list.as_str())),
            },
            SimOp::DeleteCard { card } => self.alias_of(card.as_str()),
        }
    }
}

const fn moved(changed: usize, noop: bool) -> Applied {
    Applied { changed, noop }
}

/// `{a=0, b=2}` with entries sorted by alias.
fn render_mapping(entries: impl Iterator<Item = (String, i64)>) -> String {
    let mut entries: Vec<(String, i64)> = entries.collect();
    entries.sort();
    let mut out = String::from("{");
    for (i, (alias, position)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{alias}={position}");
    }
    out.push('}');
    out
}
