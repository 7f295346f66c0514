//! Position integrity checks.
//!
//! Every board's lists and every list's cards must sit at exactly
//! `0..N`. Normal writes keep that true; this module detects containers
//! damaged by outside edits and rewrites them densely, keeping the stored
//! relative order.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::Result;
use crate::store::{self, BoardLists, ContainerKind, ListCards};

/// One container whose stored positions are not `0..N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DensityViolation {
    /// `board` or `list`.
    pub kind: &'static str,
    pub container: String,
    /// Stored positions in ascending order.
    pub positions: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DensityReport {
    pub containers_checked: usize,
    pub violations: Vec<DensityViolation>,
    /// Rows rewritten by [`repair_density`]; always 0 for a plain check.
    pub repaired_rows: usize,
}

impl DensityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Scan every container and report density violations.
///
/// # Errors
///
/// Returns a store error.
pub fn check_density(conn: &Connection) -> Result<DensityReport> {
    let mut report = DensityReport::default();
    scan::<BoardLists>(conn, &mut report, false)?;
    scan::<ListCards>(conn, &mut report, false)?;
    Ok(report)
}

/// Scan every container and re-densify the damaged ones, all in one write
/// transaction. The report lists what was found before the repair.
///
/// # Errors
///
/// Returns a store error; nothing is written in that case.
pub fn repair_density(conn: &mut Connection) -> Result<DensityReport> {
    let tx = store::begin(conn)?;
    let mut report = DensityReport::default();
    scan::<BoardLists>(&tx, &mut report, true)?;
    scan::<ListCards>(&tx, &mut report, true)?;
    tx.commit()?;

    if !report.is_clean() {
        tracing::warn!(
            containers = report.violations.len(),
            rows = report.repaired_rows,
            "repaired position gaps"
        );
    }
    Ok(report)
}

fn scan<K: ContainerKind>(conn: &Connection, report: &mut DensityReport, fix: bool) -> Result<()> {
    for container in container_ids::<K>(conn)? {
        report.containers_checked += 1;
        let snapshot = store::load_container_items::<K>(conn, &container)?;
        if snapshot.is_dense() {
            continue;
        }

        let mut positions: Vec<i64> = snapshot
            .items
            .items()
            .iter()
            .filter_map(|item| snapshot.stored_position(item))
            .collect();
        positions.sort_unstable();
        tracing::debug!(kind = K::CONTAINER, %container, ?positions, "density violation");

        if fix {
            let committed = store::commit(conn, &snapshot, &snapshot.items)?;
            report.repaired_rows += committed.changed;
        }
        report.violations.push(DensityViolation {
            kind: K::CONTAINER,
            container: container.to_string(),
            positions,
        });
    }
    Ok(())
}

fn container_ids<K: ContainerKind>(conn: &Connection) -> Result<Vec<K::Container>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {key} FROM {table} ORDER BY {key}",
        key = K::CONTAINER_KEY,
        table = K::CONTAINER_TABLE
    ))?;
    let ids = stmt
        .query_map(params![], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}
