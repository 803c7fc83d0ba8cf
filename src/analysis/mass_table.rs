use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::{DetectorConfig, DetectorOutputConfig};
use crate::data::model::{Group, GroupStats};
use crate::data::text::{parse_f64, read_table, write_table};
use crate::error::{PipelineError, Result};
use crate::flux::writer::KeyRow;

use super::channels::{group_counts, group_stats, load_channel_counts, EventFileSet};

// ---------------------------------------------------------------------------
// MassTable – time-resolved group statistics of one progenitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct MassRow {
    /// Left edge of the time bin [s].
    pub time: f64,
    /// One entry per group, in [`MassTable::groups`] order.
    pub stats: Vec<GroupStats>,
}

/// Per-timestep totals and mean energies, one row per time bin.
#[derive(Debug, Clone, PartialEq)]
pub struct MassTable {
    groups: Vec<Group>,
    rows: Vec<MassRow>,
}

impl MassTable {
    pub fn new(groups: Vec<Group>) -> Self {
        MassTable {
            groups,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, time: f64, stats: Vec<GroupStats>) -> Result<()> {
        if stats.len() != self.groups.len() {
            return Err(PipelineError::LengthMismatch {
                what: "group statistics",
                expected: self.groups.len(),
                found: stats.len(),
            });
        }
        self.rows.push(MassRow { time, stats });
        Ok(())
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn rows(&self) -> &[MassRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn group_index(&self, group: &Group) -> Option<usize> {
        self.groups.iter().position(|g| g == group)
    }

    /// `Time`, `Avg_<group>`..., `Tot_<group>`...
    pub fn header(&self) -> Vec<String> {
        std::iter::once("Time".to_string())
            .chain(self.groups.iter().map(|g| format!("Avg_{g}")))
            .chain(self.groups.iter().map(|g| format!("Tot_{g}")))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Building from detector output
// ---------------------------------------------------------------------------

/// Aggregate every time bin listed in the key table into a [`MassTable`].
pub fn analyze_model(
    files: &EventFileSet,
    key: &[KeyRow],
    detector: &DetectorConfig,
    output: &DetectorOutputConfig,
) -> Result<MassTable> {
    let mut table = MassTable::new(detector.output_groups());

    for row in key {
        let snapshot = load_channel_counts(files, row.index, detector, output)?;
        let grouped = group_counts(&snapshot, detector)?;
        let stats = group_stats(&grouped, &snapshot.energies);
        debug!(
            "m{} bin {}: {:.4} total counts",
            files.mass, row.index, stats[0].total
        );
        table.push_row(row.time, stats)?;
    }

    info!(
        "Analysed {} time bins for mass {} ({})",
        table.len(),
        files.mass,
        files.detector
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

pub fn mass_table_path(dir: &Path, detector: &str, tab: u32, mass: &str) -> PathBuf {
    dir.join(format!("{detector}_analysis_tab{tab}_m{mass}.dat"))
}

pub fn write_mass_table(path: &Path, table: &MassTable) -> Result<()> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            std::iter::once(row.time.to_string())
                .chain(row.stats.iter().map(|s| s.mean_energy.to_string()))
                .chain(row.stats.iter().map(|s| s.total.to_string()))
                .collect()
        })
        .collect();
    write_table(path, &table.header(), &rows)
}

/// Read a table written by [`write_mass_table`].
pub fn read_mass_table(path: &Path) -> Result<MassTable> {
    let text = read_table(path)?;
    let (groups, avg_cols, tot_cols) = split_stat_columns(path, &text.header, "Time")?;

    let mut table = MassTable::new(groups);
    for (r, row) in text.rows.iter().enumerate() {
        let line = r + 2;
        let time = parse_f64(path, line, &row[0])?;
        let stats = read_stats(path, line, row, &avg_cols, &tot_cols)?;
        table.push_row(time, stats)?;
    }
    Ok(table)
}

/// Split `<first>, Avg_<g>..., Tot_<g>...` headers into groups and column indices.
pub(crate) fn split_stat_columns(
    path: &Path,
    header: &[String],
    first: &str,
) -> Result<(Vec<Group>, Vec<usize>, Vec<usize>)> {
    let bad = |message: String| PipelineError::Parse {
        path: path.to_path_buf(),
        line: 1,
        message,
    };
    if header.first().map(String::as_str) != Some(first) {
        return Err(bad(format!("first column must be '{first}'")));
    }

    let mut groups = Vec::new();
    let mut avg_cols = Vec::new();
    for (i, name) in header.iter().enumerate() {
        if let Some(group) = name.strip_prefix("Avg_") {
            groups.push(Group::parse(group));
            avg_cols.push(i);
        }
    }
    let tot_cols = groups
        .iter()
        .map(|g| {
            let name = format!("Tot_{g}");
            header
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| bad(format!("no '{name}' column")))
        })
        .collect::<Result<Vec<usize>>>()?;

    Ok((groups, avg_cols, tot_cols))
}

pub(crate) fn read_stats(
    path: &Path,
    line: usize,
    row: &[String],
    avg_cols: &[usize],
    tot_cols: &[usize],
) -> Result<Vec<GroupStats>> {
    avg_cols
        .iter()
        .zip(tot_cols)
        .map(|(&a, &t)| {
            Ok(GroupStats {
                mean_energy: parse_f64(path, line, &row[a])?,
                total: parse_f64(path, line, &row[t])?,
            })
        })
        .collect()
}
