//! Read-only views over finished summaries: channel fractions, window spans
//! and the JSON report that collects them per model set.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::analysis::summary::SummaryTable;
use crate::color::{to_hex, ColorMap};
use crate::config::ModelSet;
use crate::data::model::{mean_or_zero, Group, GroupStats, TimeBins};
use crate::error::{PipelineError, Result};

/// Mean over masses of `Tot_group / Tot_Total`, for each configured group.
///
/// Masses with nothing detected contribute 0.
pub fn channel_fractions(summary: &SummaryTable) -> BTreeMap<String, f64> {
    let Some(total_col) = summary.group_index(&Group::Total) else {
        return BTreeMap::new();
    };
    let n_masses = summary.rows.len();

    summary
        .groups
        .iter()
        .enumerate()
        .filter(|&(g, _)| g != total_col)
        .map(|(g, group)| {
            let sum: f64 = summary
                .rows
                .iter()
                .map(|row| mean_or_zero(row.stats[g].total, row.stats[total_col].total))
                .sum();
            let mean = if n_masses == 0 { 0.0 } else { sum / n_masses as f64 };
            (group.name().to_string(), mean)
        })
        .collect()
}

/// `[start, end)` covered by the first `n_bins` time bins.
pub fn window_span(time_bins: &TimeBins, n_bins: usize) -> Result<(f64, f64)> {
    if n_bins == 0 || n_bins > time_bins.len() {
        return Err(PipelineError::InvalidWindow {
            n_bins,
            len: time_bins.len(),
        });
    }
    let (start, _) = time_bins.edges(0);
    let (_, end) = time_bins.edges(n_bins - 1);
    Ok((start, end))
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub detector: String,
    pub n_bins: usize,
    /// Time window integrated over [s].
    pub window: (f64, f64),
    pub model_sets: Vec<ModelSetReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSetReport {
    pub label: String,
    pub tab: u32,
    pub color: String,
    pub fractions: BTreeMap<String, f64>,
    pub masses: Vec<MassReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MassReport {
    pub mass: String,
    pub groups: BTreeMap<String, GroupStats>,
}

impl Report {
    pub fn new(detector: &str, n_bins: usize, window: (f64, f64)) -> Self {
        Report {
            detector: detector.to_string(),
            n_bins,
            window,
            model_sets: Vec::new(),
        }
    }

    pub fn add_model_set(&mut self, set: &ModelSet, colors: &ColorMap, summary: &SummaryTable) {
        let masses = summary
            .rows
            .iter()
            .map(|row| MassReport {
                mass: row.mass.clone(),
                groups: summary
                    .groups
                    .iter()
                    .map(|g| g.name().to_string())
                    .zip(row.stats.iter().copied())
                    .collect(),
            })
            .collect();

        self.model_sets.push(ModelSetReport {
            label: set.label.clone(),
            tab: set.tab,
            color: to_hex(colors.color_for(&set.label)),
            fractions: channel_fractions(summary),
            masses,
        });
    }
}

pub fn write_report(path: &Path, report: &Report) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("writing report {}", path.display()))?;
    writer.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mass_table::tests::table_from;
    use crate::analysis::summary::{time_integrate, Ensemble};
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn summary() -> SummaryTable {
        let a = table_from(&[(0.0, [(3.0, 10.0), (1.0, 20.0)])]);
        let b = table_from(&[(0.0, [(0.0, 0.0), (0.0, 0.0)])]);
        let c = table_from(&[(0.0, [(1.0, 12.0), (1.0, 18.0)])]);
        let ens = Ensemble::new(vec![("11".into(), a), ("20".into(), b), ("40".into(), c)]).unwrap();
        time_integrate(&ens, 1).unwrap()
    }

    #[test]
    fn fractions_average_over_masses() {
        let fractions = channel_fractions(&summary());
        assert_eq!(fractions.len(), 2);
        assert!(!fractions.contains_key("Total"));
        // (0.75 + 0 + 0.5) / 3 and (0.25 + 0 + 0.5) / 3
        assert_relative_eq!(fractions["cc"], 1.25 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(fractions["es"], 0.75 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn window_span_covers_leading_bins() {
        let bins = TimeBins::span(0.0, 0.1, 0.025, false).unwrap();
        let (start, end) = window_span(&bins, 2).unwrap();
        assert_eq!(start, 0.0);
        assert_relative_eq!(end, 0.05, epsilon = 1e-15);
        assert!(window_span(&bins, 0).is_err());
        assert!(window_span(&bins, 5).is_err());
    }

    #[test]
    fn report_json() {
        let dir = tempdir().unwrap();
        let set = ModelSet { label: "LMP".into(), tab: 1, color: Some("#00ff00".into()) };
        let colors = ColorMap::for_model_sets(std::slice::from_ref(&set));

        let mut report = Report::new("ar40kt", 1, (0.0, 0.005));
        report.add_model_set(&set, &colors, &summary());
        let path = dir.path().join("reports").join("ar40kt.json");
        write_report(&path, &report).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let set = &json["model_sets"][0];
        assert_eq!(set["color"], "#00ff00");
        assert_eq!(set["masses"].as_array().unwrap().len(), 3);
        assert_eq!(set["masses"][0]["groups"]["Total"]["total"], 4.0);
        assert_eq!(json["window"][1], 0.005);
    }
}
