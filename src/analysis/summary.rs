//! Time integration over leading windows of the mass tables.
//!
//! For a window of `n` bins and each group:
//!
//! ```text
//! total = Σ_{t<n} Tot[t]
//! mean  = Σ_{t<n} Avg[t]·Tot[t] / total      (0 when total is 0)
//! ```

use std::path::{Path, PathBuf};

use log::info;

use crate::data::model::{mean_or_zero, Group, GroupStats};
use crate::data::text::{read_table, write_table};
use crate::error::{PipelineError, Result};

use super::mass_table::{read_stats, split_stat_columns, MassTable};

// ---------------------------------------------------------------------------
// Ensemble – mass tables of a whole model set
// ---------------------------------------------------------------------------

/// Mass tables of one model set: (mass × time × group).
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    masses: Vec<String>,
    tables: Vec<MassTable>,
}

impl Ensemble {
    /// All tables must carry the same groups in the same order.
    pub fn new(entries: Vec<(String, MassTable)>) -> Result<Self> {
        let (masses, tables): (Vec<String>, Vec<MassTable>) = entries.into_iter().unzip();
        if let Some(first) = tables.first() {
            for (mass, table) in masses.iter().zip(&tables) {
                if table.groups() != first.groups() {
                    return Err(PipelineError::InvalidConfig(format!(
                        "mass {mass} has groups {:?}, expected {:?}",
                        table.groups(),
                        first.groups()
                    )));
                }
            }
        }
        Ok(Ensemble { masses, tables })
    }

    pub fn masses(&self) -> &[String] {
        &self.masses
    }

    pub fn tables(&self) -> &[MassTable] {
        &self.tables
    }

    pub fn groups(&self) -> &[Group] {
        self.tables.first().map(MassTable::groups).unwrap_or(&[])
    }

    /// Length of the shortest mass table.
    pub fn n_time(&self) -> usize {
        self.tables.iter().map(MassTable::len).min().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// SummaryTable – one window over every mass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub mass: String,
    pub stats: Vec<GroupStats>,
}

/// Time-integrated statistics per mass for a window of `n_bins`.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub n_bins: usize,
    pub groups: Vec<Group>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// `Mass`, `Avg_<group>`..., `Tot_<group>`...
    pub fn header(&self) -> Vec<String> {
        std::iter::once("Mass".to_string())
            .chain(self.groups.iter().map(|g| format!("Avg_{g}")))
            .chain(self.groups.iter().map(|g| format!("Tot_{g}")))
            .collect()
    }

    pub fn group_index(&self, group: &Group) -> Option<usize> {
        self.groups.iter().position(|g| g == group)
    }

    pub fn row(&self, mass: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.mass == mass)
    }
}

/// Integrate the first `n_bins` rows of one mass table.
pub fn integrate_window(table: &MassTable, n_bins: usize) -> Result<Vec<GroupStats>> {
    if n_bins == 0 || n_bins > table.len() {
        return Err(PipelineError::InvalidWindow {
            n_bins,
            len: table.len(),
        });
    }
    let window = &table.rows()[..n_bins];

    Ok((0..table.groups().len())
        .map(|g| {
            let mut total = 0.0;
            let mut weighted = 0.0;
            for row in window {
                let s = row.stats[g];
                total += s.total;
                weighted += s.mean_energy * s.total;
            }
            GroupStats {
                total,
                mean_energy: mean_or_zero(weighted, total),
            }
        })
        .collect())
}

/// Fixed-window integration of every mass.
pub fn time_integrate(ensemble: &Ensemble, n_bins: usize) -> Result<SummaryTable> {
    let rows = ensemble
        .masses()
        .iter()
        .zip(ensemble.tables())
        .map(|(mass, table)| {
            Ok(SummaryRow {
                mass: mass.clone(),
                stats: integrate_window(table, n_bins)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SummaryTable {
        n_bins,
        groups: ensemble.groups().to_vec(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Cumulative – every window size up to a maximum
// ---------------------------------------------------------------------------

/// Summary tables for windows of 1..=`max_n_bins` bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Cumulative {
    windows: Vec<SummaryTable>,
}

impl Cumulative {
    pub fn max_n_bins(&self) -> usize {
        self.windows.len()
    }

    /// The summary for a window of `n_bins` (1-based).
    pub fn window(&self, n_bins: usize) -> Option<&SummaryTable> {
        n_bins.checked_sub(1).and_then(|i| self.windows.get(i))
    }

    pub fn windows(&self) -> &[SummaryTable] {
        &self.windows
    }
}

/// Repeat [`time_integrate`] for each window size.
pub fn cumulative(ensemble: &Ensemble, max_n_bins: usize) -> Result<Cumulative> {
    let n_time = ensemble.n_time();
    if max_n_bins > n_time {
        return Err(PipelineError::InvalidWindow {
            n_bins: max_n_bins,
            len: n_time,
        });
    }
    info!(
        "Integrating {} masses of {n_time} bins over 1..={max_n_bins} bins",
        ensemble.masses().len()
    );
    let windows = (1..=max_n_bins)
        .map(|n| time_integrate(ensemble, n))
        .collect::<Result<Vec<_>>>()?;
    Ok(Cumulative { windows })
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

pub fn summary_path(dir: &Path, detector: &str, n_bins: usize, tab: u32) -> PathBuf {
    dir.join(format!("{detector}_analysis_{n_bins}bins_tab{tab}.dat"))
}

pub fn write_summary_table(path: &Path, summary: &SummaryTable) -> Result<()> {
    let rows: Vec<Vec<String>> = summary
        .rows
        .iter()
        .map(|row| {
            std::iter::once(row.mass.clone())
                .chain(row.stats.iter().map(|s| s.mean_energy.to_string()))
                .chain(row.stats.iter().map(|s| s.total.to_string()))
                .collect()
        })
        .collect();
    write_table(path, &summary.header(), &rows)
}

pub fn read_summary_table(path: &Path, n_bins: usize) -> Result<SummaryTable> {
    let text = read_table(path)?;
    let (groups, avg_cols, tot_cols) = split_stat_columns(path, &text.header, "Mass")?;

    let rows = text
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            Ok(SummaryRow {
                mass: row[0].clone(),
                stats: read_stats(path, r + 2, row, &avg_cols, &tot_cols)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SummaryTable { n_bins, groups, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mass_table::tests::table_from;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn ensemble() -> Ensemble {
        let a = table_from(&[
            (0.0, [(3.0, 10.0), (1.0, 20.0)]),
            (0.005, [(0.1, 12.0), (0.0, 0.0)]),
            (0.010, [(0.7, 14.0), (0.3, 8.0)]),
            (0.015, [(1e-3, 11.0), (2.5, 30.0)]),
        ]);
        let b = table_from(&[
            (0.0, [(0.0, 0.0), (0.0, 0.0)]),
            (0.005, [(0.0, 0.0), (0.0, 0.0)]),
            (0.010, [(5.0, 15.0), (0.0, 0.0)]),
            (0.015, [(1.0, 17.0), (0.0, 0.0)]),
        ]);
        Ensemble::new(vec![("12.0".into(), a), ("25.0".into(), b)]).unwrap()
    }

    #[test]
    fn fixed_window() {
        let summary = time_integrate(&ensemble(), 2).unwrap();
        assert_eq!(summary.header()[0], "Mass");
        let row = summary.row("12.0").unwrap();
        let cc = row.stats[1];
        assert_relative_eq!(cc.total, 3.1);
        assert_relative_eq!(cc.mean_energy, (30.0 + 1.2) / 3.1, epsilon = 1e-12);

        // nothing detected yet in the second progenitor
        let row = summary.row("25.0").unwrap();
        for stats in &row.stats {
            assert_eq!(stats.total, 0.0);
            assert_eq!(stats.mean_energy, 0.0);
        }
    }

    #[test]
    fn window_totals_are_prefix_sums() {
        let ens = ensemble();
        let cum = cumulative(&ens, ens.n_time()).unwrap();
        assert_eq!(cum.max_n_bins(), 4);

        for (m, table) in ens.tables().iter().enumerate() {
            for g in 0..table.groups().len() {
                let mut prefix = 0.0;
                for k in 1..=table.len() {
                    prefix += table.rows()[k - 1].stats[g].total;
                    let window = cum.window(k).unwrap();
                    assert_eq!(window.rows[m].stats[g].total, prefix);
                    assert_eq!(window, &time_integrate(&ens, k).unwrap());
                }
            }
        }
        assert!(cum.window(0).is_none());
        assert!(cum.window(5).is_none());
    }

    #[test]
    fn windows_longer_than_the_data_fail() {
        let ens = ensemble();
        assert!(matches!(
            time_integrate(&ens, 5).unwrap_err(),
            PipelineError::InvalidWindow { n_bins: 5, len: 4 }
        ));
        assert!(time_integrate(&ens, 0).is_err());
        assert!(matches!(
            cumulative(&ens, 6).unwrap_err(),
            PipelineError::InvalidWindow { n_bins: 6, len: 4 }
        ));
    }

    #[test]
    fn mismatched_groups_are_rejected() {
        let a = table_from(&[(0.0, [(1.0, 1.0), (1.0, 1.0)])]);
        let b = MassTable::new(vec![Group::Total]);
        assert!(Ensemble::new(vec![("1".into(), a), ("2".into(), b)]).is_err());
    }

    #[test]
    fn summary_round_trip() {
        let dir = tempdir().unwrap();
        let summary = time_integrate(&ensemble(), 3).unwrap();
        let path = summary_path(dir.path(), "ar40kt", 3, 2);
        assert!(path.ends_with("ar40kt_analysis_3bins_tab2.dat"));

        write_summary_table(&path, &summary).unwrap();
        assert_eq!(read_summary_table(&path, 3).unwrap(), summary);
    }
}
