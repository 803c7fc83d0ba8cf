use std::path::{Path, PathBuf};

use log::info;

use crate::data::model::{FluenceTable, Species};
use crate::data::text::{parse_f64, read_numeric_rows, read_table, write_rows, write_table};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

/// Names of the flux files for one (table, mass) model.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxFileSet {
    pub dir: PathBuf,
    pub tab: u32,
    pub mass: String,
}

impl FluxFileSet {
    pub fn new(dir: impl Into<PathBuf>, tab: u32, mass: &str) -> Self {
        FluxFileSet {
            dir: dir.into(),
            tab,
            mass: mass.to_string(),
        }
    }

    fn prefix(&self) -> String {
        format!("pinched_tab{}_m{}", self.tab, self.mass)
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.join(format!("{}_key.dat", self.prefix()))
    }

    /// Flux name of time bin `index` (1-based), as handed to the simulator.
    pub fn stem(&self, index: usize) -> String {
        format!("{}_{index}", self.prefix())
    }

    pub fn flux_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.dat", self.stem(index)))
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub const KEY_COLUMNS: [&str; 3] = ["i", "time[s]", "dt[s]"];

/// Write the key table and one flux file per time bin.
///
/// Flux files have no header; columns are the energy-bin left edge followed
/// by the six species in [`Species::ALL`] order.
pub fn write_fluxes(files: &FluxFileSet, table: &FluenceTable) -> Result<()> {
    let time_bins = table.time_bins();
    let energies = table.energy_bins().lefts();

    let header: Vec<String> = KEY_COLUMNS.iter().map(|c| c.to_string()).collect();
    let key_rows: Vec<Vec<String>> = time_bins
        .lefts()
        .iter()
        .enumerate()
        .map(|(i, t)| vec![(i + 1).to_string(), t.to_string(), time_bins.width().to_string()])
        .collect();
    write_table(&files.key_path(), &header, &key_rows)?;

    for i in 0..time_bins.len() {
        let rows: Vec<Vec<String>> = energies
            .iter()
            .enumerate()
            .map(|(e, energy)| {
                let mut row = vec![format!("{energy:e}")];
                row.extend(
                    Species::ALL
                        .iter()
                        .map(|s| format!("{:e}", table.get(s.flavor(), i, e))),
                );
                row
            })
            .collect();
        write_rows(&files.flux_path(i + 1), &rows)?;
    }

    info!(
        "Wrote {} flux files under {}",
        time_bins.len(),
        files.dir.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One row of the key table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyRow {
    pub index: usize,
    pub time: f64,
    pub dt: f64,
}

pub fn read_key_table(path: &Path) -> Result<Vec<KeyRow>> {
    let table = read_table(path)?;
    let column = |name: &str| {
        table.column_index(name).ok_or_else(|| PipelineError::Parse {
            path: path.to_path_buf(),
            line: 1,
            message: format!("key table has no '{name}' column"),
        })
    };
    let (i_col, t_col, dt_col) = (column("i")?, column("time[s]")?, column("dt[s]")?);

    table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let line = r + 2;
            let index = row[i_col].parse::<usize>().map_err(|_| PipelineError::Parse {
                path: path.to_path_buf(),
                line,
                message: format!("'{}' is not a bin index", row[i_col]),
            })?;
            Ok(KeyRow {
                index,
                time: parse_f64(path, line, &row[t_col])?,
                dt: parse_f64(path, line, &row[dt_col])?,
            })
        })
        .collect()
}

/// Contents of one flux file.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxFile {
    pub energies: Vec<f64>,
    /// Per energy bin, one value per species in [`Species::ALL`] order.
    pub fluxes: Vec<[f64; 6]>,
}

impl FluxFile {
    pub fn column(&self, species: Species) -> Vec<f64> {
        let k = Species::ALL
            .iter()
            .position(|&s| s == species)
            .unwrap_or_default();
        self.fluxes.iter().map(|row| row[k]).collect()
    }
}

pub fn read_flux_file(path: &Path) -> Result<FluxFile> {
    let rows = read_numeric_rows(path, 0, 0)?;
    let mut energies = Vec::with_capacity(rows.len());
    let mut fluxes = Vec::with_capacity(rows.len());

    for (line, row) in rows.iter().enumerate() {
        let [energy, e, mu, tau, ebar, mubar, taubar] = row[..] else {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                line: line + 1,
                message: format!("expected 7 columns, found {}", row.len()),
            });
        };
        energies.push(energy);
        fluxes.push([e, mu, tau, ebar, mubar, taubar]);
    }

    Ok(FluxFile { energies, fluxes })
}
