//! Run configuration.
//!
//! Loaded once from JSON at startup and passed by reference into every stage;
//! nothing in the pipeline reads ambient state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::color::parse_hex;
use crate::data::model::{Bins, Group};
use crate::error::{PipelineError, Result};

/// Environment variable naming the data root.
pub const DATA_ENV: &str = "SNOWFLUX_DATA";

const MOMENT_EXTENSIONS: [&str; 4] = ["parquet", "csv", "json", "dat"];

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Distance to the supernova [cm].
    #[serde(default = "default_distance")]
    pub distance_cm: f64,

    /// Progenitor masses, exactly as they appear in file names.
    pub masses: Vec<String>,

    #[serde(default)]
    pub model_sets: Vec<ModelSet>,

    /// Output time bins [s].
    pub time_bins: BinRange,

    /// Neutrino energy bins [GeV].
    pub energy_bins: BinRange,

    #[serde(default)]
    pub summary: SummaryConfig,

    pub detectors: BTreeMap<String, DetectorConfig>,

    #[serde(default)]
    pub detector_output: DetectorOutputConfig,

    #[serde(default)]
    pub simulator: Option<SimulatorConfig>,
}

fn default_distance() -> f64 {
    // 10 kpc
    3.086e22
}

/// A family of models sharing a table id in file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSet {
    pub label: String,
    pub tab: u32,
    /// `#rrggbb`; generated when absent.
    #[serde(default)]
    pub color: Option<String>,
}

/// `[start, end)` divided into `width`-sized bins (`end` included with `endpoint`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BinRange {
    pub start: f64,
    pub end: f64,
    pub width: f64,
    #[serde(default)]
    pub endpoint: bool,
}

impl BinRange {
    pub fn bins(&self) -> Result<Bins> {
        Bins::span(self.start, self.end, self.width, self.endpoint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Leading time bins in the time-integrated summary.
    #[serde(default = "default_n_bins")]
    pub n_bins: usize,
    /// Largest window of the cumulative summary; `n_bins` when absent.
    #[serde(default)]
    pub max_n_bins: Option<usize>,
}

fn default_n_bins() -> usize {
    20
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            n_bins: default_n_bins(),
            max_n_bins: None,
        }
    }
}

impl SummaryConfig {
    pub fn max_n_bins(&self) -> usize {
        self.max_n_bins.unwrap_or(self.n_bins)
    }
}

/// Channels of one detector and how they are grouped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Channel list name handed to the detector simulator.
    pub channel_file: String,
    /// Groups in output-column order.
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub channels: Vec<String>,
}

impl DetectorConfig {
    /// Every channel, group by group.
    pub fn channels(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.channels.iter().map(String::as_str))
            .collect()
    }

    /// `Total` followed by the configured groups.
    pub fn output_groups(&self) -> Vec<Group> {
        std::iter::once(Group::Total)
            .chain(self.groups.iter().map(|g| Group::Named(g.name.clone())))
            .collect()
    }
}

/// Layout of the detector simulator's per-channel output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorOutputConfig {
    /// Trailing summary lines after the energy table.
    #[serde(default = "default_footer_lines")]
    pub footer_lines: usize,
    /// Multiplier from file energy units to MeV.
    #[serde(default = "default_energy_scale")]
    pub energy_scale: f64,
}

fn default_footer_lines() -> usize {
    2
}

fn default_energy_scale() -> f64 {
    // GeV → MeV
    1000.0
}

impl Default for DetectorOutputConfig {
    fn default() -> Self {
        Self {
            footer_lines: default_footer_lines(),
            energy_scale: default_energy_scale(),
        }
    }
}

/// External detector-response program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub program: PathBuf,
    /// Directory the program runs in (it reads `fluxes/` and writes `out/` there).
    pub workdir: PathBuf,
}

impl AnalysisConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("in config {}", path.display()))
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(content).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(PipelineError::InvalidConfig(msg)) };

        if !(self.distance_cm.is_finite() && self.distance_cm > 0.0) {
            return invalid(format!("distance_cm must be positive, got {}", self.distance_cm));
        }
        if self.masses.is_empty() {
            return invalid("mass list is empty".into());
        }
        self.time_bins.bins()?;
        self.energy_bins.bins()?;
        if self.summary.n_bins == 0 || self.summary.max_n_bins() == 0 {
            return invalid("summary windows need at least one bin".into());
        }
        if !(self.detector_output.energy_scale > 0.0) {
            return invalid("detector_output.energy_scale must be positive".into());
        }

        for set in &self.model_sets {
            if let Some(color) = &set.color {
                if parse_hex(color).is_none() {
                    return invalid(format!("model set '{}': bad colour '{color}'", set.label));
                }
            }
        }

        for (name, detector) in &self.detectors {
            if detector.groups.is_empty() {
                return invalid(format!("detector '{name}' has no channel groups"));
            }
            let mut seen = BTreeSet::new();
            for group in &detector.groups {
                if group.name == Group::TOTAL {
                    return invalid(format!("detector '{name}': group name 'Total' is reserved"));
                }
                if !seen.insert(group.name.as_str()) {
                    return invalid(format!("detector '{name}': duplicate group '{}'", group.name));
                }
                if group.channels.is_empty() {
                    return invalid(format!("detector '{name}': group '{}' is empty", group.name));
                }
            }
        }
        Ok(())
    }

    pub fn detector(&self, name: &str) -> Result<&DetectorConfig> {
        self.detectors.get(name).ok_or_else(|| PipelineError::MissingConfig {
            setting: format!("detectors.{name}"),
            hint: format!(
                "Add a '{name}' entry with channel_file and groups (known: {}).",
                self.detectors.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })
    }

    pub fn model_set(&self, label: &str) -> Result<&ModelSet> {
        self.model_sets
            .iter()
            .find(|s| s.label == label)
            .ok_or_else(|| PipelineError::MissingConfig {
                setting: format!("model_sets[{label}]"),
                hint: "Add the model set with its table id to model_sets.".into(),
            })
    }

    pub fn simulator(&self) -> Result<&SimulatorConfig> {
        self.simulator.as_ref().ok_or_else(|| PipelineError::MissingConfig {
            setting: "simulator".into(),
            hint: "Set simulator.program and simulator.workdir to run the detector simulator."
                .into(),
        })
    }
}

// ---------------------------------------------------------------------------
// DataPaths – where each stage reads and writes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    /// Use the given data root, failing fast when none was supplied.
    pub fn resolve(root: Option<PathBuf>) -> Result<Self> {
        match root {
            Some(root) => Ok(DataPaths { root }),
            None => Err(PipelineError::MissingConfig {
                setting: DATA_ENV.into(),
                hint: format!(
                    "Pass --data-dir or point {DATA_ENV} at the data directory, e.g. \
                     \"export {DATA_ENV}=${{HOME}}/projects/snowglobes-data\""
                ),
            }),
        }
    }

    pub fn config(&self) -> PathBuf {
        self.root.join("snowflux.json")
    }

    pub fn moments(&self) -> PathBuf {
        self.root.join("moments")
    }

    /// `moments/{label}_m{mass}` with the first supported extension present.
    pub fn moments_file(&self, label: &str, mass: &str) -> Option<PathBuf> {
        MOMENT_EXTENSIONS
            .iter()
            .map(|ext| self.moments().join(format!("{label}_m{mass}.{ext}")))
            .find(|path| path.is_file())
    }

    pub fn fluxes(&self) -> PathBuf {
        self.root.join("fluxes")
    }

    pub fn detector_output(&self) -> PathBuf {
        self.root.join("out")
    }

    pub fn mass_tables(&self) -> PathBuf {
        self.root.join("mass_tables")
    }

    pub fn summaries(&self) -> PathBuf {
        self.root.join("summaries")
    }

    pub fn reports(&self) -> PathBuf {
        self.root.join("reports")
    }
}
