use std::path::{Path, PathBuf};

use crate::config::{DetectorConfig, DetectorOutputConfig};
use crate::data::model::{ChannelCounts, Group, GroupStats};
use crate::data::text::read_numeric_rows;
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Detector-output files
// ---------------------------------------------------------------------------

/// Names of the detector simulator's smeared event files for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct EventFileSet {
    pub dir: PathBuf,
    pub tab: u32,
    pub mass: String,
    pub detector: String,
}

impl EventFileSet {
    pub fn new(dir: impl Into<PathBuf>, tab: u32, mass: &str, detector: &str) -> Self {
        EventFileSet {
            dir: dir.into(),
            tab,
            mass: mass.to_string(),
            detector: detector.to_string(),
        }
    }

    /// Event file of `channel` at time bin `index` (1-based).
    pub fn path(&self, index: usize, channel: &str) -> PathBuf {
        self.dir.join(format!(
            "pinched_tab{}_m{}_{index}_{channel}_{}_events_smeared.dat",
            self.tab, self.mass, self.detector
        ))
    }
}

/// Energies (rescaled to MeV) and counts from one event file.
pub fn load_channel_file(path: &Path, output: &DetectorOutputConfig) -> Result<(Vec<f64>, Vec<f64>)> {
    let rows = read_numeric_rows(path, 0, output.footer_lines)?;
    let mut energies = Vec::with_capacity(rows.len());
    let mut counts = Vec::with_capacity(rows.len());

    for (line, row) in rows.iter().enumerate() {
        if row.len() < 2 {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                line: line + 1,
                message: format!("expected energy and count columns, found {}", row.len()),
            });
        }
        energies.push(row[0] * output.energy_scale);
        counts.push(row[1]);
    }
    Ok((energies, counts))
}

/// Load every configured channel of one snapshot.
///
/// The energy axis comes from the first channel; the others must match it.
pub fn load_channel_counts(
    files: &EventFileSet,
    index: usize,
    detector: &DetectorConfig,
    output: &DetectorOutputConfig,
) -> Result<ChannelCounts> {
    let mut snapshot: Option<ChannelCounts> = None;

    for channel in detector.channels() {
        let path = files.path(index, channel);
        let (energies, counts) = load_channel_file(&path, output)
            .map_err(|e| e.into_missing_file(&files.mass, index, Some(channel)))?;

        let snapshot = snapshot.get_or_insert_with(|| ChannelCounts::new(energies.clone()));
        if snapshot.energies != energies {
            return Err(PipelineError::Parse {
                path,
                line: 1,
                message: "energy bins differ from the first channel".into(),
            });
        }
        snapshot.insert(channel, counts)?;
    }

    snapshot.ok_or_else(|| PipelineError::InvalidConfig("detector has no channels".into()))
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Counts per energy bin for `Total` and each configured group, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCounts {
    pub groups: Vec<Group>,
    pub counts: Vec<Vec<f64>>,
}

impl GroupCounts {
    pub fn get(&self, group: &Group) -> Option<&[f64]> {
        self.groups
            .iter()
            .position(|g| g == group)
            .map(|i| self.counts[i].as_slice())
    }
}

/// Sum channel counts into groups; `Total` accumulates the groups in order.
pub fn group_counts(channel_counts: &ChannelCounts, detector: &DetectorConfig) -> Result<GroupCounts> {
    let n_bins = channel_counts.n_bins();
    let mut total = vec![0.0; n_bins];
    let mut groups = vec![Group::Total];
    let mut counts = Vec::with_capacity(detector.groups.len() + 1);

    for group in &detector.groups {
        let mut sum = vec![0.0; n_bins];
        for channel in &group.channels {
            for (s, c) in sum.iter_mut().zip(channel_counts.get(channel)?) {
                *s += c;
            }
        }
        for (t, s) in total.iter_mut().zip(&sum) {
            *t += s;
        }
        groups.push(Group::Named(group.name.clone()));
        counts.push(sum);
    }
    counts.insert(0, total);

    Ok(GroupCounts { groups, counts })
}

/// Total counts and mean energy of every group.
pub fn group_stats(group_counts: &GroupCounts, energies: &[f64]) -> Vec<GroupStats> {
    group_counts
        .counts
        .iter()
        .map(|counts| GroupStats::from_counts(counts, energies))
        .collect()
}
