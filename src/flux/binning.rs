use crate::data::model::{MomentSeries, Moments, PerFlavor, TimeBins};
use crate::error::{PipelineError, Result};

use super::interpolate::interpolate_many;

/// Simulation samples local to one output time bin.
///
/// `time[0]` and `time[last]` are the bin's exact edges, and the matching
/// samples are interpolated there. Everything in between is raw data.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSlice {
    pub time: Vec<f64>,
    pub samples: Vec<PerFlavor<Moments>>,
}

/// Cut the series down to `[left, right)` plus one neighbour on each side,
/// then pin the outer points to the edges.
pub fn slice_bin(series: &MomentSeries, left: f64, right: f64) -> Result<BinSlice> {
    if !(right > left) {
        return Err(PipelineError::InvalidBins(format!(
            "bin [{left}, {right}) has no width"
        )));
    }
    for edge in [left, right] {
        if edge < series.start() || edge > series.end() {
            return Err(PipelineError::OutOfRange {
                t: edge,
                start: series.start(),
                end: series.end(),
            });
        }
    }

    let time = series.time();
    let i_left = time.partition_point(|&t| t < left);
    let i_right = time.partition_point(|&t| t < right);

    // the neighbour before the left edge, unless the edge is the first sample
    let lo = i_left.saturating_sub(1);
    let hi = i_right;

    let mut local_time = time[lo..=hi].to_vec();
    let mut samples = series.samples()[lo..=hi].to_vec();
    let last = local_time.len() - 1;

    local_time[0] = left;
    local_time[last] = right;
    let edges = interpolate_many(time, series.samples(), &[left, right])?;
    samples[0] = edges[0];
    samples[last] = edges[1];

    Ok(BinSlice {
        time: local_time,
        samples,
    })
}

/// One [`BinSlice`] per output bin.
pub fn slice_all(series: &MomentSeries, bins: &TimeBins) -> Result<Vec<BinSlice>> {
    (0..bins.len())
        .map(|i| {
            let (left, right) = bins.edges(i);
            slice_bin(series, left, right)
        })
        .collect()
}
