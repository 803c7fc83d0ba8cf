use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Flavor – the three neutrino classes carried through the pipeline
// ---------------------------------------------------------------------------

/// Neutrino flavor class as reported by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flavor {
    /// ν_e
    Electron = 0,
    /// ν̄_e
    AntiElectron = 1,
    /// ν_μ, ν_τ and their antiparticles, treated collectively.
    HeavyLepton = 2,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Electron, Flavor::AntiElectron, Flavor::HeavyLepton];

    /// Short key used in column names (`lum_e`, `avg_a`, `rms_x`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Flavor::Electron => "e",
            Flavor::AntiElectron => "a",
            Flavor::HeavyLepton => "x",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Species – the six physical species written to flux files
// ---------------------------------------------------------------------------

/// Physical neutrino species, in flux-file column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    E,
    Mu,
    Tau,
    EBar,
    MuBar,
    TauBar,
}

impl Species {
    pub const ALL: [Species; 6] = [
        Species::E,
        Species::Mu,
        Species::Tau,
        Species::EBar,
        Species::MuBar,
        Species::TauBar,
    ];

    /// Which simulated flavor class supplies this species' flux.
    pub fn flavor(self) -> Flavor {
        match self {
            Species::E => Flavor::Electron,
            Species::EBar => Flavor::AntiElectron,
            Species::Mu | Species::Tau | Species::MuBar | Species::TauBar => Flavor::HeavyLepton,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Species::E => "e",
            Species::Mu => "mu",
            Species::Tau => "tau",
            Species::EBar => "ebar",
            Species::MuBar => "mubar",
            Species::TauBar => "taubar",
        }
    }
}

// ---------------------------------------------------------------------------
// PerFlavor – fixed-size record indexed by Flavor
// ---------------------------------------------------------------------------

/// One value per [`Flavor`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerFlavor<T>(pub [T; 3]);

impl<T> PerFlavor<T> {
    pub fn from_fn(mut f: impl FnMut(Flavor) -> T) -> Self {
        let [e, a, x] = Flavor::ALL;
        PerFlavor([f(e), f(a), f(x)])
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(Flavor) -> std::result::Result<T, E>) -> std::result::Result<Self, E> {
        let [e, a, x] = Flavor::ALL;
        Ok(PerFlavor([f(e)?, f(a)?, f(x)?]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> PerFlavor<U> {
        PerFlavor::from_fn(|flavor| f(&self[flavor]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flavor, &T)> {
        Flavor::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<Flavor> for PerFlavor<T> {
    type Output = T;

    fn index(&self, flavor: Flavor) -> &T {
        &self.0[flavor.index()]
    }
}

impl<T> IndexMut<Flavor> for PerFlavor<T> {
    fn index_mut(&mut self, flavor: Flavor) -> &mut T {
        &mut self.0[flavor.index()]
    }
}

// ---------------------------------------------------------------------------
// Moments – simulation output for one flavor at one instant
// ---------------------------------------------------------------------------

/// Emission moments of one flavor. Luminosity in GeV/s, energies in GeV.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Moments {
    pub lum: f64,
    pub avg: f64,
    pub rms: f64,
}

// ---------------------------------------------------------------------------
// MomentSeries – the simulated time series
// ---------------------------------------------------------------------------

/// Strictly increasing simulation times with aligned per-flavor moments.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentSeries {
    time: Vec<f64>,
    samples: Vec<PerFlavor<Moments>>,
}

impl MomentSeries {
    pub fn new(time: Vec<f64>, samples: Vec<PerFlavor<Moments>>) -> Result<Self> {
        if samples.len() != time.len() {
            return Err(PipelineError::LengthMismatch {
                what: "moment samples",
                expected: time.len(),
                found: samples.len(),
            });
        }
        validate_time_axis(&time)?;
        for sample in &samples {
            for (_, m) in sample.iter() {
                for value in [m.lum, m.avg, m.rms] {
                    crate::error::ensure_finite("moment", value)?;
                }
            }
        }
        Ok(MomentSeries { time, samples })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn samples(&self) -> &[PerFlavor<Moments>] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.time[0]
    }

    pub fn end(&self) -> f64 {
        self.time[self.time.len() - 1]
    }
}

/// At least two finite, strictly increasing points.
pub fn validate_time_axis(time: &[f64]) -> Result<()> {
    if time.len() < 2 {
        return Err(PipelineError::LengthMismatch {
            what: "time series (minimum)",
            expected: 2,
            found: time.len(),
        });
    }
    for &t in time {
        crate::error::ensure_finite("time", t)?;
    }
    for (index, pair) in time.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(PipelineError::NonMonotonic {
                index: index + 1,
                prev: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bins – uniform left edges shared by the time and energy axes
// ---------------------------------------------------------------------------

/// Uniform bins identified by their left edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins {
    lefts: Vec<f64>,
    width: f64,
}

/// Output time bins [s].
pub type TimeBins = Bins;
/// Neutrino energy bins [GeV].
pub type EnergyBins = Bins;

impl Bins {
    /// Width inferred from the first two edges.
    pub fn from_left_edges(lefts: Vec<f64>) -> Result<Self> {
        if lefts.len() < 2 {
            return Err(PipelineError::InvalidBins(format!(
                "need two edges to infer a width, got {}",
                lefts.len()
            )));
        }
        let width = lefts[1] - lefts[0];
        Self::with_width(lefts, width)
    }

    pub fn with_width(lefts: Vec<f64>, width: f64) -> Result<Self> {
        if lefts.is_empty() {
            return Err(PipelineError::InvalidBins("no bins".into()));
        }
        if !(width.is_finite() && width > 0.0) {
            return Err(PipelineError::InvalidBins(format!("bin width {width} must be positive")));
        }
        for pair in lefts.windows(2) {
            if pair[1] <= pair[0] {
                return Err(PipelineError::InvalidBins(format!(
                    "edges not increasing: {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Bins { lefts, width })
    }

    /// `n = floor((x1 - x0) / dx)` bins (one more with `endpoint`), evenly
    /// spread over `[x0, x1)` (or `[x0, x1]`).
    pub fn span(x0: f64, x1: f64, dx: f64, endpoint: bool) -> Result<Self> {
        if !(dx.is_finite() && dx > 0.0) || !(x1 > x0) {
            return Err(PipelineError::InvalidBins(format!(
                "cannot divide [{x0}, {x1}] into bins of {dx}"
            )));
        }
        // the epsilon keeps e.g. 0.3 / 0.1 from truncating to 2
        let mut n = ((x1 - x0) / dx + 1e-9).floor() as usize;
        if endpoint {
            n += 1;
        }
        if n == 0 {
            return Err(PipelineError::InvalidBins(format!(
                "[{x0}, {x1}] is narrower than one bin of {dx}"
            )));
        }
        let divisions = if endpoint { n.saturating_sub(1).max(1) } else { n };
        let step = (x1 - x0) / divisions as f64;
        let lefts: Vec<f64> = (0..n).map(|i| x0 + i as f64 * step).collect();
        let width = if n >= 2 { lefts[1] - lefts[0] } else { dx };
        Self::with_width(lefts, width)
    }

    pub fn lefts(&self) -> &[f64] {
        &self.lefts
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.lefts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lefts.is_empty()
    }

    /// `[left, left + width)` of bin `i`.
    pub fn edges(&self, i: usize) -> (f64, f64) {
        let left = self.lefts[i];
        (left, left + self.width)
    }
}

// ---------------------------------------------------------------------------
// FluenceTable – time-integrated flux per (time bin, energy bin)
// ---------------------------------------------------------------------------

/// Fluence [neutrinos / cm²] per flavor, row-major over (time bin, energy bin).
#[derive(Debug, Clone, PartialEq)]
pub struct FluenceTable {
    time_bins: TimeBins,
    energy_bins: EnergyBins,
    values: PerFlavor<Vec<f64>>,
}

impl FluenceTable {
    /// Assemble from one `[flavor][energy bin]` row per time bin.
    pub fn from_rows(
        time_bins: TimeBins,
        energy_bins: EnergyBins,
        rows: Vec<PerFlavor<Vec<f64>>>,
    ) -> Result<Self> {
        if rows.len() != time_bins.len() {
            return Err(PipelineError::LengthMismatch {
                what: "fluence rows",
                expected: time_bins.len(),
                found: rows.len(),
            });
        }
        let n_e = energy_bins.len();
        let mut values = PerFlavor::from_fn(|_| Vec::with_capacity(rows.len() * n_e));

        for row in &rows {
            for flavor in Flavor::ALL {
                let cells = &row[flavor];
                if cells.len() != n_e {
                    return Err(PipelineError::LengthMismatch {
                        what: "fluence row energy bins",
                        expected: n_e,
                        found: cells.len(),
                    });
                }
                for &v in cells {
                    crate::error::ensure_finite("fluence", v)?;
                    if v < 0.0 {
                        return Err(PipelineError::NegativeFluence { value: v });
                    }
                }
                values[flavor].extend_from_slice(cells);
            }
        }

        Ok(FluenceTable {
            time_bins,
            energy_bins,
            values,
        })
    }

    pub fn time_bins(&self) -> &TimeBins {
        &self.time_bins
    }

    pub fn energy_bins(&self) -> &EnergyBins {
        &self.energy_bins
    }

    /// Fluence over energy bins for one flavor and time bin.
    pub fn row(&self, flavor: Flavor, time_bin: usize) -> &[f64] {
        let n_e = self.energy_bins.len();
        &self.values[flavor][time_bin * n_e..(time_bin + 1) * n_e]
    }

    pub fn get(&self, flavor: Flavor, time_bin: usize, energy_bin: usize) -> f64 {
        self.row(flavor, time_bin)[energy_bin]
    }
}

// ---------------------------------------------------------------------------
// ChannelCounts – detector output for one (model, timestep)
// ---------------------------------------------------------------------------

/// Detected counts per energy bin for each detector channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCounts {
    /// Energy-bin left edges in MeV.
    pub energies: Vec<f64>,
    counts: BTreeMap<String, Vec<f64>>,
}

impl ChannelCounts {
    pub fn new(energies: Vec<f64>) -> Self {
        ChannelCounts {
            energies,
            counts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, channel: &str, counts: Vec<f64>) -> Result<()> {
        if counts.len() != self.energies.len() {
            return Err(PipelineError::LengthMismatch {
                what: "channel counts",
                expected: self.energies.len(),
                found: counts.len(),
            });
        }
        self.counts.insert(channel.to_string(), counts);
        Ok(())
    }

    pub fn get(&self, channel: &str) -> Result<&[f64]> {
        self.counts
            .get(channel)
            .map(Vec::as_slice)
            .ok_or_else(|| PipelineError::UnknownChannel(channel.to_string()))
    }

    pub fn n_bins(&self) -> usize {
        self.energies.len()
    }
}

// ---------------------------------------------------------------------------
// Group – a named aggregate of channels
// ---------------------------------------------------------------------------

/// Either the reserved `Total` or a configured group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Group {
    Total,
    Named(String),
}

impl Group {
    pub const TOTAL: &'static str = "Total";

    pub fn parse(name: &str) -> Self {
        if name == Self::TOTAL {
            Group::Total
        } else {
            Group::Named(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Group::Total => Self::TOTAL,
            Group::Named(name) => name,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// GroupStats – total counts and mean energy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GroupStats {
    pub total: f64,
    /// Flux-weighted mean energy [MeV]; exactly 0 when `total` is 0.
    pub mean_energy: f64,
}

impl GroupStats {
    /// Sum counts over energy bins and weight the energies by them.
    pub fn from_counts(counts: &[f64], energies: &[f64]) -> Self {
        let total: f64 = counts.iter().sum();
        let weighted: f64 = counts.iter().zip(energies).map(|(c, e)| c * e).sum();
        GroupStats {
            total,
            mean_energy: mean_or_zero(weighted, total),
        }
    }
}

/// `weighted / total`, or 0 for an empty group.
pub fn mean_or_zero(weighted: f64, total: f64) -> f64 {
    if total != 0.0 {
        weighted / total
    } else {
        0.0
    }
}
