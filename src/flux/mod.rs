/// Simulation moments → fluence tables → detector-simulator input files.
///
/// ```text
///  MomentSeries (time, L, ⟨E⟩, E_rms per flavor)
///        │
///        ▼
///   ┌─────────────┐
///   │ interpolate  │  edge-exact linear interpolation
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  binning     │  bin-local slices pinned to the bin edges
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  spectrum    │  pinched φ(E) → flux per energy bin
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  fluence     │  trapezoid over each bin → FluenceTable
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  writer      │  key table + one flux file per time bin
///   └─────────────┘
/// ```

pub mod binning;
pub mod fluence;
pub mod interpolate;
pub mod spectrum;
pub mod writer;
