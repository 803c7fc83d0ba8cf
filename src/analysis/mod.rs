/// Detector-simulator output → per-mass tables → ensemble summaries.
///
/// ```text
///  *_events_smeared.dat (one per channel and time bin)
///        │
///        ▼
///   ┌─────────────┐
///   │  channels    │  channel counts → group counts, Total, mean energy
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  mass_table  │  one row per time bin for each progenitor mass
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  summary     │  fixed and cumulative time windows over the ensemble
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │  export      │  Arrow batch / parquet, long format
///   └─────────────┘
/// ```

pub mod channels;
pub mod export;
pub mod mass_table;
pub mod summary;
