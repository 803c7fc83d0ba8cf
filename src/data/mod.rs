/// Data layer: core types and file formats.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv / .dat
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse moments file → MomentSeries
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    model      │  Flavor, Bins, FluenceTable, ChannelCounts, Group
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │   text    │  whitespace tables shared with the detector simulator
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod text;
