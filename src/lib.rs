//! Supernova neutrino moments → binned fluences for a detector simulator,
//! and the simulator's per-channel events → ensemble detection summaries.

pub mod analysis;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod flux;
pub mod pipeline;
pub mod report;
pub mod simulator;

pub use config::{AnalysisConfig, DataPaths};
pub use error::{PipelineError, Result};
