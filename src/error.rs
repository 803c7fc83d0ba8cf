use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PipelineError – everything a numeric stage can fail with
// ---------------------------------------------------------------------------

/// Errors raised by the pipeline stages.
///
/// Data-integrity variants are kept separate from I/O so a bad input never
/// turns into a silently zero-filled table.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing configuration: {setting} is not set. {hint}")]
    MissingConfig { setting: String, hint: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("time series is not strictly increasing at index {index}: {prev} then {next}")]
    NonMonotonic { index: usize, prev: f64, next: f64 },

    #[error("{what}: expected {expected} values, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("time {t} is outside the simulated range [{start}, {end}]")]
    OutOfRange { t: f64, start: f64, end: f64 },

    #[error("zero-width interpolation interval at t = {t}")]
    DegenerateInterval { t: f64 },

    #[error("pinch parameter undefined: mean energy {avg} equals RMS energy {rms}")]
    DegeneratePinch { avg: f64, rms: f64 },

    #[error("pinch parameter {alpha} is outside the valid range (> -1)")]
    InvalidPinch { alpha: f64 },

    #[error("mean energy {avg} must be positive when luminosity is {lum}")]
    NonPositiveEnergy { avg: f64, lum: f64 },

    #[error("mean energy {avg} must be positive")]
    NonPositiveMeanEnergy { avg: f64 },

    #[error("fluence {value} is negative")]
    NegativeFluence { value: f64 },

    #[error("non-finite {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("invalid bins: {0}")]
    InvalidBins(String),

    #[error("invalid integration window of {n_bins} bins (series has {len})")]
    InvalidWindow { n_bins: usize, len: usize },

    #[error("channel '{0}' has no counts in this snapshot")]
    UnknownChannel(String),

    #[error("missing file {} (mass {mass}, timestep {timestep}{})",
        .path.display(),
        .channel.as_deref().map(|c| format!(", channel {c}")).unwrap_or_default())]
    MissingFile {
        path: PathBuf,
        mass: String,
        timestep: usize,
        channel: Option<String>,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("detector simulator exited with {status} for {flux}")]
    SimulatorFailed { flux: String, status: String },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Turn a not-found I/O error into [`PipelineError::MissingFile`] tagged
    /// with the run it belongs to. Other errors pass through.
    pub fn into_missing_file(self, mass: &str, timestep: usize, channel: Option<&str>) -> Self {
        match self {
            PipelineError::Io { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                PipelineError::MissingFile {
                    path,
                    mass: mass.to_string(),
                    timestep,
                    channel: channel.map(str::to_string),
                }
            }
            other => other,
        }
    }

    /// True for errors caused by invalid numbers rather than the environment.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            PipelineError::NonMonotonic { .. }
                | PipelineError::LengthMismatch { .. }
                | PipelineError::OutOfRange { .. }
                | PipelineError::DegenerateInterval { .. }
                | PipelineError::DegeneratePinch { .. }
                | PipelineError::InvalidPinch { .. }
                | PipelineError::NonPositiveEnergy { .. }
                | PipelineError::NonPositiveMeanEnergy { .. }
                | PipelineError::NegativeFluence { .. }
                | PipelineError::NonFinite { .. }
                | PipelineError::InvalidBins(_)
                | PipelineError::InvalidWindow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Reject NaN and infinities produced by a computation.
pub fn ensure_finite(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PipelineError::NonFinite { what, value })
    }
}
