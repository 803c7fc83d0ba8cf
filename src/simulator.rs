use std::path::PathBuf;
use std::process::Command;

use log::{debug, info};

use crate::config::SimulatorConfig;
use crate::error::{PipelineError, Result};
use crate::flux::writer::{FluxFileSet, KeyRow};

/// External detector-response program, run once per flux file.
///
/// Invoked as `<program> <flux stem> <channel file> <detector>` inside
/// `workdir`. The program reads `fluxes/<stem>.dat` and writes its event
/// files under `out/`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSimulator {
    pub program: PathBuf,
    pub workdir: PathBuf,
}

impl DetectorSimulator {
    pub fn new(config: &SimulatorConfig) -> Self {
        DetectorSimulator {
            program: config.program.clone(),
            workdir: config.workdir.clone(),
        }
    }

    pub fn run(&self, flux_stem: &str, channel_file: &str, detector: &str) -> Result<()> {
        debug!("{} {flux_stem} {channel_file} {detector}", self.program.display());
        let status = Command::new(&self.program)
            .args([flux_stem, channel_file, detector])
            .current_dir(&self.workdir)
            .status()
            .map_err(|e| PipelineError::io(&self.program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::SimulatorFailed {
                flux: flux_stem.to_string(),
                status: status.to_string(),
            })
        }
    }

    /// Run every time bin of one model, stopping at the first failure.
    pub fn run_model(
        &self,
        files: &FluxFileSet,
        key: &[KeyRow],
        channel_file: &str,
        detector: &str,
    ) -> Result<()> {
        for row in key {
            self.run(&files.stem(row.index), channel_file, detector)?;
        }
        info!(
            "Simulated {} time bins of m{} with {detector}",
            key.len(),
            files.mass
        );
        Ok(())
    }
}
