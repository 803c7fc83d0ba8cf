//! Stage orchestration: each function runs one stage for one model and
//! writes its output under the data root.

use anyhow::{anyhow, Context, Result};
use log::{error, info};

use crate::analysis::channels::EventFileSet;
use crate::analysis::export::{pretty_summary, write_cumulative_parquet};
use crate::analysis::mass_table::{analyze_model, mass_table_path, read_mass_table, write_mass_table, MassTable};
use crate::analysis::summary::{
    cumulative, read_summary_table, summary_path, time_integrate, write_summary_table, Cumulative,
    Ensemble, SummaryTable,
};
use crate::color::ColorMap;
use crate::config::{AnalysisConfig, DataPaths, ModelSet};
use crate::data::loader::load_moments;
use crate::error::PipelineError;
use crate::flux::fluence::fluence_table;
use crate::flux::writer::{read_key_table, write_fluxes, FluxFileSet};
use crate::report::{window_span, Report};
use crate::simulator::DetectorSimulator;

/// Model sets named on the command line, or every configured set.
pub fn select_model_sets<'a>(config: &'a AnalysisConfig, labels: &[String]) -> Result<Vec<&'a ModelSet>> {
    if labels.is_empty() {
        if config.model_sets.is_empty() {
            return Err(anyhow!("no model_sets configured"));
        }
        return Ok(config.model_sets.iter().collect());
    }
    labels
        .iter()
        .map(|label| Ok(config.model_set(label)?))
        .collect()
}

/// True when some error in the chain is invalid input data rather than a
/// missing file or an environment problem.
pub fn is_data_error(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        cause
            .downcast_ref::<PipelineError>()
            .is_some_and(PipelineError::is_data_integrity)
    })
}

/// Run `stage` for every mass, logging failures and carrying on.
///
/// Returns the number of masses that failed.
pub fn for_each_mass(masses: &[String], mut stage: impl FnMut(&str) -> Result<()>) -> usize {
    let mut failed = 0;
    for mass in masses {
        if let Err(e) = stage(mass) {
            if is_data_error(&e) {
                error!("mass {mass}: bad input data: {e:#}");
            } else {
                error!("mass {mass}: {e:#}");
            }
            failed += 1;
        }
    }
    failed
}

// ---------------------------------------------------------------------------
// Moments → flux files
// ---------------------------------------------------------------------------

pub fn flux_files(paths: &DataPaths, set: &ModelSet, mass: &str) -> FluxFileSet {
    FluxFileSet::new(paths.fluxes(), set.tab, mass)
}

pub fn convert_model(
    config: &AnalysisConfig,
    paths: &DataPaths,
    set: &ModelSet,
    mass: &str,
) -> Result<FluxFileSet> {
    let input = paths.moments_file(&set.label, mass).ok_or_else(|| {
        anyhow!(
            "no moments file {}_m{mass}.{{parquet,csv,json,dat}} under {}",
            set.label,
            paths.moments().display()
        )
    })?;
    let series = load_moments(&input)?;
    let table = fluence_table(
        &series,
        &config.time_bins.bins()?,
        &config.energy_bins.bins()?,
        config.distance_cm,
    )
    .with_context(|| format!("computing fluences from {}", input.display()))?;

    let files = flux_files(paths, set, mass);
    write_fluxes(&files, &table)?;
    Ok(files)
}

// ---------------------------------------------------------------------------
// Flux files → detector output
// ---------------------------------------------------------------------------

pub fn simulate_model(
    config: &AnalysisConfig,
    paths: &DataPaths,
    set: &ModelSet,
    mass: &str,
    detector: &str,
) -> Result<()> {
    let simulator = DetectorSimulator::new(config.simulator()?);
    let channel_file = &config.detector(detector)?.channel_file;
    let files = flux_files(paths, set, mass);
    let key = read_key_table(&files.key_path())?;
    simulator.run_model(&files, &key, channel_file, detector)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Detector output → mass tables → summaries
// ---------------------------------------------------------------------------

pub fn analyze_mass(
    config: &AnalysisConfig,
    paths: &DataPaths,
    set: &ModelSet,
    mass: &str,
    detector: &str,
) -> Result<MassTable> {
    let detector_config = config.detector(detector)?;
    let key = read_key_table(&flux_files(paths, set, mass).key_path())?;
    let events = EventFileSet::new(paths.detector_output(), set.tab, mass, detector);

    let table = analyze_model(&events, &key, detector_config, &config.detector_output)?;
    write_mass_table(&mass_table_path(&paths.mass_tables(), detector, set.tab, mass), &table)?;
    Ok(table)
}

pub fn load_ensemble(
    config: &AnalysisConfig,
    paths: &DataPaths,
    set: &ModelSet,
    detector: &str,
) -> Result<Ensemble> {
    let entries = config
        .masses
        .iter()
        .map(|mass| {
            let path = mass_table_path(&paths.mass_tables(), detector, set.tab, mass);
            let table = read_mass_table(&path)
                .with_context(|| format!("loading mass table for {} m{mass}", set.label))?;
            Ok((mass.clone(), table))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Ensemble::new(entries)?)
}

/// Fixed-window summary plus the cumulative ensemble of one model set.
#[derive(Debug, Clone)]
pub struct SetSummary {
    pub summary: SummaryTable,
    pub cumulative: Cumulative,
}

pub fn summarize_model_set(
    config: &AnalysisConfig,
    paths: &DataPaths,
    set: &ModelSet,
    detector: &str,
) -> Result<SetSummary> {
    config.detector(detector)?;
    let ensemble = load_ensemble(config, paths, set, detector)?;
    let n_bins = config.summary.n_bins;

    let (start, end) = window_span(&config.time_bins.bins()?, n_bins)?;
    info!(
        "{}: integrating {n_bins} bins, {start} s to {end} s",
        set.label
    );

    let summary = time_integrate(&ensemble, n_bins)?;
    write_summary_table(&summary_path(&paths.summaries(), detector, n_bins, set.tab), &summary)?;
    info!("{} ({detector}):\n{}", set.label, pretty_summary(&summary)?);

    let cumulative = cumulative(&ensemble, config.summary.max_n_bins())?;
    let parquet = paths
        .summaries()
        .join(format!("{detector}_cumulative_tab{}.parquet", set.tab));
    write_cumulative_parquet(&parquet, &cumulative)?;

    Ok(SetSummary { summary, cumulative })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Collect the written summaries of every selected model set.
pub fn build_report(
    config: &AnalysisConfig,
    paths: &DataPaths,
    sets: &[&ModelSet],
    detector: &str,
) -> Result<Report> {
    config.detector(detector)?;
    let n_bins = config.summary.n_bins;
    let window = window_span(&config.time_bins.bins()?, n_bins)?;
    let colors = ColorMap::for_model_sets(&config.model_sets);

    let mut report = Report::new(detector, n_bins, window);
    for set in sets {
        let path = summary_path(&paths.summaries(), detector, n_bins, set.tab);
        let summary = read_summary_table(&path, n_bins)
            .with_context(|| format!("run `summarize` for {} first", set.label))?;
        report.add_model_set(set, &colors, &summary);
    }
    Ok(report)
}

pub fn report_path(paths: &DataPaths, detector: &str, n_bins: usize) -> std::path::PathBuf {
    paths.reports().join(format!("{detector}_{n_bins}bins.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::export::read_cumulative_parquet;
    use crate::data::model::Group;
    use crate::flux::writer::read_flux_file;
    use crate::report::write_report;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    const CONFIG: &str = r##"{
        "distance_cm": 3.086e22,
        "masses": ["12.0", "20.0"],
        "model_sets": [{ "label": "LMP", "tab": 1 }],
        "time_bins": { "start": 0.0, "end": 0.02, "width": 0.005 },
        "energy_bins": { "start": 0.001, "end": 0.05, "width": 0.001 },
        "summary": { "n_bins": 3, "max_n_bins": 4 },
        "detectors": {
            "ar40kt": {
                "channel_file": "argon",
                "groups": [
                    { "name": "cc", "channels": ["nue_Ar40", "nuebar_Ar40"] },
                    { "name": "es", "channels": ["nue_e"] }
                ]
            }
        }
    }"##;

    fn write_moments(paths: &DataPaths, mass: &str, lum: f64) {
        fs::create_dir_all(paths.moments()).unwrap();
        let mut body = String::from("time,lum_e,lum_a,lum_x,avg_e,avg_a,avg_x,rms_e,rms_a,rms_x\n");
        for t in ["0.0", "0.01", "0.02", "0.03"] {
            body.push_str(&format!("{t},{lum},{lum},{lum},0.01,0.013,0.016,0.012,0.015,0.019\n"));
        }
        fs::write(paths.moments().join(format!("LMP_m{mass}.csv")), body).unwrap();
    }

    /// Stand in for the detector simulator: a small event file per channel.
    fn fake_events(paths: &DataPaths, mass: &str, n_bins: usize, scale: f64) {
        let events = EventFileSet::new(paths.detector_output(), 1, mass, "ar40kt");
        fs::create_dir_all(paths.detector_output()).unwrap();
        for i in 1..=n_bins {
            for (c, channel) in ["nue_Ar40", "nuebar_Ar40", "nue_e"].iter().enumerate() {
                let n = scale * (i + c) as f64;
                let body = format!("0.005 {n}\n0.015 {}\n---\nTotal\n", 2.0 * n);
                fs::write(events.path(i, channel), body).unwrap();
            }
        }
    }

    fn setup(root: &Path) -> (AnalysisConfig, DataPaths) {
        let config = AnalysisConfig::from_json(CONFIG).unwrap();
        let paths = DataPaths::resolve(Some(root.to_path_buf())).unwrap();
        (config, paths)
    }

    #[test]
    fn end_to_end() {
        let dir = tempdir().unwrap();
        let (config, paths) = setup(dir.path());
        let set = config.model_set("LMP").unwrap().clone();

        for (mass, lum) in [("12.0", 1e51), ("20.0", 2e51)] {
            write_moments(&paths, mass, lum);
            let files = convert_model(&config, &paths, &set, mass).unwrap();
            let key = read_key_table(&files.key_path()).unwrap();
            assert_eq!(key.len(), 4);

            let flux = read_flux_file(&files.flux_path(1)).unwrap();
            assert_eq!(flux.energies.len(), 49);
            assert!(flux.fluxes.iter().flatten().all(|v| v.is_finite() && *v >= 0.0));
        }

        fake_events(&paths, "12.0", 4, 1.0);
        fake_events(&paths, "20.0", 4, 0.5);
        let failed = for_each_mass(&config.masses, |mass| {
            let table = analyze_mass(&config, &paths, &set, mass, "ar40kt")?;
            for row in table.rows() {
                assert_eq!(row.stats[0].total, row.stats[1].total + row.stats[2].total);
            }
            Ok(())
        });
        assert_eq!(failed, 0);

        let result = summarize_model_set(&config, &paths, &set, "ar40kt").unwrap();
        assert_eq!(result.summary.rows.len(), 2);
        assert_eq!(result.summary.groups[0], Group::Total);
        assert_eq!(result.cumulative.max_n_bins(), 4);
        assert_eq!(result.cumulative.window(3).unwrap(), &result.summary);
        assert!(summary_path(&paths.summaries(), "ar40kt", 3, 1).is_file());

        let records =
            read_cumulative_parquet(&paths.summaries().join("ar40kt_cumulative_tab1.parquet")).unwrap();
        assert_eq!(records.len(), 4 * 2 * 3);

        let report = build_report(&config, &paths, &[&set], "ar40kt").unwrap();
        assert_eq!(report.window.0, 0.0);
        assert_eq!(report.model_sets[0].masses.len(), 2);
        let fractions = &report.model_sets[0].fractions;
        assert!((fractions["cc"] + fractions["es"] - 1.0).abs() < 1e-12);
        write_report(&report_path(&paths, "ar40kt", 3), &report).unwrap();
    }

    #[test]
    fn failures_are_per_mass() {
        let dir = tempdir().unwrap();
        let (config, paths) = setup(dir.path());
        let set = config.model_set("LMP").unwrap().clone();
        write_moments(&paths, "12.0", 1e51);

        let mut converted = Vec::new();
        let failed = for_each_mass(&config.masses, |mass| {
            convert_model(&config, &paths, &set, mass)?;
            converted.push(mass.to_string());
            Ok(())
        });
        assert_eq!(failed, 1);
        assert_eq!(converted, ["12.0"]);

        // analysis of the converted mass stops at its first missing event file
        let err = analyze_mass(&config, &paths, &set, "12.0", "ar40kt").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingFile { timestep: 1, .. })
        ));
    }

    #[test]
    fn data_errors_are_told_apart() {
        let bad = anyhow::Error::new(PipelineError::NegativeFluence { value: -1.0 })
            .context("converting 12.0");
        assert!(is_data_error(&bad));

        let missing = anyhow::Error::new(PipelineError::MissingFile {
            path: "out/x.dat".into(),
            mass: "12.0".into(),
            timestep: 1,
            channel: None,
        });
        assert!(!is_data_error(&missing));
        assert!(!is_data_error(&anyhow!("plain failure")));
    }

    #[test]
    fn unknown_detector_is_a_config_error() {
        let dir = tempdir().unwrap();
        let (config, paths) = setup(dir.path());
        let set = config.model_set("LMP").unwrap().clone();

        let err = summarize_model_set(&config, &paths, &set, "nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingConfig { .. })
        ));
        let err = build_report(&config, &paths, &[&set], "nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingConfig { .. })
        ));
    }

    #[test]
    fn model_set_selection() {
        let config = AnalysisConfig::from_json(CONFIG).unwrap();
        assert_eq!(select_model_sets(&config, &[]).unwrap().len(), 1);
        assert!(select_model_sets(&config, &["SNA".into()]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn simulate_requires_configured_program() {
        let dir = tempdir().unwrap();
        let (mut config, paths) = setup(dir.path());
        let set = config.model_set("LMP").unwrap().clone();
        write_moments(&paths, "12.0", 1e51);
        convert_model(&config, &paths, &set, "12.0").unwrap();

        assert!(simulate_model(&config, &paths, &set, "12.0", "ar40kt").is_err());

        config.simulator = Some(crate::config::SimulatorConfig {
            program: "true".into(),
            workdir: dir.path().to_path_buf(),
        });
        simulate_model(&config, &paths, &set, "12.0", "ar40kt").unwrap();
    }
}
