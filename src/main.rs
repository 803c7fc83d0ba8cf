use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use log::{error, info};

use snowflux::config::{AnalysisConfig, DataPaths, DATA_ENV};
use snowflux::pipeline::{
    analyze_mass, build_report, convert_model, for_each_mass, report_path, select_model_sets,
    simulate_model, summarize_model_set,
};
use snowflux::report::write_report;

#[derive(Parser)]
#[command(name = "snowflux")]
#[command(about = "Supernova neutrino fluences in, detector summaries out", long_about = None)]
struct Cli {
    /// Data root holding moments/, fluxes/, out/ and the result tables
    #[arg(long, value_name = "DIR", env = DATA_ENV)]
    data_dir: Option<PathBuf>,

    /// Config JSON file (defaults to <data-dir>/snowflux.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model sets to process (default: all configured)
    #[arg(short, long = "set", value_name = "LABEL")]
    sets: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert simulation moments into flux files
    Fluxes,
    /// Run the detector simulator on every flux file
    Simulate {
        #[arg(short, long)]
        detector: String,
    },
    /// Aggregate detector output into per-mass tables
    Analyze {
        #[arg(short, long)]
        detector: String,
    },
    /// Time-integrate the per-mass tables of each model set
    Summarize {
        #[arg(short, long)]
        detector: String,
    },
    /// Collect summaries into a JSON report
    Report {
        #[arg(short, long)]
        detector: String,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let paths = DataPaths::resolve(cli.data_dir)?;
    let config_path = cli.config.unwrap_or_else(|| paths.config());
    let config = AnalysisConfig::from_file(&config_path)?;
    let sets = select_model_sets(&config, &cli.sets)?;
    info!(
        "Loaded {} ({} masses, {} model sets)",
        config_path.display(),
        config.masses.len(),
        sets.len()
    );

    let mut failed = 0;
    match &cli.command {
        Commands::Fluxes => {
            for set in &sets {
                failed += for_each_mass(&config.masses, |mass| {
                    convert_model(&config, &paths, set, mass).map(|_| ())
                });
            }
        }
        Commands::Simulate { detector } => {
            config.simulator()?;
            for set in &sets {
                failed += for_each_mass(&config.masses, |mass| {
                    simulate_model(&config, &paths, set, mass, detector)
                });
            }
        }
        Commands::Analyze { detector } => {
            config.detector(detector)?;
            for set in &sets {
                failed += for_each_mass(&config.masses, |mass| {
                    analyze_mass(&config, &paths, set, mass, detector).map(|_| ())
                });
            }
        }
        Commands::Summarize { detector } => {
            config.detector(detector)?;
            for set in &sets {
                if let Err(e) = summarize_model_set(&config, &paths, set, detector) {
                    error!("{}: {e:#}", set.label);
                    failed += 1;
                }
            }
        }
        Commands::Report { detector } => {
            config.detector(detector)?;
            let report = build_report(&config, &paths, &sets, detector)?;
            let path = report_path(&paths, detector, config.summary.n_bins);
            write_report(&path, &report)?;
            info!("Wrote {}", path.display());
        }
    }

    if failed > 0 {
        bail!("{failed} run(s) failed; see the log above");
    }
    Ok(())
}
