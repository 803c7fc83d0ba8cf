//! Write a synthetic moments file for trying the pipeline end to end.
//!
//! Usage: `generate_sample [OUTPUT.parquet] [MASS]`

use std::sync::Arc;

use anyhow::Context;
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use snowflux::data::loader::{MomentRecord, MOMENT_COLUMNS};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Luminosity [GeV/s] with a neutronization burst for electron neutrinos
/// and a smooth accretion hump for the rest.
fn luminosity(t: f64, peak: f64, burst: bool) -> f64 {
    let accretion = peak * (t / 0.05).min(1.0) * (-t / 0.4).exp();
    if burst {
        accretion + 2.0 * peak * (-((t - 0.01) / 0.004).powi(2)).exp()
    } else {
        accretion
    }
}

fn record(t: f64, mass: f64) -> MomentRecord {
    // erg/s → GeV/s
    let peak = 5e52 * (mass / 15.0) * 624.15;
    let heat = 1.0 + 0.6 * (t / 0.5).min(1.0);
    let (avg_e, avg_a, avg_x) = (0.010 * heat, 0.013 * heat, 0.015 * heat);
    MomentRecord {
        time: t,
        lum_e: luminosity(t, peak, true),
        lum_a: luminosity(t, 0.9 * peak, false),
        lum_x: luminosity(t, 0.6 * peak, false),
        avg_e,
        avg_a,
        avg_x,
        // α ≈ 2.5, 3 and 2
        rms_e: avg_e * (4.5f64 / 3.5).sqrt(),
        rms_a: avg_a * (5.0f64 / 4.0).sqrt(),
        rms_x: avg_x * (4.0f64 / 3.0).sqrt(),
    }
}

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "sample_moments.parquet".to_string());
    let mass: f64 = match args.next() {
        Some(m) => m.parse().with_context(|| format!("bad mass '{m}'"))?,
        None => 15.0,
    };

    let mut rng = SimpleRng::new(42);

    // Irregular steps as a hydro code would take: 0.5 ms to 1.5 ms up to 1 s
    let mut records = Vec::new();
    let mut t = 0.0;
    while t <= 1.0 {
        records.push(record(t, mass));
        t += 0.0005 + 0.001 * rng.next_f64();
    }

    let columns: Vec<ArrayRef> = (0..MOMENT_COLUMNS.len())
        .map(|c| {
            let values: Vec<f64> = records.iter().map(|r| r.to_row()[c]).collect();
            Arc::new(Float64Array::from(values)) as ArrayRef
        })
        .collect();

    let schema = Arc::new(Schema::new(
        MOMENT_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));

    let batch = RecordBatch::try_new(schema.clone(), columns).context("creating record batch")?;

    if let Some(parent) = std::path::Path::new(&output_path).parent() {
        std::fs::create_dir_all(parent).context("creating output directory")?;
    }
    let file = std::fs::File::create(&output_path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    println!(
        "Wrote {} timesteps for a {mass} Msun progenitor to {output_path}",
        records.len()
    );
    Ok(())
}
