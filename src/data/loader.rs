use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use arrow::array::{Array, ArrayRef, Float32Array, Float64Array};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};

use super::model::{Flavor, MomentSeries, Moments, PerFlavor};
use super::text::read_table;

// ---------------------------------------------------------------------------
// MomentRecord – one simulation timestep
// ---------------------------------------------------------------------------

/// Column names shared by every supported format, in [`MomentRecord::to_row`] order.
pub const MOMENT_COLUMNS: [&str; 10] = [
    "time", "lum_e", "lum_a", "lum_x", "avg_e", "avg_a", "avg_x", "rms_e", "rms_a", "rms_x",
];

/// One timestep of simulation output. Time in s, luminosities in GeV/s,
/// energies in GeV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentRecord {
    pub time: f64,
    pub lum_e: f64,
    pub lum_a: f64,
    pub lum_x: f64,
    pub avg_e: f64,
    pub avg_a: f64,
    pub avg_x: f64,
    pub rms_e: f64,
    pub rms_a: f64,
    pub rms_x: f64,
}

impl MomentRecord {
    pub fn from_row(v: [f64; 10]) -> Self {
        let [time, lum_e, lum_a, lum_x, avg_e, avg_a, avg_x, rms_e, rms_a, rms_x] = v;
        MomentRecord { time, lum_e, lum_a, lum_x, avg_e, avg_a, avg_x, rms_e, rms_a, rms_x }
    }

    pub fn to_row(&self) -> [f64; 10] {
        [
            self.time, self.lum_e, self.lum_a, self.lum_x, self.avg_e, self.avg_a, self.avg_x,
            self.rms_e, self.rms_a, self.rms_x,
        ]
    }

    pub fn sample(&self) -> PerFlavor<Moments> {
        PerFlavor::from_fn(|flavor| match flavor {
            Flavor::Electron => Moments { lum: self.lum_e, avg: self.avg_e, rms: self.rms_e },
            Flavor::AntiElectron => Moments { lum: self.lum_a, avg: self.avg_a, rms: self.rms_a },
            Flavor::HeavyLepton => Moments { lum: self.lum_x, avg: self.avg_x, rms: self.rms_x },
        })
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load simulation moments from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – flat Float64/Float32 columns named as in [`MOMENT_COLUMNS`]
/// * `.json`    – `[{ "time": 0.0, "lum_e": ..., ... }, ...]`
/// * `.csv`     – header row with the same column names
/// * `.dat`     – whitespace-delimited with a header row
pub fn load_moments(path: &Path) -> Result<MomentSeries> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let records = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        "dat" | "txt" => load_dat(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading moments from {}", path.display()))?;

    into_series(&records).with_context(|| format!("validating moments from {}", path.display()))
}

/// Build a validated series from records in file order.
pub fn into_series(records: &[MomentRecord]) -> Result<MomentSeries> {
    if records.is_empty() {
        bail!("no timesteps");
    }
    let time = records.iter().map(|r| r.time).collect();
    let samples = records.iter().map(MomentRecord::sample).collect();
    Ok(MomentSeries::new(time, samples)?)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<Vec<MomentRecord>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    serde_json::from_str(&text).context("parsing JSON moment records")
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<MomentRecord>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    reader
        .deserialize()
        .enumerate()
        .map(|(row_no, result)| result.with_context(|| format!("CSV row {row_no}")))
        .collect()
}

// ---------------------------------------------------------------------------
// Whitespace table loader
// ---------------------------------------------------------------------------

fn load_dat(path: &Path) -> Result<Vec<MomentRecord>> {
    let table = read_table(path)?;
    let indices = MOMENT_COLUMNS
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .with_context(|| format!("table missing '{name}' column"))
        })
        .collect::<Result<Vec<usize>>>()?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(row_no, row)| {
            let mut values = [0.0; 10];
            for (slot, &idx) in values.iter_mut().zip(&indices) {
                *slot = row[idx]
                    .parse::<f64>()
                    .with_context(|| format!("Row {row_no}: '{}' is not a number", row[idx]))?;
            }
            Ok(MomentRecord::from_row(values))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Vec<MomentRecord>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let columns = MOMENT_COLUMNS
            .iter()
            .map(|name| {
                let idx = schema
                    .index_of(name)
                    .map_err(|_| anyhow!("Parquet file missing '{name}' column"))?;
                extract_f64_column(batch.column(idx))
                    .with_context(|| format!("failed to read '{name}'"))
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        for row in 0..batch.num_rows() {
            let mut values = [0.0; 10];
            for (slot, column) in values.iter_mut().zip(&columns) {
                *slot = column[row];
            }
            records.push(MomentRecord::from_row(values));
        }
    }

    Ok(records)
}

/// Flat Float64 or Float32 column without nulls.
fn extract_f64_column(col: &ArrayRef) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        bail!("{} null values in numeric column", col.null_count());
    }
    if let Some(f64_arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.values().to_vec())
    } else if let Some(f32_arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.values().iter().map(|&v| v as f64).collect())
    } else {
        bail!("column type is {:?}, expected Float64 or Float32", col.data_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::tempdir;

    fn records() -> Vec<MomentRecord> {
        [0.0, 0.01, 0.02, 0.03]
            .into_iter()
            .map(|t| {
                MomentRecord::from_row([
                    t, 1e51, 2e51, 3e51, 0.010, 0.012, 0.015, 0.012, 0.0145, 0.018,
                ])
            })
            .collect()
    }

    #[test]
    fn csv_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moments.csv");
        let mut writer = csv::Writer::from_path(&path).unwrap();
        for r in records() {
            writer.serialize(r).unwrap();
        }
        writer.flush().unwrap();

        let series = load_moments(&path).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.samples()[2][Flavor::AntiElectron].lum, 2e51);
        assert_eq!(series.samples()[0][Flavor::HeavyLepton].rms, 0.018);
    }

    #[test]
    fn json_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moments.json");
        std::fs::write(&path, serde_json::to_string(&records()).unwrap()).unwrap();
        let series = load_moments(&path).unwrap();
        assert_eq!(series.time(), &[0.0, 0.01, 0.02, 0.03]);
    }

    #[test]
    fn dat_with_reordered_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moments.dat");
        let mut text = String::from("rms_x rms_a rms_e avg_x avg_a avg_e lum_x lum_a lum_e time\n");
        for r in records() {
            let mut row = r.to_row();
            row.reverse();
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            text.push_str(&cells.join(" "));
            text.push('\n');
        }
        std::fs::write(&path, text).unwrap();

        let series = load_moments(&path).unwrap();
        assert_eq!(series.samples()[1][Flavor::Electron].avg, 0.010);
        assert_eq!(series.time()[3], 0.03);
    }

    #[test]
    fn parquet_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moments.parquet");

        let fields: Vec<Field> = MOMENT_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let rows = records();
        let arrays: Vec<ArrayRef> = (0..10)
            .map(|k| {
                Arc::new(Float64Array::from(rows.iter().map(|r| r.to_row()[k]).collect::<Vec<_>>()))
                    as ArrayRef
            })
            .collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let series = load_moments(&path).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.samples()[3][Flavor::HeavyLepton].lum, 3e51);
    }

    #[test]
    fn unsorted_time_is_rejected() {
        let mut rows = records();
        rows.swap(1, 2);
        let err = into_series(&rows).unwrap_err();
        assert!(err.to_string().contains("not strictly increasing"));
    }

    #[test]
    fn unknown_extension() {
        assert!(load_moments(Path::new("moments.xlsx")).is_err());
    }
}
