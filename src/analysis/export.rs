use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use super::summary::{Cumulative, SummaryTable};

// ---------------------------------------------------------------------------
// Long-format records: one row per (window, mass, group)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleRecord {
    pub n_bins: i64,
    pub mass: String,
    pub group: String,
    pub total: f64,
    pub mean_energy: f64,
}

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("n_bins", DataType::Int64, false),
        Field::new("mass", DataType::Utf8, false),
        Field::new("group", DataType::Utf8, false),
        Field::new("total", DataType::Float64, false),
        Field::new("mean_energy", DataType::Float64, false),
    ]))
}

/// Flatten summary tables into one Arrow batch.
pub fn summary_batch<'a>(tables: impl IntoIterator<Item = &'a SummaryTable>) -> Result<RecordBatch> {
    let mut n_bins = Vec::new();
    let mut mass = Vec::new();
    let mut group = Vec::new();
    let mut total = Vec::new();
    let mut mean_energy = Vec::new();

    for table in tables {
        for row in &table.rows {
            for (g, stats) in table.groups.iter().zip(&row.stats) {
                n_bins.push(table.n_bins as i64);
                mass.push(row.mass.as_str());
                group.push(g.name());
                total.push(stats.total);
                mean_energy.push(stats.mean_energy);
            }
        }
    }

    RecordBatch::try_new(
        schema(),
        vec![
            Arc::new(Int64Array::from(n_bins)),
            Arc::new(StringArray::from(mass)),
            Arc::new(StringArray::from(group)),
            Arc::new(Float64Array::from(total)),
            Arc::new(Float64Array::from(mean_energy)),
        ],
    )
    .context("building summary record batch")
}

/// Render a summary as an ASCII table for the log.
pub fn pretty_summary(table: &SummaryTable) -> Result<String> {
    let batch = summary_batch([table])?;
    Ok(pretty_format_batches(&[batch])
        .context("formatting summary")?
        .to_string())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Write every window of a cumulative summary to one parquet file.
pub fn write_cumulative_parquet(path: &Path, cumulative: &Cumulative) -> Result<()> {
    let batch = summary_batch(cumulative.windows())?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

pub fn read_cumulative_parquet(path: &Path) -> Result<Vec<EnsembleRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.context("reading parquet record batch")?;
        let n_bins = column::<Int64Array>(&batch, "n_bins")?;
        let mass = column::<StringArray>(&batch, "mass")?;
        let group = column::<StringArray>(&batch, "group")?;
        let total = column::<Float64Array>(&batch, "total")?;
        let mean_energy = column::<Float64Array>(&batch, "mean_energy")?;

        for i in 0..batch.num_rows() {
            records.push(EnsembleRecord {
                n_bins: n_bins.value(i),
                mass: mass.value(i).to_string(),
                group: group.value(i).to_string(),
                total: total.value(i),
                mean_energy: mean_energy.value(i),
            });
        }
    }
    Ok(records)
}

fn column<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column '{name}' not found"))?
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| anyhow!("column '{name}' has unexpected type"))
}
