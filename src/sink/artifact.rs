// src/sink/artifact.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::table::WideTable;

/// Write the assembled table as a flat CSV: Country, Year, then the
/// table's data columns in their selected order. One batch, one file.
pub fn write_csv(table: &WideTable, path: &Path) -> Result<()> {
    let mut fields = vec![
        Field::new("Country", DataType::Utf8, false),
        Field::new("Year", DataType::Int64, false),
    ];
    for column in table.columns() {
        fields.push(Field::new(column, DataType::Float64, true));
    }
    let schema = Arc::new(Schema::new(fields));

    let mut countries: Vec<&str> = Vec::with_capacity(table.len());
    let mut years: Vec<i64> = Vec::with_capacity(table.len());
    let mut data: Vec<Vec<Option<f64>>> =
        vec![Vec::with_capacity(table.len()); table.columns().len()];

    for ((country, year), row) in table.iter_rows() {
        countries.push(country.as_str());
        years.push(i64::from(*year));
        for (slot, column) in data.iter_mut().zip(table.columns()) {
            slot.push(row.get(column).copied());
        }
    }

    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(countries)),
        Arc::new(Int64Array::from(years)),
    ];
    for values in data {
        arrays.push(Arc::new(Float64Array::from(values)));
    }

    let batch = RecordBatch::try_new(schema, arrays).context("building output record batch")?;
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch).context("writing CSV artifact")?;

    info!(path = %path.display(), rows = table.len(), "artifact written");
    Ok(())
}
