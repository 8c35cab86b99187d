//! Eagerly loaded CSV files.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, RecordBatch};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{Field, SchemaRef};
use arrow::error::ArrowError;
use arrow::util::pretty::pretty_format_batches;
use tracing::{debug, warn};

use super::error::ApiError;
use super::result_set::concat_column;
use crate::config::ArcolyteConfig;
use crate::interchange::{export_array, InterchangePair};

/// A CSV file parsed fully into memory, independent of any context.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl LoadedFile {
    /// Load a CSV file with settings from the environment.
    ///
    /// When `print_rows` is non-zero, that many leading rows are written to
    /// the log at `debug` level.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the file is missing or cannot be parsed.
    pub fn load_csv(path: &str, print_rows: usize) -> Result<Self, ApiError> {
        Self::load_csv_with_config(path, print_rows, &ArcolyteConfig::from_env())
    }

    /// Load a CSV file with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the file is missing or cannot be parsed.
    pub fn load_csv_with_config(
        path: &str,
        print_rows: usize,
        config: &ArcolyteConfig,
    ) -> Result<Self, ApiError> {
        if !Path::new(path).is_file() {
            return Err(ApiError::source_not_found(path));
        }
        let mut file = File::open(path)?;
        let format = Format::default()
            .with_header(config.csv_has_header)
            .with_delimiter(config.csv_delimiter);
        let (schema, _) = format.infer_schema(&mut file, Some(config.csv_schema_infer_rows))?;
        file.seek(SeekFrom::Start(0))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_header(config.csv_has_header)
            .with_delimiter(config.csv_delimiter)
            .with_batch_size(config.batch_size)
            .build(file)?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;

        let loaded = Self { schema, batches };
        debug!(
            path,
            rows = loaded.num_rows(),
            columns = loaded.num_columns(),
            "loaded csv file"
        );
        if print_rows > 0 {
            match loaded.preview(print_rows) {
                Ok(table) => debug!(path, "preview:\n{table}"),
                Err(e) => warn!(path, error = %e, "could not format csv preview"),
            }
        }
        Ok(loaded)
    }

    /// Schema inferred from the file.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Parsed batches.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total row count.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column count.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// Column `index` as one array.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if `index` is out of range.
    pub fn column(&self, index: usize) -> Result<(Field, ArrayRef), ApiError> {
        concat_column(&self.schema, &self.batches, index)
    }

    /// Export column `index` as an interchange pair.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if `index` is out of range or the column type
    /// cannot be exported.
    pub fn collect_vector(&self, index: usize) -> Result<InterchangePair, ApiError> {
        let (field, array) = self.column(index)?;
        let (schema, array) = export_array(&field, &array.to_data())?;
        Ok(InterchangePair::new(schema, array))
    }

    /// The first `rows` rows rendered as a text table.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if a column cannot be formatted.
    pub fn preview(&self, rows: usize) -> Result<String, ApiError> {
        let mut remaining = rows;
        let mut preview = Vec::new();
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.num_rows());
            preview.push(batch.slice(0, take));
            remaining -= take;
        }
        if preview.is_empty() {
            return Ok(String::new());
        }
        Ok(pretty_format_batches(&preview)?.to_string())
    }
}
