//! Lazily evaluated query results.

use std::fmt;
use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef, RecordBatch};
use arrow::compute::concat;
use arrow::datatypes::{Field, Schema};
use datafusion::dataframe::DataFrame;
use tracing::debug;

use super::context::Engine;
use super::error::ApiError;
use crate::interchange::{export_array, export_schema, ArrowSchema, InterchangePair};

/// A planned query whose rows are produced on demand.
///
/// Every collecting call re-executes the plan. Transformations such as
/// [`limit`](Self::limit) return a new result set and leave this one intact.
pub struct ResultSet {
    frame: DataFrame,
    engine: Arc<Engine>,
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.num_columns())
            .finish_non_exhaustive()
    }
}

impl ResultSet {
    pub(crate) fn new(frame: DataFrame, engine: Arc<Engine>) -> Self {
        Self { frame, engine }
    }

    /// Restrict to at most `n` rows.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the limit cannot be planned.
    pub fn limit(&self, n: usize) -> Result<Self, ApiError> {
        let frame = self.frame.clone().limit(0, Some(n))?;
        Ok(Self::new(frame, Arc::clone(&self.engine)))
    }

    /// Execute and count the rows.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if execution fails.
    pub fn count(&self) -> Result<usize, ApiError> {
        let frame = self.frame.clone();
        self.engine
            .block_on(async move { frame.count().await.map_err(ApiError::from) })
    }

    /// Execute and collect every batch.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if execution fails.
    pub fn collect(&self) -> Result<Vec<RecordBatch>, ApiError> {
        let frame = self.frame.clone();
        let batches = self
            .engine
            .block_on(async move { frame.collect().await.map_err(ApiError::from) })?;
        debug!(batches = batches.len(), "collected result set");
        Ok(batches)
    }

    /// Output schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.frame.schema().as_arrow().clone()
    }

    /// Number of output columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.frame.schema().fields().len()
    }

    /// Execute and materialize column `index` as one array.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if `index` is out of range or execution fails.
    pub fn column(&self, index: usize) -> Result<(Field, ArrayRef), ApiError> {
        let schema = self.schema();
        if index >= schema.fields().len() {
            return Err(ApiError::index_out_of_range(index, schema.fields().len()));
        }
        concat_column(&schema, &self.collect()?, index)
    }

    /// Execute and export column `index` as an interchange pair.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if `index` is out of range, execution fails or the
    /// column type cannot be exported.
    pub fn collect_vector(&self, index: usize) -> Result<InterchangePair, ApiError> {
        let (field, array) = self.column(index)?;
        let (schema, array) = export_array(&field, &array.to_data())?;
        Ok(InterchangePair::new(schema, array))
    }

    /// Export the output schema as a struct-typed `ArrowSchema`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if a column type cannot be exported.
    pub fn export_schema(&self) -> Result<ArrowSchema, ApiError> {
        export_schema(&self.schema())
    }
}

/// Concatenate column `index` of `batches` into a single array.
///
/// With no batches the result is an empty array of the schema's type.
pub(super) fn concat_column(
    schema: &Schema,
    batches: &[RecordBatch],
    index: usize,
) -> Result<(Field, ArrayRef), ApiError> {
    let Some(field) = schema.fields().get(index) else {
        return Err(ApiError::index_out_of_range(index, schema.fields().len()));
    };
    // Execution may refine nullability; the batches describe what was produced.
    let field = batches
        .first()
        .map_or_else(|| field.as_ref().clone(), |b| b.schema().field(index).clone());

    let array = match batches {
        [] => new_empty_array(field.data_type()),
        [only] => Arc::clone(only.column(index)),
        _ => {
            let columns: Vec<&dyn Array> =
                batches.iter().map(|b| b.column(index).as_ref()).collect();
            concat(&columns)?
        }
    };
    Ok((field, array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{codes, Context};
    use crate::config::ArcolyteConfig;
    use arrow::array::Int64Array;
    use arrow::datatypes::DataType;

    fn context() -> Context {
        Context::open_with_config(
            ArcolyteConfig::default()
                .with_engine_threads(2)
                .with_batch_size(2),
        )
        .unwrap()
    }

    const SERIES: &str = "SELECT * FROM (VALUES (1, 'a'), (2, 'b'), (3, NULL), (4, 'd'), (5, 'e')) AS t(n, s)";

    #[test]
    fn test_limit_and_count() {
        let ctx = context();
        let rs = ctx.sql(SERIES).unwrap();
        assert_eq!(rs.count().unwrap(), 5);
        assert_eq!(rs.limit(3).unwrap().count().unwrap(), 3);
        assert_eq!(rs.limit(100).unwrap().count().unwrap(), 5);
        assert_eq!(rs.limit(0).unwrap().count().unwrap(), 0);
        // input is untouched by limit
        assert_eq!(rs.count().unwrap(), 5);
    }

    #[test]
    fn test_column_concatenates_batches() {
        let ctx = context();
        let rs = ctx.sql(SERIES).unwrap();
        let (field, array) = rs.column(0).unwrap();
        assert_eq!(field.name(), "n");
        assert_eq!(array.len(), 5);
        let values = array.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(values.iter().flatten().sum::<i64>(), 15);

        let (_, strings) = rs.column(1).unwrap();
        assert_eq!(strings.null_count(), 1);
    }

    #[test]
    fn test_column_out_of_range() {
        let ctx = context();
        let rs = ctx.sql(SERIES).unwrap();
        assert_eq!(rs.num_columns(), 2);
        let err = rs.column(2).unwrap_err();
        assert_eq!(err.code(), codes::INDEX_OUT_OF_RANGE);
    }

    #[test]
    fn test_empty_result_column() {
        let ctx = context();
        let rs = ctx.sql(SERIES).unwrap().limit(0).unwrap();
        let (_, array) = rs.column(0).unwrap();
        assert!(array.is_empty());
        assert_eq!(array.data_type(), &DataType::Int64);
    }

    #[test]
    fn test_collect_vector_and_schema() {
        let ctx = context();
        let rs = ctx.sql(SERIES).unwrap();
        let pair = rs.collect_vector(1).unwrap();
        // SAFETY: pair is live and produced by collect_vector
        unsafe {
            assert_eq!((*pair.schema).name(), Some("s"));
            assert_eq!((*pair.array).len(), 5);
            assert!((*pair.schema).children.is_null());
            assert!((*pair.array).children.is_null());
            pair.destroy();
        }

        let schema = rs.export_schema().unwrap();
        assert_eq!(schema.format(), Some("+s"));
        assert_eq!(schema.n_children, 2);
    }
}
