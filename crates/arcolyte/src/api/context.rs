//! Engine session handle.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use datafusion::prelude::{CsvReadOptions, ParquetReadOptions, SessionContext};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use super::error::ApiError;
use super::result_set::ResultSet;
use crate::config::ArcolyteConfig;

/// File formats a context can read or register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Delimited text with an optional header row.
    Csv,
    /// Apache Parquet.
    Parquet,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Parquet => f.write_str("parquet"),
        }
    }
}

/// Runtime that drives query execution for one context and its results.
#[derive(Debug)]
pub(crate) struct Engine {
    runtime: Option<Runtime>,
}

impl Engine {
    fn start(threads: usize) -> Result<Self, ApiError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name("arcolyte-engine")
            .enable_all()
            .build()
            .map_err(|e| ApiError::context(format!("Runtime error: {e}")))?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    /// Run `fut` to completion on the engine runtime, blocking the caller.
    pub(crate) fn block_on<T, F>(&self, fut: F) -> Result<T, ApiError>
    where
        T: Send,
        F: Future<Output = Result<T, ApiError>> + Send,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            return Err(ApiError::internal("engine runtime is shut down"));
        };
        if Handle::try_current().is_ok() {
            // Already inside a runtime: block on a scoped thread instead
            std::thread::scope(|s| {
                s.spawn(|| runtime.block_on(fut))
                    .join()
                    .unwrap_or_else(|_| Err(ApiError::panic("engine thread panicked")))
            })
        } else {
            runtime.block_on(fut)
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The last owner may be dropped from async code, where a blocking
        // shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// A query engine session.
///
/// Sources are registered under logical names and queried with SQL, or read
/// directly into a [`ResultSet`]. Result sets keep the engine alive on their
/// own, so they stay usable after the context is closed.
///
/// # Example
///
/// ```rust,ignore
/// use arcolyte::api::Context;
///
/// let ctx = Context::open()?;
/// ctx.register_csv("trades.csv", "trades")?;
/// let rs = ctx.sql("SELECT symbol, price FROM trades")?.limit(100)?;
/// println!("{} rows", rs.count()?);
/// ctx.close();
/// ```
pub struct Context {
    session: SessionContext,
    engine: Arc<Engine>,
    config: ArcolyteConfig,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("session_id", &self.session.session_id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Open a context with defaults overlaid by `ARCOLYTE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the engine runtime cannot be started.
    pub fn open() -> Result<Self, ApiError> {
        Self::open_with_config(ArcolyteConfig::from_env())
    }

    /// Open with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the engine runtime cannot be started.
    pub fn open_with_config(config: ArcolyteConfig) -> Result<Self, ApiError> {
        let engine = Engine::start(config.engine_threads)?;
        let session = SessionContext::new_with_config(config.session_config());
        debug!(session_id = %session.session_id(), "context opened");
        Ok(Self {
            session,
            engine: Arc::new(engine),
            config,
        })
    }

    /// The configuration this context was opened with.
    #[must_use]
    pub fn config(&self) -> &ArcolyteConfig {
        &self.config
    }

    /// Register a CSV file as table `name`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be registered.
    pub fn register_csv(&self, path: &str, name: &str) -> Result<(), ApiError> {
        self.register_source(path, name, SourceKind::Csv)
    }

    /// Register a Parquet file as table `name`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be registered.
    pub fn register_parquet(&self, path: &str, name: &str) -> Result<(), ApiError> {
        self.register_source(path, name, SourceKind::Parquet)
    }

    /// Register a file of the given kind as table `name`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be registered.
    pub fn register_source(&self, path: &str, name: &str, kind: SourceKind) -> Result<(), ApiError> {
        let extension = check_source(path)?;
        let session = &self.session;
        self.engine.block_on(async {
            let registered = match kind {
                SourceKind::Csv => {
                    session
                        .register_csv(name, path, self.csv_options(&extension))
                        .await
                }
                SourceKind::Parquet => {
                    session
                        .register_parquet(name, path, parquet_options(&extension))
                        .await
                }
            };
            registered.map_err(|e| ApiError::registration(format!("{kind} source '{name}': {e}")))
        })?;
        info!(%kind, path, name, "registered source");
        Ok(())
    }

    /// Read a CSV file into a result set.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be read.
    pub fn read_csv(&self, path: &str) -> Result<ResultSet, ApiError> {
        self.read_source(path, SourceKind::Csv)
    }

    /// Read a Parquet file into a result set.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be read.
    pub fn read_parquet(&self, path: &str) -> Result<ResultSet, ApiError> {
        self.read_source(path, SourceKind::Parquet)
    }

    /// Read a file of the given kind into a result set.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the path does not exist or cannot be read.
    pub fn read_source(&self, path: &str, kind: SourceKind) -> Result<ResultSet, ApiError> {
        let extension = check_source(path)?;
        let session = &self.session;
        let frame = self.engine.block_on(async {
            let frame = match kind {
                SourceKind::Csv => session.read_csv(path, self.csv_options(&extension)).await,
                SourceKind::Parquet => {
                    session
                        .read_parquet(path, parquet_options(&extension))
                        .await
                }
            };
            frame.map_err(ApiError::from)
        })?;
        debug!(%kind, path, "read source");
        Ok(ResultSet::new(frame, Arc::clone(&self.engine)))
    }

    /// Plan a SQL statement.
    ///
    /// Queries are executed lazily when the result set is collected; DDL
    /// statements take effect immediately.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the statement cannot be parsed or planned.
    pub fn sql(&self, sql: &str) -> Result<ResultSet, ApiError> {
        let session = &self.session;
        let frame = self
            .engine
            .block_on(async { session.sql(sql).await.map_err(ApiError::from) })?;
        Ok(ResultSet::new(frame, Arc::clone(&self.engine)))
    }

    /// Close the context.
    ///
    /// Registered tables are dropped; result sets created from this context
    /// remain valid.
    pub fn close(self) {
        debug!(session_id = %self.session.session_id(), "context closed");
    }

    fn csv_options<'a>(&self, extension: &'a str) -> CsvReadOptions<'a> {
        CsvReadOptions::new()
            .has_header(self.config.csv_has_header)
            .delimiter(self.config.csv_delimiter)
            .schema_infer_max_records(self.config.csv_schema_infer_rows)
            .file_extension(extension)
    }
}

fn parquet_options(extension: &str) -> ParquetReadOptions<'_> {
    ParquetReadOptions {
        file_extension: extension,
        ..Default::default()
    }
}

/// Fail early for missing paths and return the extension filter to scan with.
fn check_source(path: &str) -> Result<String, ApiError> {
    let path_ref = Path::new(path);
    if !path_ref.exists() {
        return Err(ApiError::source_not_found(path));
    }
    // Directories are scanned without an extension filter.
    Ok(match path_ref.extension() {
        Some(ext) if path_ref.is_file() => format!(".{}", ext.to_string_lossy()),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::codes;

    fn context() -> Context {
        Context::open_with_config(ArcolyteConfig::default().with_engine_threads(2)).unwrap()
    }

    #[test]
    fn test_open_and_close() {
        let ctx = context();
        assert_eq!(ctx.config().engine_threads, 2);
        ctx.close();
    }

    #[test]
    fn test_register_missing_path() {
        let ctx = context();
        let err = ctx
            .register_csv("/definitely/not/here.csv", "t")
            .unwrap_err();
        assert_eq!(err.code(), codes::SOURCE_NOT_FOUND);

        // context is still usable
        let rs = ctx.sql("SELECT 1 AS one").unwrap();
        assert_eq!(rs.count().unwrap(), 1);
    }

    #[test]
    fn test_read_missing_path() {
        let err = context().read_parquet("/nope.parquet").unwrap_err();
        assert_eq!(err.code(), codes::SOURCE_NOT_FOUND);
    }

    #[test]
    fn test_sql_errors() {
        let ctx = context();
        let err = ctx.sql("SELEC nonsense").unwrap_err();
        assert_eq!(err.code(), codes::SQL_PARSE_ERROR);

        let err = ctx.sql("SELECT * FROM missing_table").unwrap_err();
        assert_eq!(err.code(), codes::TABLE_NOT_FOUND);
    }

    #[test]
    fn test_block_on_inside_runtime() {
        let ctx = context();
        let outer = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let count = outer.block_on(async { ctx.sql("SELECT 1").unwrap().count().unwrap() });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_result_outlives_context() {
        let ctx = context();
        let rs = ctx
            .sql("SELECT * FROM (VALUES (1), (2), (3)) AS t(x)")
            .unwrap();
        ctx.close();
        assert_eq!(rs.count().unwrap(), 3);
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Csv.to_string(), "csv");
        assert_eq!(SourceKind::Parquet.to_string(), "parquet");
    }
}
