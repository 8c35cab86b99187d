//! Configuration for `arcolyte` contexts and the callback scheduler.

use std::num::NonZeroUsize;
use std::str::FromStr;

use datafusion::prelude::SessionConfig;
use tracing::warn;

/// Configuration for an engine [`Context`](crate::api::Context).
#[derive(Debug, Clone)]
pub struct ArcolyteConfig {
    /// Target number of rows per record batch produced by the engine.
    pub batch_size: usize,
    /// Number of partitions the planner splits scans into.
    pub target_partitions: usize,
    /// Worker threads of the runtime that drives query execution.
    pub engine_threads: usize,
    /// Whether CSV files carry a header row.
    pub csv_has_header: bool,
    /// CSV field delimiter.
    pub csv_delimiter: u8,
    /// Rows sampled when inferring a CSV schema.
    pub csv_schema_infer_rows: usize,
}

impl Default for ArcolyteConfig {
    fn default() -> Self {
        let parallelism = available_parallelism();
        Self {
            batch_size: 8192,
            target_partitions: parallelism,
            engine_threads: parallelism,
            csv_has_header: true,
            csv_delimiter: b',',
            csv_schema_infer_rows: 1000,
        }
    }
}

impl ArcolyteConfig {
    /// Defaults overlaid with `ARCOLYTE_BATCH_SIZE`, `ARCOLYTE_TARGET_PARTITIONS`
    /// and `ARCOLYTE_ENGINE_THREADS` when they are set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_var("ARCOLYTE_BATCH_SIZE") {
            config.batch_size = n;
        }
        if let Some(n) = env_var("ARCOLYTE_TARGET_PARTITIONS") {
            config.target_partitions = n;
        }
        if let Some(n) = env_var("ARCOLYTE_ENGINE_THREADS") {
            config.engine_threads = n;
        }
        config
    }

    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the planner's target partition count.
    #[must_use]
    pub fn with_target_partitions(mut self, partitions: usize) -> Self {
        self.target_partitions = partitions.max(1);
        self
    }

    /// Set the engine runtime's worker thread count.
    #[must_use]
    pub fn with_engine_threads(mut self, threads: usize) -> Self {
        self.engine_threads = threads.max(1);
        self
    }

    /// Set CSV header handling.
    #[must_use]
    pub fn with_csv_header(mut self, has_header: bool) -> Self {
        self.csv_has_header = has_header;
        self
    }

    /// Set the CSV delimiter.
    #[must_use]
    pub fn with_csv_delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    /// `DataFusion` session settings derived from this config.
    ///
    /// Parquet strings are read as plain `Utf8`/`Binary` rather than view
    /// types so exported columns use the widely supported `u`/`z` formats.
    pub(crate) fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new()
            .with_batch_size(self.batch_size.max(1))
            .with_target_partitions(self.target_partitions.max(1))
            .with_information_schema(true);
        config.options_mut().execution.parquet.schema_force_view_types = false;
        config
    }
}

/// Configuration for the callback [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker threads that run timers and callbacks.
    pub worker_threads: usize,
    /// Name given to scheduler threads.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name: "arcolyte-scheduler".into(),
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn env_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
