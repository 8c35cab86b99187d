//! Arrow C Data Interface boundary over a `DataFusion` query engine.
//!
//! A foreign caller creates an engine [`Context`](api::Context), registers or
//! reads CSV and Parquet files, runs SQL, and collects columns as
//! [`InterchangePair`](interchange::InterchangePair)s whose buffers it then
//! owns. Nothing is copied on the way out. Failures surface as sentinels with
//! the message kept in a thread-local error channel, and one-shot delayed
//! callbacks return values asynchronously.
//!
//! - [`api`]: safe Rust handles returning `Result<_, ApiError>`
//! - [`interchange`]: `#[repr(C)]` schema/array structs and their release
//!   protocol
//! - [`scheduler`]: delayed one-shot tasks
//! - [`ffi`]: the `extern "C"` surface
//!
//! # Example
//!
//! ```rust,ignore
//! use arcolyte::api::Context;
//!
//! let ctx = Context::open()?;
//! let rs = ctx.read_csv("t.csv")?.limit(100)?;
//! assert!(rs.count()? <= 100);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
mod config;
pub mod ffi;
pub mod interchange;
mod logging;
pub mod scheduler;

pub use config::{ArcolyteConfig, SchedulerConfig};
pub use logging::{init as init_logging, LOG_ENV};
