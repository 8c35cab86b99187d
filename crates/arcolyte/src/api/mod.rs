//! Safe Rust API over the query engine.
//!
//! Handles here are ordinary owned values: dropping (or `close`-ing) one frees
//! it, and fallible operations return [`ApiError`] with a numeric code. The C
//! ABI in [`crate::ffi`] boxes these types and turns errors into sentinels.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use arcolyte::api::{Context, ApiError};
//!
//! let ctx = Context::open()?;
//! ctx.register_parquet("trips.parquet", "trips")?;
//!
//! let rs = ctx.sql("SELECT fare FROM trips WHERE distance > 10")?;
//! let top = rs.limit(100)?;
//! println!("{} rows", top.count()?);
//!
//! // Column 0 as a C Data Interface pair, owned by the receiver
//! let pair = top.collect_vector(0)?;
//! ```
//!
//! See [`codes`](crate::api::codes) for the full list of error codes.

mod context;
mod error;
mod loaded_file;
mod result_set;

pub use context::{Context, SourceKind};
pub use error::{codes, ApiError};
pub use loaded_file::LoadedFile;
pub use result_set::ResultSet;
