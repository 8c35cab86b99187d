//! Arrow C Data Interface structs and the ownership protocol around them.
//!
//! Every [`ArrowSchema`] and [`ArrowArray`] owns what its `release` callback
//! frees. Dropping one releases it, releasing it by hand nulls the callback so
//! a later drop is a no-op, and moving a struct out of a foreign slot leaves a
//! released struct behind. Column buffers are never copied on export, import
//! or round-trip.

mod abi;
mod export;
pub mod metadata;
mod pair;

pub use abi::{
    ArrayRelease, ArrowArray, ArrowSchema, SchemaRelease, ARROW_FLAG_DICTIONARY_ORDERED,
    ARROW_FLAG_MAP_KEYS_SORTED, ARROW_FLAG_NULLABLE,
};
pub use export::{export_array, export_column, export_schema, import_array, SchemaBuilder};
pub use pair::{export_pair, roundtrip_pair, InterchangePair};
