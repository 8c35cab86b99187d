//! C ABI for arcolyte.
//!
//! This module provides `extern "C"` functions for driving the engine from C
//! and any language with C FFI support, exchanging columns through the Arrow
//! C Data Interface.
//!
//! # Design
//!
//! - **Opaque handles**: C sees pointers, not struct layouts
//! - **Explicit memory management**: every handle has one `*_destroy()`
//! - **Sentinels**: NULL handles, NULL pairs, `-1` counts or `ARCOLYTE_ERR_*`
//!   status codes signal failure
//! - **Thread-local errors**: `arcolyte_last_error_message()` copies out the
//!   message of the calling thread's most recent failure
//! - **No unwinding**: panics are caught and reported as internal errors
//!
//! # Example (C)
//!
//! ```c
//! #include "arcolyte.h"
//!
//! int main() {
//!     ArcolyteContext* ctx = arcolyte_context_create();
//!     if (arcolyte_context_register_csv(ctx, "t.csv", "t") != ARCOLYTE_OK) {
//!         char msg[256];
//!         arcolyte_last_error_message(msg, sizeof msg);
//!         fprintf(stderr, "%s\n", msg);
//!     }
//!
//!     ArcolyteResultSet* rs = arcolyte_context_execute_sql(ctx, "SELECT * FROM t");
//!     ArcolyteResultSet* top = arcolyte_result_limit(rs, 100);
//!     printf("%lld rows\n", (long long)arcolyte_result_collect_count(top));
//!
//!     arcolyte_result_destroy(top);
//!     arcolyte_result_destroy(rs);
//!     arcolyte_context_destroy(ctx);
//! }
//! ```

mod arrow_ffi;
mod callback;
mod context;
mod error;
mod file;
mod handle;
mod library;
mod result;

pub use arrow_ffi::*;
pub use callback::*;
pub use context::*;
pub use error::*;
pub use file::*;
pub use handle::{
    arcolyte_live_handles, ARCOLYTE_HANDLE_CONTEXT, ARCOLYTE_HANDLE_LOADED_FILE,
    ARCOLYTE_HANDLE_RESULT_SET,
};
pub use library::*;
pub use result::*;
