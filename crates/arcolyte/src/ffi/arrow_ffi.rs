//! Arrow C Data Interface ownership functions.
//!
//! Schemas, arrays and pairs produced by this library live in heap shells
//! owned by the caller. The caller either invokes the release callbacks and
//! then frees the shells here, or lets the destroy functions do both.
//!
//! # Usage
//!
//! ```c
//! #include "arcolyte.h"
//!
//! InterchangePair pair = arcolyte_result_collect_vector(rs, 0);
//! if (pair.array == NULL) {
//!     /* see arcolyte_last_error_message() */
//! }
//!
//! // Hand to a consumer, or hand back after use:
//! InterchangePair copy = arcolyte_pair_roundtrip(&pair);
//! arcolyte_pair_destroy(&pair);  // input was consumed, frees shells only
//! arcolyte_pair_destroy(&copy);  // releases the data
//! ```

use tracing::trace;

use crate::api::ApiError;
use crate::interchange::{roundtrip_pair, ArrowArray, ArrowSchema, InterchangePair};

use super::error::guard;

/// Release an array (if not already released) and free its shell.
///
/// # Safety
///
/// `array` must be NULL or an array shell allocated by this library that has
/// not been destroyed.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_array_destroy(array: *mut ArrowArray) {
    if !array.is_null() {
        // SAFETY: array was allocated by Box in this library
        drop(unsafe { Box::from_raw(array) });
    }
}

/// Release a schema (if not already released) and free its shell.
///
/// # Safety
///
/// `schema` must be NULL or a schema shell allocated by this library that
/// has not been destroyed.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_schema_destroy(schema: *mut ArrowSchema) {
    if !schema.is_null() {
        // SAFETY: schema was allocated by Box in this library
        drop(unsafe { Box::from_raw(schema) });
    }
}

/// Release both halves of a pair and free their shells.
///
/// The pair's pointers are set to NULL afterwards, so destroying it twice is
/// harmless.
///
/// # Safety
///
/// `pair` must be NULL or point to a pair produced by this library.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_pair_destroy(pair: *mut InterchangePair) {
    // SAFETY: pair is NULL or valid per the caller
    let Some(pair) = (unsafe { pair.as_mut() }) else {
        return;
    };
    let owned = std::mem::replace(pair, InterchangePair::null());
    trace!(?owned, "destroying interchange pair");
    // SAFETY: non-null halves were allocated by InterchangePair::new
    unsafe { owned.destroy() };
}

/// Import a pair and export it again without copying buffers.
///
/// The input's schema and array are moved out and left released; their
/// shells still belong to the caller. The returned pair owns the data.
///
/// # Returns
///
/// A new pair, or a pair of NULLs on error.
///
/// # Safety
///
/// `pair` must point to a pair whose non-null halves are valid structs from
/// a conforming producer.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_pair_roundtrip(pair: *const InterchangePair) -> InterchangePair {
    guard(InterchangePair::null(), || {
        // SAFETY: pair is NULL or valid per the caller
        let pair = unsafe { pair.as_ref() }.ok_or_else(|| ApiError::null_pointer("pair"))?;
        // SAFETY: the halves are valid per the caller
        unsafe { roundtrip_pair(pair) }
    })
}
