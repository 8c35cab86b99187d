//! FFI result set functions.

use std::ptr;

use crate::api::{ApiError, ResultSet};
use crate::interchange::{ArrowSchema, InterchangePair};

use super::error::{guard, guard_status};
use super::handle::{borrow, from_raw, into_raw, Handle, ARCOLYTE_HANDLE_RESULT_SET};

/// Opaque result set handle for FFI.
///
/// Returned by the read and SQL functions and by `arcolyte_result_limit()`;
/// free with `arcolyte_result_destroy()`.
#[repr(C)]
pub struct ArcolyteResultSet {
    pub(crate) inner: ResultSet,
}

impl Handle for ArcolyteResultSet {
    const KIND: i32 = ARCOLYTE_HANDLE_RESULT_SET;
    const NAME: &'static str = "result set";
}

pub(crate) fn column_index(index: i64) -> Result<usize, ApiError> {
    usize::try_from(index)
        .map_err(|_| ApiError::invalid_argument(format!("negative column index {index}")))
}

/// Restrict a result set to at most `n` rows.
///
/// `rs` is left intact; both handles must be destroyed.
///
/// # Returns
///
/// A new result set handle, or NULL on error.
///
/// # Safety
///
/// `rs` must be a valid result set handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_limit(
    rs: *mut ArcolyteResultSet,
    n: i64,
) -> *mut ArcolyteResultSet {
    guard(ptr::null_mut(), || {
        // SAFETY: rs is a valid handle per the caller
        let rs = unsafe { borrow(rs) }?;
        let n = usize::try_from(n)
            .map_err(|_| ApiError::invalid_argument(format!("negative limit {n}")))?;
        let inner = rs.inner.limit(n)?;
        Ok(into_raw(ArcolyteResultSet { inner }))
    })
}

/// Execute the result set and count its rows.
///
/// # Returns
///
/// The row count, or -1 on error.
///
/// # Safety
///
/// `rs` must be a valid result set handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_collect_count(rs: *mut ArcolyteResultSet) -> i64 {
    guard(-1, || {
        // SAFETY: rs is a valid handle per the caller
        let count = unsafe { borrow(rs) }?.inner.count()?;
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    })
}

/// Number of output columns.
///
/// # Returns
///
/// The column count, or -1 on error.
///
/// # Safety
///
/// `rs` must be a valid result set handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_column_count(rs: *mut ArcolyteResultSet) -> i64 {
    guard(-1, || {
        // SAFETY: rs is a valid handle per the caller
        let n = unsafe { borrow(rs) }?.inner.num_columns();
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    })
}

/// Execute the result set and export column `index` as one array.
///
/// # Returns
///
/// A pair owned by the caller (release both halves, or pass the pair to
/// `arcolyte_pair_destroy()`), or a pair of NULLs on error.
///
/// # Safety
///
/// `rs` must be a valid result set handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_collect_vector(
    rs: *mut ArcolyteResultSet,
    index: i64,
) -> InterchangePair {
    guard(InterchangePair::null(), || {
        // SAFETY: rs is a valid handle per the caller
        let rs = unsafe { borrow(rs) }?;
        rs.inner.collect_vector(column_index(index)?)
    })
}

/// Export the result set's schema as a struct-typed `ArrowSchema`.
///
/// # Returns
///
/// A heap-allocated schema owned by the caller (free with
/// `arcolyte_schema_destroy()`), or NULL on error.
///
/// # Safety
///
/// `rs` must be a valid result set handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_schema(rs: *mut ArcolyteResultSet) -> *mut ArrowSchema {
    guard(ptr::null_mut(), || {
        // SAFETY: rs is a valid handle per the caller
        let schema = unsafe { borrow(rs) }?.inner.export_schema()?;
        Ok(Box::into_raw(Box::new(schema)))
    })
}

/// Destroy a result set.
///
/// # Returns
///
/// `ARCOLYTE_OK`, or `ARCOLYTE_ERR_NULL_POINTER` if `rs` is NULL.
///
/// # Safety
///
/// `rs` must be a result set handle that has not been destroyed.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_result_destroy(rs: *mut ArcolyteResultSet) -> i32 {
    guard_status(|| {
        // SAFETY: rs came from this library and is destroyed once
        drop(unsafe { from_raw(rs) }?);
        Ok(())
    })
}
