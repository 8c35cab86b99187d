//! FFI context functions.
//!
//! Provides `extern "C"` wrappers for creating engine contexts, registering
//! and reading sources, and executing SQL.

use std::ffi::c_char;
use std::ptr;

use crate::api::{Context, SourceKind};

use super::error::{guard, guard_status};
use super::handle::{borrow, from_raw, into_raw, str_arg, Handle, ARCOLYTE_HANDLE_CONTEXT};
use super::result::ArcolyteResultSet;

/// Opaque context handle for FFI.
///
/// Create with `arcolyte_context_create()`, free with
/// `arcolyte_context_destroy()`.
#[repr(C)]
pub struct ArcolyteContext {
    pub(crate) inner: Context,
}

impl Handle for ArcolyteContext {
    const KIND: i32 = ARCOLYTE_HANDLE_CONTEXT;
    const NAME: &'static str = "context";
}

/// Create a new engine context.
///
/// # Returns
///
/// The context handle, or NULL on error (see `arcolyte_last_error_message()`).
#[no_mangle]
pub extern "C" fn arcolyte_context_create() -> *mut ArcolyteContext {
    guard(ptr::null_mut(), || {
        let inner = Context::open()?;
        Ok(into_raw(ArcolyteContext { inner }))
    })
}

/// Destroy a context.
///
/// Result sets created from it stay valid and must still be destroyed.
///
/// # Returns
///
/// `ARCOLYTE_OK`, or `ARCOLYTE_ERR_NULL_POINTER` if `ctx` is NULL.
///
/// # Safety
///
/// `ctx` must be a handle from `arcolyte_context_create()` that has not been
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_destroy(ctx: *mut ArcolyteContext) -> i32 {
    guard_status(|| {
        // SAFETY: ctx came from arcolyte_context_create
        unsafe { from_raw(ctx) }?.inner.close();
        Ok(())
    })
}

unsafe fn register(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
    name: *const c_char,
    kind: SourceKind,
) -> i32 {
    guard_status(|| {
        // SAFETY: forwarded from the exported caller
        let ctx = unsafe { borrow(ctx) }?;
        // SAFETY: forwarded from the exported caller
        let path = unsafe { str_arg(path, "path") }?;
        // SAFETY: forwarded from the exported caller
        let name = unsafe { str_arg(name, "name") }?;
        ctx.inner.register_source(path, name, kind)
    })
}

/// Register a CSV file as table `name`.
///
/// A failed registration leaves the context usable.
///
/// # Returns
///
/// `ARCOLYTE_OK` on success, or an error code.
///
/// # Safety
///
/// * `ctx` must be a valid context handle
/// * `path` and `name` must be valid NUL-terminated strings
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_register_csv(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
    name: *const c_char,
) -> i32 {
    // SAFETY: forwarded from the caller
    unsafe { register(ctx, path, name, SourceKind::Csv) }
}

/// Register a Parquet file as table `name`.
///
/// # Returns
///
/// `ARCOLYTE_OK` on success, or an error code.
///
/// # Safety
///
/// * `ctx` must be a valid context handle
/// * `path` and `name` must be valid NUL-terminated strings
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_register_parquet(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
    name: *const c_char,
) -> i32 {
    // SAFETY: forwarded from the caller
    unsafe { register(ctx, path, name, SourceKind::Parquet) }
}

unsafe fn read(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
    kind: SourceKind,
) -> *mut ArcolyteResultSet {
    guard(ptr::null_mut(), || {
        // SAFETY: forwarded from the exported caller
        let ctx = unsafe { borrow(ctx) }?;
        // SAFETY: forwarded from the exported caller
        let path = unsafe { str_arg(path, "path") }?;
        let inner = ctx.inner.read_source(path, kind)?;
        Ok(into_raw(ArcolyteResultSet { inner }))
    })
}

/// Read a CSV file into a new result set.
///
/// # Returns
///
/// A result set handle, or NULL on error.
///
/// # Safety
///
/// * `ctx` must be a valid context handle
/// * `path` must be a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_read_csv(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
) -> *mut ArcolyteResultSet {
    // SAFETY: forwarded from the caller
    unsafe { read(ctx, path, SourceKind::Csv) }
}

/// Read a Parquet file into a new result set.
///
/// # Returns
///
/// A result set handle, or NULL on error.
///
/// # Safety
///
/// * `ctx` must be a valid context handle
/// * `path` must be a valid NUL-terminated string
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_read_parquet(
    ctx: *mut ArcolyteContext,
    path: *const c_char,
) -> *mut ArcolyteResultSet {
    // SAFETY: forwarded from the caller
    unsafe { read(ctx, path, SourceKind::Parquet) }
}

/// Plan a SQL statement against the context's registered tables.
///
/// # Returns
///
/// A result set handle, or NULL on error.
///
/// # Safety
///
/// * `ctx` must be a valid context handle
/// * `sql` must be a valid NUL-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn arcolyte_context_execute_sql(
    ctx: *mut ArcolyteContext,
    sql: *const c_char,
) -> *mut ArcolyteResultSet {
    guard(ptr::null_mut(), || {
        // SAFETY: forwarded from the caller
        let ctx = unsafe { borrow(ctx) }?;
        // SAFETY: forwarded from the caller
        let sql = unsafe { str_arg(sql, "sql") }?;
        let inner = ctx.inner.sql(sql)?;
        Ok(into_raw(ArcolyteResultSet { inner }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::error::{
        arcolyte_last_error_code, arcolyte_last_error_length, ARCOLYTE_ERR_NULL_POINTER,
        ARCOLYTE_ERR_QUERY, ARCOLYTE_ERR_SOURCE, ARCOLYTE_OK,
    };
    use crate::ffi::result::{arcolyte_result_collect_count, arcolyte_result_destroy};

    #[test]
    fn test_create_and_destroy() {
        let ctx = arcolyte_context_create();
        assert!(!ctx.is_null());
        // SAFETY: ctx is valid
        assert_eq!(unsafe { arcolyte_context_destroy(ctx) }, ARCOLYTE_OK);
    }

    #[test]
    fn test_null_arguments() {
        // SAFETY: testing null handling
        unsafe {
            assert_eq!(
                arcolyte_context_destroy(ptr::null_mut()),
                ARCOLYTE_ERR_NULL_POINTER
            );
            assert!(arcolyte_last_error_length() > 0);
            assert!(arcolyte_context_execute_sql(ptr::null_mut(), c"SELECT 1".as_ptr()).is_null());
            assert_eq!(arcolyte_last_error_code(), ARCOLYTE_ERR_NULL_POINTER);
        }

        let ctx = arcolyte_context_create();
        // SAFETY: ctx is valid; null strings are rejected
        unsafe {
            assert_eq!(
                arcolyte_context_register_csv(ctx, ptr::null(), c"t".as_ptr()),
                ARCOLYTE_ERR_NULL_POINTER
            );
            arcolyte_context_destroy(ctx);
        }
    }

    #[test]
    fn test_missing_path_keeps_context_usable() {
        let ctx = arcolyte_context_create();
        // SAFETY: ctx is valid, strings are literals
        unsafe {
            let rc = arcolyte_context_register_csv(ctx, c"/missing/t.csv".as_ptr(), c"t".as_ptr());
            assert_eq!(rc, ARCOLYTE_ERR_SOURCE);
            assert!(arcolyte_last_error_length() > 0);

            assert!(arcolyte_context_read_parquet(ctx, c"/missing/t.parquet".as_ptr()).is_null());
            assert_eq!(arcolyte_last_error_code(), ARCOLYTE_ERR_SOURCE);

            let rs = arcolyte_context_execute_sql(ctx, c"SELECT 1 AS x".as_ptr());
            assert!(!rs.is_null());
            assert_eq!(arcolyte_last_error_code(), ARCOLYTE_OK);
            assert_eq!(arcolyte_result_collect_count(rs), 1);
            arcolyte_result_destroy(rs);
            arcolyte_context_destroy(ctx);
        }
    }

    #[test]
    fn test_bad_sql() {
        let ctx = arcolyte_context_create();
        // SAFETY: ctx is valid
        unsafe {
            assert!(arcolyte_context_execute_sql(ctx, c"SELEKT".as_ptr()).is_null());
            assert_eq!(arcolyte_last_error_code(), ARCOLYTE_ERR_QUERY);
            arcolyte_context_destroy(ctx);
        }
    }
}
