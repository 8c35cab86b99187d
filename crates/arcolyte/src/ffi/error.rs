//! Thread-local error storage for FFI.
//!
//! C functions return a sentinel on failure; this module keeps the message
//! of the most recent failure on the calling thread so callers can copy it
//! out with `arcolyte_last_error_message()`. Reading never clears it.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use tracing::warn;

use crate::api::{codes, ApiError};

/// Success return code.
pub const ARCOLYTE_OK: i32 = 0;
/// Null pointer was passed to a function.
pub const ARCOLYTE_ERR_NULL_POINTER: i32 = -1;
/// Invalid UTF-8 string.
pub const ARCOLYTE_ERR_INVALID_UTF8: i32 = -2;
/// Argument out of range (negative delay, negative count).
pub const ARCOLYTE_ERR_INVALID_ARGUMENT: i32 = -3;
/// Context creation error.
pub const ARCOLYTE_ERR_CONTEXT: i32 = 100;
/// Path missing, unreadable or not registrable.
pub const ARCOLYTE_ERR_SOURCE: i32 = 200;
/// C Data Interface export/import error.
pub const ARCOLYTE_ERR_INTERCHANGE: i32 = 300;
/// Query parse, planning or execution error.
pub const ARCOLYTE_ERR_QUERY: i32 = 400;
/// Callback scheduling error.
pub const ARCOLYTE_ERR_CALLBACK: i32 = 500;
/// Internal error, including panics caught at the boundary.
pub const ARCOLYTE_ERR_INTERNAL: i32 = 900;

thread_local! {
    static LAST_ERROR: RefCell<Option<StoredError>> = const { RefCell::new(None) };
}

struct StoredError {
    code: i32,
    message: String,
}

/// Store an error for later retrieval.
pub(crate) fn set_last_error(err: &ApiError) {
    let code = api_error_to_ffi_code(err);
    warn!(code = err.code(), message = err.message(), "call failed");
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(StoredError {
            code,
            message: err.message().to_owned(),
        });
    });
}

/// Clear the last error.
pub(crate) fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

/// Convert `ApiError` to FFI error code.
pub(crate) fn api_error_to_ffi_code(err: &ApiError) -> i32 {
    match err.code() {
        codes::NULL_POINTER => ARCOLYTE_ERR_NULL_POINTER,
        codes::INVALID_UTF8 => ARCOLYTE_ERR_INVALID_UTF8,
        codes::INVALID_ARGUMENT => ARCOLYTE_ERR_INVALID_ARGUMENT,
        100..=199 => ARCOLYTE_ERR_CONTEXT,
        200..=299 => ARCOLYTE_ERR_SOURCE,
        300..=399 => ARCOLYTE_ERR_INTERCHANGE,
        400..=499 => ARCOLYTE_ERR_QUERY,
        500..=599 => ARCOLYTE_ERR_CALLBACK,
        _ => ARCOLYTE_ERR_INTERNAL,
    }
}

/// Run a boundary call: clear the channel, catch panics, record failures.
///
/// Returns `sentinel` when `f` fails or panics.
pub(crate) fn guard<T>(sentinel: T, f: impl FnOnce() -> Result<T, ApiError>) -> T {
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            set_last_error(&err);
            sentinel
        }
        Err(payload) => {
            set_last_error(&ApiError::panic(panic_message(payload.as_ref())));
            sentinel
        }
    }
}

/// Like [`guard`], for calls that return a status code.
pub(crate) fn guard_status(f: impl FnOnce() -> Result<(), ApiError>) -> i32 {
    clear_last_error();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ARCOLYTE_OK,
        Ok(Err(err)) => {
            set_last_error(&err);
            api_error_to_ffi_code(&err)
        }
        Err(payload) => {
            set_last_error(&ApiError::panic(panic_message(payload.as_ref())));
            ARCOLYTE_ERR_INTERNAL
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    format!("panic caught at FFI boundary: {detail}")
}

/// Byte length of the last error message on this thread, without a
/// terminator, or 0 if there is none.
#[no_mangle]
pub extern "C" fn arcolyte_last_error_length() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map_or(0, |stored| i32::try_from(stored.message.len()).unwrap_or(i32::MAX))
    })
}

/// Copy the last error message into `buffer`.
///
/// # Returns
///
/// The number of bytes written, excluding any terminator; 0 if there is no
/// error; -1 if `buffer` is null or `capacity` is smaller than the message.
/// Nothing is written on -1. A NUL terminator follows the message when
/// `capacity` leaves room for it.
///
/// # Safety
///
/// A non-null `buffer` must be valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_last_error_message(buffer: *mut c_char, capacity: i32) -> i32 {
    if buffer.is_null() {
        return -1;
    }
    let Ok(capacity) = usize::try_from(capacity) else {
        return -1;
    };
    LAST_ERROR.with(|e| {
        let guard = e.borrow();
        let message = guard.as_ref().map_or("", |stored| stored.message.as_str());
        let len = message.len();
        if capacity < len {
            return -1;
        }
        // SAFETY: buffer holds capacity >= len bytes (checked above)
        unsafe {
            ptr::copy_nonoverlapping(message.as_ptr(), buffer.cast::<u8>(), len);
            if capacity > len {
                *buffer.add(len) = 0;
            }
        }
        i32::try_from(len).unwrap_or(-1)
    })
}

/// Get the last error code (`ARCOLYTE_ERR_*`), or `ARCOLYTE_OK` if none.
#[no_mangle]
pub extern "C" fn arcolyte_last_error_code() -> i32 {
    LAST_ERROR.with(|e| e.borrow().as_ref().map_or(ARCOLYTE_OK, |stored| stored.code))
}

/// Clear the last error on this thread.
#[no_mangle]
pub extern "C" fn arcolyte_clear_error() {
    clear_last_error();
}
