//! Opaque handle lifecycle and argument checking.
//!
//! Handles are `Box`ed Rust values handed out as raw pointers. Each kind keeps
//! a live count so callers can check that every create was paired with a
//! destroy. Use after destroy is not detected.

use std::ffi::{c_char, CStr};
use std::sync::atomic::{AtomicI64, Ordering};

use tracing::debug;

use super::error::guard;
use crate::api::ApiError;

/// Handle kind: context.
pub const ARCOLYTE_HANDLE_CONTEXT: i32 = 0;
/// Handle kind: result set.
pub const ARCOLYTE_HANDLE_RESULT_SET: i32 = 1;
/// Handle kind: loaded file.
pub const ARCOLYTE_HANDLE_LOADED_FILE: i32 = 2;

static LIVE: [AtomicI64; 3] = [AtomicI64::new(0), AtomicI64::new(0), AtomicI64::new(0)];

/// A type handed across the boundary as an opaque pointer.
pub(crate) trait Handle: Sized {
    /// One of the `ARCOLYTE_HANDLE_*` kinds.
    const KIND: i32;
    /// Name used in logs and error messages.
    const NAME: &'static str;
}

fn counter(kind: i32) -> Option<&'static AtomicI64> {
    usize::try_from(kind).ok().and_then(|i| LIVE.get(i))
}

/// Box `value` and return the raw handle.
pub(crate) fn into_raw<T: Handle>(value: T) -> *mut T {
    if let Some(live) = counter(T::KIND) {
        live.fetch_add(1, Ordering::Relaxed);
    }
    let ptr = Box::into_raw(Box::new(value));
    debug!(handle = T::NAME, ?ptr, "handle created");
    ptr
}

/// Reclaim a handle created by [`into_raw`].
///
/// # Safety
///
/// `ptr` must come from [`into_raw`] and not have been reclaimed before.
pub(crate) unsafe fn from_raw<T: Handle>(ptr: *mut T) -> Result<T, ApiError> {
    if ptr.is_null() {
        return Err(ApiError::null_pointer(T::NAME));
    }
    if let Some(live) = counter(T::KIND) {
        live.fetch_sub(1, Ordering::Relaxed);
    }
    debug!(handle = T::NAME, ?ptr, "handle destroyed");
    // SAFETY: forwarded from the caller
    Ok(*unsafe { Box::from_raw(ptr) })
}

/// Borrow a handle.
///
/// # Safety
///
/// A non-null `ptr` must be a live handle from [`into_raw`].
pub(crate) unsafe fn borrow<'a, T: Handle>(ptr: *const T) -> Result<&'a T, ApiError> {
    // SAFETY: forwarded from the caller
    unsafe { ptr.as_ref() }.ok_or_else(|| ApiError::null_pointer(T::NAME))
}

/// Borrow a NUL-terminated UTF-8 string argument.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string that outlives `'a`.
pub(crate) unsafe fn str_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, ApiError> {
    if ptr.is_null() {
        return Err(ApiError::null_pointer(name));
    }
    // SAFETY: ptr is non-null (checked above)
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| ApiError::invalid_utf8(name))
}

/// Number of live handles of `kind` (`ARCOLYTE_HANDLE_*`).
///
/// # Returns
///
/// The count, or -1 for an unknown kind.
#[no_mangle]
pub extern "C" fn arcolyte_live_handles(kind: i32) -> i64 {
    guard(-1, || {
        counter(kind)
            .map(|live| live.load(Ordering::Relaxed))
            .ok_or_else(|| ApiError::invalid_argument(format!("unknown handle kind {kind}")))
    })
}
