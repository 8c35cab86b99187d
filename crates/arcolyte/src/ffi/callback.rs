//! One-shot delayed callbacks for FFI.
//!
//! A callback record pairs a C function pointer with caller userdata. The
//! function is invoked exactly once, no earlier than the requested delay, on
//! a scheduler thread (never the calling thread). The library never reads or
//! frees `userdata`; keeping it alive until the callback fires is the
//! caller's job.
//!
//! # Example
//!
//! ```c
//! #include "arcolyte.h"
//!
//! void on_value(void* ctx, int64_t value) {
//!     atomic_store((atomic_int_least64_t*)ctx, value);
//! }
//!
//! ArcolyteCallbackInt64 record = { .userdata = &slot, .callback = on_value };
//! arcolyte_callback_int64_after(50, 7, record);
//! ```

use std::ffi::c_void;
use std::time::Duration;

use tracing::trace;

use crate::api::ApiError;
use crate::scheduler::Scheduler;

use super::error::guard_status;

/// Callback receiving a `bool`.
pub type ArcolyteBoolFn = unsafe extern "C" fn(userdata: *mut c_void, value: bool);
/// Callback receiving an `int64_t`.
pub type ArcolyteInt64Fn = unsafe extern "C" fn(userdata: *mut c_void, value: i64);

/// Callback record for `arcolyte_callback_bool_after()`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArcolyteCallbackBool {
    /// Opaque pointer handed back to `callback`.
    pub userdata: *mut c_void,
    /// Function to invoke; must not be NULL.
    pub callback: Option<ArcolyteBoolFn>,
}

/// Callback record for `arcolyte_callback_int64_after()`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ArcolyteCallbackInt64 {
    /// Opaque pointer handed back to `callback`.
    pub userdata: *mut c_void,
    /// Function to invoke; must not be NULL.
    pub callback: Option<ArcolyteInt64Fn>,
}

/// A validated record on its way to the scheduler thread.
struct Delivery<T> {
    userdata: *mut c_void,
    callback: unsafe extern "C" fn(*mut c_void, T),
}

// SAFETY: userdata is never dereferenced here, only passed back to the
// caller's function; thread safety of what it points to is the caller's
// responsibility.
unsafe impl<T: Send> Send for Delivery<T> {}

impl<T> Delivery<T> {
    fn deliver(self, value: T) {
        // SAFETY: the callback was supplied by the FFI caller together with
        // its userdata.
        unsafe { (self.callback)(self.userdata, value) };
    }
}

fn schedule<T: Send + 'static>(delay_ms: i64, delivery: Delivery<T>, value: T) -> Result<(), ApiError> {
    let delay = u64::try_from(delay_ms)
        .map(Duration::from_millis)
        .map_err(|_| ApiError::invalid_argument(format!("negative delay {delay_ms}ms")))?;
    let scheduler = Scheduler::global()?;
    trace!(delay_ms, "scheduling callback");
    // Completion is observed through the callback itself.
    drop(scheduler.schedule_after(delay, move || delivery.deliver(value)));
    Ok(())
}

/// Invoke `record.callback(record.userdata, true)` once after `delay_ms`.
///
/// # Returns
///
/// `ARCOLYTE_OK` once scheduled; `ARCOLYTE_ERR_NULL_POINTER` if the callback
/// is NULL; `ARCOLYTE_ERR_INVALID_ARGUMENT` for a negative delay.
#[no_mangle]
pub extern "C" fn arcolyte_callback_bool_after(delay_ms: i64, record: ArcolyteCallbackBool) -> i32 {
    guard_status(|| {
        let callback = record
            .callback
            .ok_or_else(|| ApiError::null_pointer("callback"))?;
        let delivery = Delivery {
            userdata: record.userdata,
            callback,
        };
        schedule(delay_ms, delivery, true)
    })
}

/// Invoke `record.callback(record.userdata, value)` once after `delay_ms`.
///
/// # Returns
///
/// `ARCOLYTE_OK` once scheduled; `ARCOLYTE_ERR_NULL_POINTER` if the callback
/// is NULL; `ARCOLYTE_ERR_INVALID_ARGUMENT` for a negative delay.
#[no_mangle]
pub extern "C" fn arcolyte_callback_int64_after(
    delay_ms: i64,
    value: i64,
    record: ArcolyteCallbackInt64,
) -> i32 {
    guard_status(|| {
        let callback = record
            .callback
            .ok_or_else(|| ApiError::null_pointer("callback"))?;
        let delivery = Delivery {
            userdata: record.userdata,
            callback,
        };
        schedule(delay_ms, delivery, value)
    })
}
