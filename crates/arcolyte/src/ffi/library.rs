//! Library-wide FFI functions.

use std::ffi::c_char;

/// Install the library's log subscriber.
///
/// Filter directives are read from `ARCOLYTE_LOG` (default `arcolyte=info`).
/// Repeated or concurrent calls are harmless.
#[no_mangle]
pub extern "C" fn arcolyte_initialize_logging() {
    // Nothing useful can be reported if installing a subscriber panics.
    let _ = std::panic::catch_unwind(crate::logging::init);
}

/// Get the library version.
///
/// # Returns
///
/// A pointer to a static NUL-terminated version string. Do not free it.
#[no_mangle]
pub extern "C" fn arcolyte_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr().cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_initialize_logging_twice() {
        arcolyte_initialize_logging();
        arcolyte_initialize_logging();
    }

    #[test]
    fn test_version() {
        let ptr = arcolyte_version();
        assert!(!ptr.is_null());

        // SAFETY: ptr points to a static string
        let version = unsafe { CStr::from_ptr(ptr).to_str().unwrap() };
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }
}
