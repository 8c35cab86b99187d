//! FFI functions for eagerly loaded CSV files.

use std::ffi::c_char;
use std::ptr;

use crate::api::LoadedFile;
use crate::interchange::InterchangePair;

use super::error::{guard, guard_status};
use super::handle::{borrow, from_raw, into_raw, str_arg, Handle, ARCOLYTE_HANDLE_LOADED_FILE};
use super::result::column_index;

/// Opaque loaded-file handle for FFI.
///
/// Create with `arcolyte_file_load_csv()`, free with `arcolyte_file_destroy()`.
#[repr(C)]
pub struct ArcolyteFile {
    pub(crate) inner: LoadedFile,
}

impl Handle for ArcolyteFile {
    const KIND: i32 = ARCOLYTE_HANDLE_LOADED_FILE;
    const NAME: &'static str = "loaded file";
}

/// Parse a whole CSV file into memory.
///
/// When `print_rows` is positive, that many leading rows are logged at
/// `debug` level.
///
/// # Returns
///
/// A file handle, or NULL on error.
///
/// # Safety
///
/// `path` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_file_load_csv(
    path: *const c_char,
    print_rows: i64,
) -> *mut ArcolyteFile {
    guard(ptr::null_mut(), || {
        // SAFETY: path is valid per the caller
        let path = unsafe { str_arg(path, "path") }?;
        let print_rows = usize::try_from(print_rows).unwrap_or(0);
        let inner = LoadedFile::load_csv(path, print_rows)?;
        Ok(into_raw(ArcolyteFile { inner }))
    })
}

/// Number of data rows.
///
/// # Returns
///
/// The row count, or -1 on error.
///
/// # Safety
///
/// `file` must be a valid file handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_file_row_count(file: *mut ArcolyteFile) -> i64 {
    guard(-1, || {
        // SAFETY: file is a valid handle per the caller
        let n = unsafe { borrow(file) }?.inner.num_rows();
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    })
}

/// Number of columns.
///
/// # Returns
///
/// The column count, or -1 on error.
///
/// # Safety
///
/// `file` must be a valid file handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_file_column_count(file: *mut ArcolyteFile) -> i64 {
    guard(-1, || {
        // SAFETY: file is a valid handle per the caller
        let n = unsafe { borrow(file) }?.inner.num_columns();
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    })
}

/// Export column `index` as one array.
///
/// # Returns
///
/// A pair owned by the caller, or a pair of NULLs on error.
///
/// # Safety
///
/// `file` must be a valid file handle.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_file_collect_vector(
    file: *mut ArcolyteFile,
    index: i64,
) -> InterchangePair {
    guard(InterchangePair::null(), || {
        // SAFETY: file is a valid handle per the caller
        let file = unsafe { borrow(file) }?;
        file.inner.collect_vector(column_index(index)?)
    })
}

/// Destroy a loaded file.
///
/// Pairs already exported from it stay valid.
///
/// # Returns
///
/// `ARCOLYTE_OK`, or `ARCOLYTE_ERR_NULL_POINTER` if `file` is NULL.
///
/// # Safety
///
/// `file` must be a file handle that has not been destroyed.
#[no_mangle]
pub unsafe extern "C" fn arcolyte_file_destroy(file: *mut ArcolyteFile) -> i32 {
    guard_status(|| {
        // SAFETY: file came from arcolyte_file_load_csv and is destroyed once
        drop(unsafe { from_raw(file) }?);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Write;

    use crate::ffi::arrow_ffi::arcolyte_pair_destroy;
    use crate::ffi::error::{arcolyte_last_error_code, ARCOLYTE_ERR_SOURCE, ARCOLYTE_OK};

    #[test]
    fn test_load_and_collect() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"x,y\n1,a\n2,b\n3,c\n").unwrap();
        file.flush().unwrap();
        let path = CString::new(file.path().to_str().unwrap()).unwrap();

        // SAFETY: path is a valid C string; handles are used before destroy
        unsafe {
            let loaded = arcolyte_file_load_csv(path.as_ptr(), 2);
            assert!(!loaded.is_null());
            assert_eq!(arcolyte_file_row_count(loaded), 3);
            assert_eq!(arcolyte_file_column_count(loaded), 2);

            let mut pair = arcolyte_file_collect_vector(loaded, 0);
            // the pair outlives the file it came from
            assert_eq!(arcolyte_file_destroy(loaded), ARCOLYTE_OK);
            assert_eq!((*pair.array).len(), 3);
            assert_eq!((*pair.schema).name(), Some("x"));
            arcolyte_pair_destroy(&mut pair);
        }
    }

    #[test]
    fn test_missing_file() {
        // SAFETY: literal path
        let loaded = unsafe { arcolyte_file_load_csv(c"/no/such.csv".as_ptr(), 0) };
        assert!(loaded.is_null());
        assert_eq!(arcolyte_last_error_code(), ARCOLYTE_ERR_SOURCE);
        // SAFETY: null handle is rejected
        assert_eq!(unsafe { arcolyte_file_row_count(ptr::null_mut()) }, -1);
    }
}
