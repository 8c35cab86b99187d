//! Schema/array pairs handed across the boundary.

use std::ptr;

use arrow::array::{Array, ArrayRef};
use tracing::debug;

use super::abi::{ArrowArray, ArrowSchema};
use super::export::{export_array, export_column, import_array};
use crate::api::ApiError;

/// One exported column: a heap-allocated schema and array.
///
/// The receiver owns both structs. Releasing them (or passing the pair to
/// [`InterchangePair::destroy`]) frees everything the producer allocated.
/// A pair with both pointers null is the failure sentinel.
#[repr(C)]
#[derive(Debug)]
pub struct InterchangePair {
    /// Field description of `array`.
    pub schema: *mut ArrowSchema,
    /// Column data.
    pub array: *mut ArrowArray,
}

impl InterchangePair {
    /// The empty pair returned on failure.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            schema: ptr::null_mut(),
            array: ptr::null_mut(),
        }
    }

    /// Whether either half is missing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.schema.is_null() || self.array.is_null()
    }

    /// Box both structs and hand them out as raw pointers.
    #[must_use]
    pub fn new(schema: ArrowSchema, array: ArrowArray) -> Self {
        Self {
            schema: Box::into_raw(Box::new(schema)),
            array: Box::into_raw(Box::new(array)),
        }
    }

    /// Reclaim both structs, freeing the heap shells.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if either pointer is null. A non-null half is still
    /// reclaimed (and released on drop) in that case.
    ///
    /// # Safety
    ///
    /// Non-null pointers must come from [`InterchangePair::new`] and not have
    /// been reclaimed before.
    pub unsafe fn into_owned(self) -> Result<(ArrowSchema, ArrowArray), ApiError> {
        // SAFETY: forwarded from the caller
        let schema = (!self.schema.is_null()).then(|| *unsafe { Box::from_raw(self.schema) });
        // SAFETY: forwarded from the caller
        let array = (!self.array.is_null()).then(|| *unsafe { Box::from_raw(self.array) });
        match (schema, array) {
            (Some(schema), Some(array)) => Ok((schema, array)),
            _ => Err(ApiError::import("interchange pair has a null half")),
        }
    }

    /// Release whatever the pair still owns and free its shells.
    ///
    /// # Safety
    ///
    /// Same contract as [`InterchangePair::into_owned`].
    pub unsafe fn destroy(self) {
        // Dropping the reclaimed structs runs any pending release
        // SAFETY: forwarded from the caller
        drop(unsafe { self.into_owned() });
    }

    /// Move the contents out of both structs, leaving them released.
    ///
    /// The shells stay with the caller.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if either pointer is null.
    ///
    /// # Safety
    ///
    /// Non-null pointers must point to valid, live structs.
    pub unsafe fn take(&self) -> Result<(ArrowSchema, ArrowArray), ApiError> {
        if self.is_null() {
            return Err(ApiError::import("interchange pair has a null half"));
        }
        // SAFETY: both pointers are non-null and valid per the caller
        Ok(unsafe { (ArrowSchema::take(self.schema), ArrowArray::take(self.array)) })
    }
}

/// Export a named column as a pair.
///
/// # Errors
///
/// Returns `ApiError` if the column type has no C Data Interface format.
pub fn export_pair(name: &str, column: &ArrayRef) -> Result<InterchangePair, ApiError> {
    let (schema, array) = export_column(name, column)?;
    Ok(InterchangePair::new(schema, array))
}

/// Import a pair and re-export it without copying buffers.
///
/// The input structs are consumed: after this call they are released
/// (whether or not it succeeds) and only their shells remain for the caller
/// to free. The returned pair shares the input's buffers and frees them when
/// it is released.
///
/// # Errors
///
/// Returns `ApiError` if the input is null, already released, or not a valid
/// array.
///
/// # Safety
///
/// The pair's pointers must be valid structs filled in by a conforming
/// producer.
pub unsafe fn roundtrip_pair(pair: &InterchangePair) -> Result<InterchangePair, ApiError> {
    // SAFETY: forwarded from the caller
    let (schema, array) = unsafe { pair.take() }?;
    // SAFETY: the structs came from a conforming producer
    let (field, imported) = unsafe { import_array(schema, array) }?;
    debug!(
        field = field.name(),
        len = imported.len(),
        "round-tripping interchange pair"
    );
    let (schema, array) = export_array(&field, &imported.to_data())?;
    Ok(InterchangePair::new(schema, array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::DataType;

    fn import(pair: InterchangePair) -> ArrayRef {
        // SAFETY: pair was produced by this module
        let (schema, array) = unsafe { pair.into_owned() }.unwrap();
        // SAFETY: produced by export_pair/roundtrip_pair
        unsafe { import_array(schema, array) }.unwrap().1
    }

    #[test]
    fn test_null_pair() {
        let pair = InterchangePair::null();
        assert!(pair.is_null());
        // SAFETY: null pairs are rejected without dereferencing
        assert!(unsafe { roundtrip_pair(&pair) }.is_err());
        // SAFETY: null halves are skipped
        unsafe { pair.destroy() };
    }

    #[test]
    fn test_roundtrip_preserves_values() {
        let column: ArrayRef = Arc::new(StringArray::from(vec![Some("x"), None, Some("zz")]));
        let input = export_pair("s", &column).unwrap();

        // SAFETY: input was produced by export_pair
        let output = unsafe { roundtrip_pair(&input) }.unwrap();
        assert!(!output.is_null());
        // SAFETY: output is live
        unsafe {
            assert_eq!((*output.schema).name(), Some("s"));
            assert_eq!((*output.array).null_count, 1);
            assert!((*input.schema).is_released());
            assert!((*input.array).is_released());
        }

        assert_eq!(import(output).as_ref(), column.as_ref());
        // SAFETY: releasing a moved-out pair is a no-op; this frees the shells
        unsafe { input.destroy() };
    }

    #[test]
    fn test_roundtrip_shares_buffers() {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![10, 20, 30]));
        let before = column.to_data().buffers()[0].as_ptr();
        let input = export_pair("n", &column).unwrap();
        // SAFETY: input was produced by export_pair
        let output = unsafe { roundtrip_pair(&input) }.unwrap();

        // SAFETY: output is live
        let after = unsafe { (*output.array).buffer(1) };
        assert_eq!(after.cast::<u8>(), before);

        // SAFETY: both produced here
        unsafe {
            input.destroy();
            output.destroy();
        }
        assert_eq!(column.len(), 3);
    }

    #[test]
    fn test_roundtrip_of_released_pair_fails() {
        let column: ArrayRef = Arc::new(Float64Array::from(vec![1.5]));
        let input = export_pair("f", &column).unwrap();
        // SAFETY: input is live
        unsafe { (*input.array).release() };

        // SAFETY: released structs are rejected before import
        let err = unsafe { roundtrip_pair(&input) }.unwrap_err();
        assert_eq!(err.code(), crate::api::codes::IMPORT_FAILED);
        // SAFETY: frees shells and the still-live schema
        unsafe { input.destroy() };
    }

    static ARRAY_RELEASES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_release(array: *mut ArrowArray) {
        ARRAY_RELEASES.fetch_add(1, Ordering::SeqCst);
        unsafe { (*array).release = None };
    }

    #[test]
    fn test_destroy_after_manual_release_is_single_release() {
        ARRAY_RELEASES.store(0, Ordering::SeqCst);
        let mut array = ArrowArray::empty();
        array.release = Some(counting_release);
        let pair = InterchangePair::new(ArrowSchema::empty(), array);

        // consumer releases by hand, then hands the shells back
        // SAFETY: pair is live
        unsafe { (*pair.array).release() };
        // SAFETY: produced by InterchangePair::new
        unsafe { pair.destroy() };
        assert_eq!(ARRAY_RELEASES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_export_pair_field() {
        let column: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let pair = export_pair("id", &column).unwrap();
        // SAFETY: pair is live
        unsafe {
            assert_eq!((*pair.schema).format(), Some("l"));
            assert!(!(*pair.schema).nullable());
        }
        let imported = import(pair);
        assert_eq!(imported.data_type(), &DataType::Int64);
    }
}
