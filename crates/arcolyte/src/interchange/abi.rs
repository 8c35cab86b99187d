//! `#[repr(C)]` definitions of the Arrow C Data Interface structs.
//!
//! Layouts follow <https://arrow.apache.org/docs/format/CDataInterface.html>
//! field for field. Both structs own whatever their `release` callback frees:
//! dropping one invokes `release` exactly once and nulls it, so a struct that
//! was already released (or moved out of) drops as a no-op.

use std::ffi::{c_char, c_void, CStr};
use std::mem::{size_of, ManuallyDrop};
use std::ptr;

use arrow::ffi::{FFI_ArrowArray, FFI_ArrowSchema};

use super::metadata;
use crate::api::ApiError;

/// Dictionary indices are ordered.
pub const ARROW_FLAG_DICTIONARY_ORDERED: i64 = 1;
/// The field may contain nulls.
pub const ARROW_FLAG_NULLABLE: i64 = 2;
/// Map keys are sorted within each entry.
pub const ARROW_FLAG_MAP_KEYS_SORTED: i64 = 4;

/// Release callback of an [`ArrowSchema`].
pub type SchemaRelease = unsafe extern "C" fn(schema: *mut ArrowSchema);
/// Release callback of an [`ArrowArray`].
pub type ArrayRelease = unsafe extern "C" fn(array: *mut ArrowArray);

/// C Data Interface `struct ArrowSchema`.
#[repr(C)]
#[derive(Debug)]
pub struct ArrowSchema {
    /// Type format string, NUL-terminated.
    pub format: *const c_char,
    /// Field name, NUL-terminated, or null.
    pub name: *const c_char,
    /// Binary key/value block (see [`metadata`]), or null.
    pub metadata: *const c_char,
    /// `ARROW_FLAG_*` bits.
    pub flags: i64,
    /// Number of entries in `children`.
    pub n_children: i64,
    /// Owned child schemas; null when `n_children` is 0.
    pub children: *mut *mut ArrowSchema,
    /// Owned dictionary value schema for dictionary-encoded types, or null.
    pub dictionary: *mut ArrowSchema,
    /// Frees everything this schema owns; null once released.
    pub release: Option<SchemaRelease>,
    /// Producer bookkeeping.
    pub private_data: *mut c_void,
}

/// C Data Interface `struct ArrowArray`.
#[repr(C)]
#[derive(Debug)]
pub struct ArrowArray {
    /// Logical length.
    pub length: i64,
    /// Number of nulls, or -1 if unknown.
    pub null_count: i64,
    /// Logical offset into the buffers.
    pub offset: i64,
    /// Number of entries in `buffers`.
    pub n_buffers: i64,
    /// Number of entries in `children`.
    pub n_children: i64,
    /// Buffer pointers; optional buffers may be null.
    pub buffers: *mut *const c_void,
    /// Owned child arrays.
    pub children: *mut *mut ArrowArray,
    /// Owned dictionary values, or null.
    pub dictionary: *mut ArrowArray,
    /// Frees everything this array owns; null once released.
    pub release: Option<ArrayRelease>,
    /// Producer bookkeeping.
    pub private_data: *mut c_void,
}

// Moving between these and arrow's own definitions is a bitwise copy.
const _: () = assert!(size_of::<ArrowSchema>() == size_of::<FFI_ArrowSchema>());
const _: () = assert!(size_of::<ArrowArray>() == size_of::<FFI_ArrowArray>());

impl ArrowSchema {
    /// A released schema, used as a slot for a producer to fill.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            format: ptr::null(),
            name: ptr::null(),
            metadata: ptr::null(),
            flags: 0,
            n_children: 0,
            children: ptr::null_mut(),
            dictionary: ptr::null_mut(),
            release: None,
            private_data: ptr::null_mut(),
        }
    }

    /// Whether the release callback has already run (or never was set).
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Invoke the release callback once, then null it.
    ///
    /// Calling this on a released schema does nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release {
            // SAFETY: a non-null release was installed by the producer together
            // with the private data it frees; it has not run yet.
            unsafe { release(self) };
            // Every other field now points into freed memory.
            // SAFETY: self is valid for writes and the released value needs no drop
            unsafe { ptr::write(self, Self::empty()) };
        }
    }

    /// Move the schema out of `slot`, leaving a released schema behind.
    ///
    /// # Safety
    ///
    /// `slot` must be a valid, aligned pointer to an `ArrowSchema`.
    pub unsafe fn take(slot: *mut Self) -> Self {
        unsafe { ptr::replace(slot, Self::empty()) }
    }

    /// The type format string.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        // SAFETY: an unreleased schema's strings are owned by its producer.
        unsafe { c_str(self.format) }
    }

    /// The field name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        // SAFETY: see `format`.
        unsafe { c_str(self.name) }
    }

    /// Whether the nullable flag is set.
    #[must_use]
    pub fn nullable(&self) -> bool {
        self.flags & ARROW_FLAG_NULLABLE != 0
    }

    /// Decoded metadata key/value pairs, empty when the block is null.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the block is malformed.
    pub fn metadata(&self) -> Result<Vec<(String, String)>, ApiError> {
        // SAFETY: an unreleased schema's metadata block is owned by its producer.
        unsafe { metadata::decode_raw(self.metadata) }
    }

    /// Child schema at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&ArrowSchema> {
        if self.children.is_null() || index >= usize::try_from(self.n_children).ok()? {
            return None;
        }
        // SAFETY: children holds n_children pointers owned by this schema.
        unsafe { (*self.children.add(index)).as_ref() }
    }

    /// Dictionary value schema, for dictionary-encoded types.
    #[must_use]
    pub fn dictionary(&self) -> Option<&ArrowSchema> {
        // SAFETY: dictionary is either null or owned by this schema.
        unsafe { self.dictionary.as_ref() }
    }
}

impl Drop for ArrowSchema {
    fn drop(&mut self) {
        self.release();
    }
}

impl From<FFI_ArrowSchema> for ArrowSchema {
    fn from(schema: FFI_ArrowSchema) -> Self {
        let schema = ManuallyDrop::new(schema);
        // SAFETY: both types are #[repr(C)] definitions of the same C struct;
        // ownership of the release callback moves into the copy.
        let mut schema =
            unsafe { ptr::read(ptr::from_ref::<FFI_ArrowSchema>(&schema).cast::<Self>()) };
        // arrow leaves a dangling pointer for leaves; its release frees
        // children through private_data, not this field.
        if schema.n_children == 0 {
            schema.children = ptr::null_mut();
        }
        schema
    }
}

impl From<ArrowSchema> for FFI_ArrowSchema {
    fn from(schema: ArrowSchema) -> Self {
        let schema = ManuallyDrop::new(schema);
        // SAFETY: see `From<FFI_ArrowSchema> for ArrowSchema`.
        unsafe { ptr::read(ptr::from_ref::<ArrowSchema>(&schema).cast::<Self>()) }
    }
}

impl ArrowArray {
    /// A released array, used as a slot for a producer to fill.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            length: 0,
            null_count: 0,
            offset: 0,
            n_buffers: 0,
            n_children: 0,
            buffers: ptr::null_mut(),
            children: ptr::null_mut(),
            dictionary: ptr::null_mut(),
            release: None,
            private_data: ptr::null_mut(),
        }
    }

    /// Whether the release callback has already run (or never was set).
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Invoke the release callback once, then null it.
    ///
    /// Calling this on a released array does nothing.
    pub fn release(&mut self) {
        if let Some(release) = self.release {
            // SAFETY: a non-null release was installed by the producer together
            // with the private data it frees; it has not run yet.
            unsafe { release(self) };
            // Every other field now points into freed memory.
            // SAFETY: self is valid for writes and the released value needs no drop
            unsafe { ptr::write(self, Self::empty()) };
        }
    }

    /// Move the array out of `slot`, leaving a released array behind.
    ///
    /// # Safety
    ///
    /// `slot` must be a valid, aligned pointer to an `ArrowArray`.
    pub unsafe fn take(slot: *mut Self) -> Self {
        unsafe { ptr::replace(slot, Self::empty()) }
    }

    /// Logical length.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::try_from(self.length).unwrap_or(0)
    }

    /// Whether the array has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw buffer pointer at `index`; null for absent optional buffers.
    #[must_use]
    pub fn buffer(&self, index: usize) -> *const c_void {
        let in_range = usize::try_from(self.n_buffers).is_ok_and(|n| index < n);
        if self.buffers.is_null() || !in_range {
            return ptr::null();
        }
        // SAFETY: buffers holds n_buffers pointers owned by this array.
        unsafe { *self.buffers.add(index) }
    }

    /// Child array at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&ArrowArray> {
        if self.children.is_null() || index >= usize::try_from(self.n_children).ok()? {
            return None;
        }
        // SAFETY: children holds n_children pointers owned by this array.
        unsafe { (*self.children.add(index)).as_ref() }
    }
}

impl Drop for ArrowArray {
    fn drop(&mut self) {
        self.release();
    }
}

impl From<FFI_ArrowArray> for ArrowArray {
    fn from(array: FFI_ArrowArray) -> Self {
        let array = ManuallyDrop::new(array);
        // SAFETY: both types are #[repr(C)] definitions of the same C struct;
        // ownership of the release callback moves into the copy.
        let mut array =
            unsafe { ptr::read(ptr::from_ref::<FFI_ArrowArray>(&array).cast::<Self>()) };
        // See `From<FFI_ArrowSchema> for ArrowSchema`.
        if array.n_children == 0 {
            array.children = ptr::null_mut();
        }
        array
    }
}

impl From<ArrowArray> for FFI_ArrowArray {
    fn from(array: ArrowArray) -> Self {
        let array = ManuallyDrop::new(array);
        // SAFETY: see `From<FFI_ArrowArray> for ArrowArray`.
        unsafe { ptr::read(ptr::from_ref::<ArrowArray>(&array).cast::<Self>()) }
    }
}

unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use arrow::array::{Array, Int32Array};
    use arrow::datatypes::{DataType, Field};

    static RELEASES: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_release(array: *mut ArrowArray) {
        RELEASES.fetch_add(1, Ordering::SeqCst);
        unsafe { (*array).release = None };
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_layout_matches_c_abi() {
        assert_eq!(size_of::<ArrowSchema>(), 72);
        assert_eq!(size_of::<ArrowArray>(), 80);
        assert_eq!(std::mem::offset_of!(ArrowSchema, flags), 24);
        assert_eq!(std::mem::offset_of!(ArrowSchema, release), 56);
        assert_eq!(std::mem::offset_of!(ArrowArray, buffers), 40);
        assert_eq!(std::mem::offset_of!(ArrowArray, release), 64);
    }

    #[test]
    fn test_empty_is_released() {
        assert!(ArrowSchema::empty().is_released());
        assert!(ArrowArray::empty().is_released());
        assert!(ArrowArray::empty().buffer(0).is_null());
        assert!(ArrowSchema::empty().child(0).is_none());
    }

    #[test]
    fn test_release_then_drop_calls_once() {
        RELEASES.store(0, Ordering::SeqCst);
        let mut array = ArrowArray::empty();
        array.release = Some(counting_release);

        array.release();
        assert!(array.is_released());
        array.release();
        drop(array);

        assert_eq!(RELEASES.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_take_leaves_released_slot() {
        let data = Int32Array::from(vec![1, 2, 3]).into_data();
        let mut slot = ArrowArray::from(FFI_ArrowArray::new(&data));
        assert!(!slot.is_released());

        // SAFETY: slot is a valid local
        let taken = unsafe { ArrowArray::take(&mut slot) };
        assert!(slot.is_released());
        assert!(!taken.is_released());
        assert_eq!(taken.len(), 3);
        assert_eq!(taken.n_buffers, 2);
        assert!(taken.buffer(0).is_null());
        assert!(!taken.buffer(1).is_null());
    }

    #[test]
    fn test_schema_accessors() {
        let field = Field::new("price", DataType::Float64, true);
        let schema = ArrowSchema::from(FFI_ArrowSchema::try_from(&field).unwrap());

        assert_eq!(schema.format(), Some("g"));
        assert_eq!(schema.name(), Some("price"));
        assert!(schema.nullable());
        assert_eq!(schema.n_children, 0);
        assert!(schema.children.is_null());
        assert!(schema.dictionary().is_none());
        assert!(schema.metadata().unwrap().is_empty());
    }

    #[test]
    fn test_leaf_children_are_null() {
        let field = Field::new("n", DataType::Int32, false);
        let schema = ArrowSchema::from(FFI_ArrowSchema::try_from(&field).unwrap());
        assert_eq!(schema.n_children, 0);
        assert!(schema.children.is_null());

        let data = Int32Array::from(vec![1]).into_data();
        let array = ArrowArray::from(FFI_ArrowArray::new(&data));
        assert_eq!(array.n_children, 0);
        assert!(array.children.is_null());
    }

    #[test]
    fn test_struct_children_survive_conversion() {
        let field = Field::new(
            "s",
            DataType::Struct(vec![Field::new("a", DataType::Int32, true)].into()),
            true,
        );
        let schema = ArrowSchema::from(FFI_ArrowSchema::try_from(&field).unwrap());
        assert_eq!(schema.n_children, 1);
        assert_eq!(schema.child(0).unwrap().name(), Some("a"));
    }

    #[test]
    fn test_accessors_after_release() {
        let field = Field::new("price", DataType::Float64, true);
        let mut schema = ArrowSchema::from(FFI_ArrowSchema::try_from(&field).unwrap());
        schema.release();
        assert!(schema.format().is_none());
        assert!(schema.name().is_none());
        assert!(schema.metadata().unwrap().is_empty());
        assert!(schema.child(0).is_none());
        assert!(schema.dictionary().is_none());
        assert!(schema.private_data.is_null());

        let data = Int32Array::from(vec![1, 2, 3]).into_data();
        let mut array = ArrowArray::from(FFI_ArrowArray::new(&data));
        array.release();
        assert!(array.is_empty());
        assert_eq!(array.n_buffers, 0);
        assert!(array.buffer(1).is_null());
        assert!(array.child(0).is_none());
        assert!(array.private_data.is_null());
    }

    struct TreePrivate {
        children: Vec<*mut ArrowArray>,
        dictionary: *mut ArrowArray,
    }

    unsafe extern "C" fn release_counted_leaf(array: *mut ArrowArray) {
        // SAFETY: private_data points at the test's counter
        unsafe {
            (*(*array).private_data.cast::<AtomicUsize>()).fetch_add(1, Ordering::SeqCst);
            (*array).release = None;
        }
    }

    unsafe extern "C" fn release_tree(array: *mut ArrowArray) {
        // SAFETY: private_data was set by `counted_tree`; dropping each box
        // releases the node unless it was moved out
        unsafe {
            let TreePrivate {
                children,
                dictionary,
            } = *Box::from_raw((*array).private_data.cast::<TreePrivate>());
            for child in children {
                drop(Box::from_raw(child));
            }
            drop(Box::from_raw(dictionary));
            (*array).release = None;
        }
    }

    fn counted_leaf(releases: &AtomicUsize) -> *mut ArrowArray {
        let mut leaf = ArrowArray::empty();
        leaf.release = Some(release_counted_leaf);
        leaf.private_data = ptr::from_ref(releases).cast_mut().cast();
        Box::into_raw(Box::new(leaf))
    }

    /// Two counted children and a counted dictionary under one parent.
    fn counted_tree(releases: &AtomicUsize) -> ArrowArray {
        let mut private = Box::new(TreePrivate {
            children: vec![counted_leaf(releases), counted_leaf(releases)],
            dictionary: counted_leaf(releases),
        });
        let mut parent = ArrowArray::empty();
        parent.n_children = 2;
        parent.children = private.children.as_mut_ptr();
        parent.dictionary = private.dictionary;
        parent.release = Some(release_tree);
        parent.private_data = Box::into_raw(private).cast();
        parent
    }

    #[test]
    fn test_array_tree_releases_each_node_once() {
        let releases = AtomicUsize::new(0);
        let mut parent = counted_tree(&releases);
        assert!(parent.child(1).is_some());

        parent.release();
        assert!(parent.is_released());
        assert_eq!(releases.load(Ordering::SeqCst), 3);

        parent.release();
        drop(parent);
        assert_eq!(releases.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_array_tree_skips_moved_out_child() {
        let releases = AtomicUsize::new(0);
        let parent = counted_tree(&releases);

        // SAFETY: child 0 exists and is owned by parent
        let moved = unsafe { ArrowArray::take(*parent.children) };
        drop(parent);
        assert_eq!(releases.load(Ordering::SeqCst), 2);

        drop(moved);
        assert_eq!(releases.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_arrow_conversion_preserves_ownership() {
        let data = Int32Array::from(vec![Some(4), None]).into_data();
        let array = ArrowArray::from(FFI_ArrowArray::new(&data));
        assert_eq!(array.null_count, 1);

        let back = FFI_ArrowArray::from(array);
        assert!(!back.is_released());
        assert_eq!(back.len(), 2);
        assert_eq!(data.len(), 2);
    }
}
