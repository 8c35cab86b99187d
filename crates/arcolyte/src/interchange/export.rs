//! Producing and consuming C Data Interface structs.
//!
//! Column data is exported through arrow's own producer, which keeps the
//! `ArrayData` buffers alive in `private_data` until release, so nothing is
//! copied. Schemas that do not correspond to a single arrow `Field` (the
//! struct-typed description of a whole result) are built by [`SchemaBuilder`],
//! whose private data owns every string, child and dictionary.

use std::collections::BTreeMap;
use std::ffi::{c_void, CString};
use std::ptr;

use arrow::array::{make_array, Array, ArrayData, ArrayRef};
use arrow::datatypes::{Field, Schema};
use arrow::ffi::{from_ffi, FFI_ArrowArray, FFI_ArrowSchema};
use tracing::trace;

use super::abi::{ArrowArray, ArrowSchema};
use super::metadata;
use crate::api::ApiError;

/// Export one column and its field description.
///
/// # Errors
///
/// Returns `ApiError` if the field's type has no C Data Interface format.
pub fn export_array(field: &Field, data: &ArrayData) -> Result<(ArrowSchema, ArrowArray), ApiError> {
    let schema = FFI_ArrowSchema::try_from(field)
        .map_err(|e| ApiError::export(format!("Arrow FFI schema export failed: {e}")))?;
    let array = FFI_ArrowArray::new(data);
    trace!(
        field = field.name(),
        len = data.len(),
        "exported column to C Data Interface"
    );
    Ok((schema.into(), array.into()))
}

/// Export a named column, deriving nullability from its null count.
///
/// # Errors
///
/// Returns `ApiError` if the column type has no C Data Interface format.
pub fn export_column(name: &str, column: &ArrayRef) -> Result<(ArrowSchema, ArrowArray), ApiError> {
    let field = Field::new(name, column.data_type().clone(), column.null_count() > 0);
    export_array(&field, &column.to_data())
}

/// Export a table schema as a struct-typed `ArrowSchema`, one child per field.
///
/// Schema-level metadata is carried on the parent, sorted by key.
///
/// # Errors
///
/// Returns `ApiError` if a field type cannot be exported.
pub fn export_schema(schema: &Schema) -> Result<ArrowSchema, ApiError> {
    let sorted: BTreeMap<&String, &String> = schema.metadata().iter().collect();
    let mut builder = SchemaBuilder::new("+s").metadata(sorted.into_iter().collect());
    for field in schema.fields() {
        let child = FFI_ArrowSchema::try_from(field.as_ref())
            .map_err(|e| ApiError::export(format!("field '{}': {e}", field.name())))?;
        builder = builder.child(child.into());
    }
    builder.build()
}

/// Import a schema/array pair, taking ownership of both.
///
/// The returned array shares the producer's buffers; they are released when
/// the last arrow reference to them is dropped.
///
/// # Errors
///
/// Returns `ApiError` if either struct is already released or the pair does
/// not describe a valid array.
///
/// # Safety
///
/// Both structs must have been filled in by a conforming producer, and
/// `array` must be described by `schema`.
pub unsafe fn import_array(
    schema: ArrowSchema,
    array: ArrowArray,
) -> Result<(Field, ArrayRef), ApiError> {
    if schema.is_released() || array.is_released() {
        return Err(ApiError::import("cannot import a released ArrowSchema/ArrowArray"));
    }
    let schema = FFI_ArrowSchema::from(schema);
    let field = Field::try_from(&schema)
        .map_err(|e| ApiError::import(format!("Arrow FFI schema import failed: {e}")))?;
    // SAFETY: the caller guarantees array is a live array described by schema
    let data = unsafe { from_ffi(FFI_ArrowArray::from(array), &schema) }
        .map_err(|e| ApiError::import(format!("Arrow FFI import failed: {e}")))?;
    Ok((field, make_array(data)))
}

/// Builds an [`ArrowSchema`] whose release frees everything it owns.
#[derive(Debug)]
pub struct SchemaBuilder {
    format: String,
    name: String,
    metadata: Vec<(String, String)>,
    flags: i64,
    children: Vec<ArrowSchema>,
    dictionary: Option<ArrowSchema>,
}

impl SchemaBuilder {
    /// Start a schema with the given type format string.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            name: String::new(),
            metadata: Vec::new(),
            flags: 0,
            children: Vec::new(),
            dictionary: None,
        }
    }

    /// Set the field name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the metadata entries.
    #[must_use]
    pub fn metadata<K: Into<String>, V: Into<String>>(mut self, pairs: Vec<(K, V)>) -> Self {
        self.metadata = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set the flag bits (`ARROW_FLAG_*`).
    #[must_use]
    pub fn flags(mut self, flags: i64) -> Self {
        self.flags = flags;
        self
    }

    /// Append an owned child schema.
    #[must_use]
    pub fn child(mut self, child: ArrowSchema) -> Self {
        self.children.push(child);
        self
    }

    /// Attach an owned dictionary value schema.
    #[must_use]
    pub fn dictionary(mut self, dictionary: ArrowSchema) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    /// Assemble the schema.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if a string contains an interior NUL byte or the
    /// metadata cannot be encoded.
    pub fn build(self) -> Result<ArrowSchema, ApiError> {
        let format = CString::new(self.format)
            .map_err(|e| ApiError::export(format!("format string: {e}")))?;
        let name =
            CString::new(self.name).map_err(|e| ApiError::export(format!("field name: {e}")))?;
        let metadata = if self.metadata.is_empty() {
            None
        } else {
            Some(metadata::encode(&self.metadata)?)
        };

        let mut private = Box::new(SchemaPrivate {
            format,
            name,
            metadata,
            children: self
                .children
                .into_iter()
                .map(|child| Box::into_raw(Box::new(child)))
                .collect(),
            dictionary: self
                .dictionary
                .map_or(ptr::null_mut(), |dict| Box::into_raw(Box::new(dict))),
        });

        let n_children = i64::try_from(private.children.len())
            .map_err(|_| ApiError::export("too many children"))?;
        let children = if private.children.is_empty() {
            ptr::null_mut()
        } else {
            private.children.as_mut_ptr()
        };

        Ok(ArrowSchema {
            format: private.format.as_ptr(),
            name: private.name.as_ptr(),
            metadata: private
                .metadata
                .as_ref()
                .map_or(ptr::null(), |block| block.as_ptr().cast()),
            flags: self.flags,
            n_children,
            children,
            dictionary: private.dictionary,
            release: Some(release_schema),
            private_data: Box::into_raw(private).cast::<c_void>(),
        })
    }
}

/// Everything a built schema points into.
struct SchemaPrivate {
    format: CString,
    name: CString,
    metadata: Option<Vec<u8>>,
    children: Vec<*mut ArrowSchema>,
    dictionary: *mut ArrowSchema,
}

impl Drop for SchemaPrivate {
    fn drop(&mut self) {
        // Each box drops its schema, which releases it unless the consumer
        // already released or moved it out.
        for child in self.children.drain(..) {
            // SAFETY: produced by Box::into_raw in `SchemaBuilder::build`
            drop(unsafe { Box::from_raw(child) });
        }
        if !self.dictionary.is_null() {
            // SAFETY: produced by Box::into_raw in `SchemaBuilder::build`
            drop(unsafe { Box::from_raw(self.dictionary) });
        }
    }
}

unsafe extern "C" fn release_schema(schema: *mut ArrowSchema) {
    if schema.is_null() {
        return;
    }
    // SAFETY: called by the owner of a schema built by `SchemaBuilder`
    let schema = unsafe { &mut *schema };
    if !schema.private_data.is_null() {
        // SAFETY: private_data was produced by Box::into_raw in `build`
        drop(unsafe { Box::from_raw(schema.private_data.cast::<SchemaPrivate>()) });
    }
    schema.private_data = ptr::null_mut();
    schema.children = ptr::null_mut();
    schema.dictionary = ptr::null_mut();
    schema.release = None;
}
