//! API error types with numeric codes for FFI interoperability.

use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

/// Error codes for FFI interop.
///
/// Ranges:
/// - 100-199: Context errors
/// - 200-299: Source errors (paths, files, registration)
/// - 300-399: Interchange errors
/// - 400-499: Query errors
/// - 500-599: Callback errors
/// - 600-699: Boundary argument errors (null pointers, bad strings)
/// - 900-999: Internal errors
pub mod codes {
    // Context
    /// Context creation failed.
    pub const CONTEXT_FAILED: i32 = 100;

    // Source
    /// File or directory does not exist.
    pub const SOURCE_NOT_FOUND: i32 = 200;
    /// File exists but could not be read or parsed.
    pub const SOURCE_UNREADABLE: i32 = 201;
    /// Registering a source under a logical name failed.
    pub const SOURCE_REGISTRATION: i32 = 202;

    // Interchange
    /// Export to the C Data Interface failed.
    pub const EXPORT_FAILED: i32 = 300;
    /// Import from the C Data Interface failed.
    pub const IMPORT_FAILED: i32 = 301;
    /// Column index out of range.
    pub const INDEX_OUT_OF_RANGE: i32 = 302;
    /// Malformed schema metadata block.
    pub const INVALID_METADATA: i32 = 303;

    // Query
    /// Query failed.
    pub const QUERY_FAILED: i32 = 400;
    /// SQL parse or planning error.
    pub const SQL_PARSE_ERROR: i32 = 401;
    /// Referenced table is not registered.
    pub const TABLE_NOT_FOUND: i32 = 402;

    // Callback
    /// Scheduling a callback failed.
    pub const CALLBACK_FAILED: i32 = 500;

    // Argument
    /// A required pointer was null.
    pub const NULL_POINTER: i32 = 600;
    /// A string argument was not valid UTF-8.
    pub const INVALID_UTF8: i32 = 601;
    /// An argument was out of its valid range.
    pub const INVALID_ARGUMENT: i32 = 602;

    // Internal
    /// Internal error.
    pub const INTERNAL_ERROR: i32 = 900;
    /// A panic was caught at the boundary.
    pub const PANIC: i32 = 901;
}

/// API error with numeric code for FFI.
///
/// Each error variant includes a numeric code suitable for FFI and a
/// human-readable message.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Context-related error.
    #[error("Context error ({code}): {message}")]
    Context {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Data source error (missing file, unreadable file, registration).
    #[error("Source error ({code}): {message}")]
    Source {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Arrow C Data Interface error.
    #[error("Interchange error ({code}): {message}")]
    Interchange {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Query planning or execution error.
    #[error("Query error ({code}): {message}")]
    Query {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Callback scheduling error.
    #[error("Callback error ({code}): {message}")]
    Callback {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Invalid argument passed across the C boundary.
    #[error("Argument error ({code}): {message}")]
    Argument {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },

    /// Internal error.
    #[error("Internal error ({code}): {message}")]
    Internal {
        /// Numeric error code.
        code: i32,
        /// Error message.
        message: String,
    },
}

impl ApiError {
    /// Get the numeric error code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Context { code, .. }
            | Self::Source { code, .. }
            | Self::Interchange { code, .. }
            | Self::Query { code, .. }
            | Self::Callback { code, .. }
            | Self::Argument { code, .. }
            | Self::Internal { code, .. } => *code,
        }
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Context { message, .. }
            | Self::Source { message, .. }
            | Self::Interchange { message, .. }
            | Self::Query { message, .. }
            | Self::Callback { message, .. }
            | Self::Argument { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    // ---- Constructor helpers ----

    /// Create a context error with default code.
    pub fn context(message: impl Into<String>) -> Self {
        Self::Context {
            code: codes::CONTEXT_FAILED,
            message: message.into(),
        }
    }

    /// Create a "source not found" error for a missing path.
    #[must_use]
    pub fn source_not_found(path: &str) -> Self {
        Self::Source {
            code: codes::SOURCE_NOT_FOUND,
            message: format!("No such file or directory: {path}"),
        }
    }

    /// Create an "unreadable source" error.
    pub fn source_unreadable(message: impl Into<String>) -> Self {
        Self::Source {
            code: codes::SOURCE_UNREADABLE,
            message: message.into(),
        }
    }

    /// Create a source registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Source {
            code: codes::SOURCE_REGISTRATION,
            message: message.into(),
        }
    }

    /// Create an export error.
    pub fn export(message: impl Into<String>) -> Self {
        Self::Interchange {
            code: codes::EXPORT_FAILED,
            message: message.into(),
        }
    }

    /// Create an import error.
    pub fn import(message: impl Into<String>) -> Self {
        Self::Interchange {
            code: codes::IMPORT_FAILED,
            message: message.into(),
        }
    }

    /// Create an "index out of range" error.
    #[must_use]
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::Interchange {
            code: codes::INDEX_OUT_OF_RANGE,
            message: format!("Column index {index} out of range (result has {len} columns)"),
        }
    }

    /// Create a metadata decoding error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::Interchange {
            code: codes::INVALID_METADATA,
            message: message.into(),
        }
    }

    /// Create a query error with default code.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: codes::QUERY_FAILED,
            message: message.into(),
        }
    }

    /// Create a SQL parse error.
    pub fn sql_parse(message: impl Into<String>) -> Self {
        Self::Query {
            code: codes::SQL_PARSE_ERROR,
            message: message.into(),
        }
    }

    /// Create a "table not found" error.
    pub fn table_not_found(message: impl Into<String>) -> Self {
        Self::Query {
            code: codes::TABLE_NOT_FOUND,
            message: message.into(),
        }
    }

    /// Create a callback error with default code.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback {
            code: codes::CALLBACK_FAILED,
            message: message.into(),
        }
    }

    /// Create a null-pointer error naming the offending argument.
    #[must_use]
    pub fn null_pointer(argument: &str) -> Self {
        Self::Argument {
            code: codes::NULL_POINTER,
            message: format!("Null pointer passed for '{argument}'"),
        }
    }

    /// Create an invalid UTF-8 error naming the offending argument.
    #[must_use]
    pub fn invalid_utf8(argument: &str) -> Self {
        Self::Argument {
            code: codes::INVALID_UTF8,
            message: format!("Argument '{argument}' is not valid UTF-8"),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::Argument {
            code: codes::INVALID_ARGUMENT,
            message: message.into(),
        }
    }

    /// Create an internal error with default code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: codes::INTERNAL_ERROR,
            message: message.into(),
        }
    }

    /// Create an error for a panic caught at the boundary.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::Internal {
            code: codes::PANIC,
            message: message.into(),
        }
    }
}

impl From<DataFusionError> for ApiError {
    fn from(e: DataFusionError) -> Self {
        // Context wrappers hide the real cause, classify on the innermost error
        let message = e.to_string();
        match e.find_root() {
            DataFusionError::SQL(..) => Self::sql_parse(message),
            DataFusionError::Plan(msg) if msg.contains("not found") => {
                Self::table_not_found(message)
            }
            DataFusionError::Plan(_) | DataFusionError::SchemaError(..) => {
                Self::sql_parse(message)
            }
            DataFusionError::IoError(_) | DataFusionError::ObjectStore(_) => {
                Self::source_unreadable(message)
            }
            DataFusionError::ArrowError(..) | DataFusionError::ParquetError(_) => {
                Self::source_unreadable(message)
            }
            DataFusionError::NotImplemented(_) | DataFusionError::Execution(_) => {
                Self::query(message)
            }
            _ => Self::internal(message),
        }
    }
}

impl From<ArrowError> for ApiError {
    fn from(e: ArrowError) -> Self {
        match e {
            ArrowError::CDataInterface(msg) => Self::import(msg),
            ArrowError::CsvError(msg) | ArrowError::ParseError(msg) => {
                Self::source_unreadable(msg)
            }
            ArrowError::IoError(msg, _) => Self::source_unreadable(msg),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::source_unreadable(e.to_string())
    }
}
