use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for documap operations.
///
/// Each kind describes a category of failure in the mapping layer. Driver
/// level failures coming back from a [`crate::collection::Collection`] are
/// wrapped as [`ErrorKind::DriverError`] and propagate unchanged otherwise.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Path Errors - raised during atomic path resolution
    /// An atomic insert/delete modifier was requested for a root document.
    /// A root cannot itself be pushed or pulled; this usually means a
    /// referenced association was mistakenly treated as embedded.
    InvalidPath,
    /// An association's declared relation kind does not match the embedding
    /// of the target type (e.g. a referenced relation to an embedded-only
    /// type).
    MixedRelations,

    // Eager Loading Errors
    /// Eager loading was requested for a polymorphic belongs-to association,
    /// which cannot be resolved with a single typed bulk query.
    EagerLoadUnsupported,

    // Mapping Errors
    /// A polymorphic type discriminator is not present in the registry.
    UnknownDiscriminator,
    /// Error mapping raw attributes to/from a document.
    ObjectMappingError,

    // ID and Identity Errors
    /// The provided document id is invalid.
    InvalidId,

    // Operation Errors
    /// The operation is not valid in the current context.
    InvalidOperation,

    // Driver Errors
    /// Error reported by the underlying collection driver.
    DriverError,

    // Generic/Internal Errors - used as fallback
    /// Internal error (usually indicates a bug).
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidPath => write!(f, "Invalid path"),
            ErrorKind::MixedRelations => write!(f, "Mixed relations"),
            ErrorKind::EagerLoadUnsupported => write!(f, "Eager load unsupported"),
            ErrorKind::UnknownDiscriminator => write!(f, "Unknown discriminator"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::DriverError => write!(f, "Driver error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom documap error type.
///
/// `DocumapError` encapsulates the error message, kind, and an optional
/// cause. It supports error chaining and backtraces for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use documap::errors::{DocumapError, ErrorKind, DocumapResult};
///
/// fn example() -> DocumapResult<()> {
///     Err(DocumapError::new("Invalid path", ErrorKind::InvalidPath))
/// }
/// ```
#[derive(Clone)]
pub struct DocumapError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocumapError>>,
    backtrace: Atomic<Backtrace>,
}

impl DocumapError {
    /// Creates a new `DocumapError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocumapError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `DocumapError` with a cause error, preserving the chain
    /// for debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocumapError) -> Self {
        DocumapError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<DocumapError>> {
        self.cause.as_ref()
    }
}

impl Display for DocumapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocumapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for DocumapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for documap operations.
///
/// `DocumapResult<T>` is shorthand for `Result<T, DocumapError>`. All
/// fallible documap operations return this type.
pub type DocumapResult<T> = Result<T, DocumapError>;

impl From<String> for DocumapError {
    fn from(msg: String) -> Self {
        DocumapError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocumapError {
    fn from(msg: &str) -> Self {
        DocumapError::new(msg, ErrorKind::InternalError)
    }
}

impl From<std::num::ParseIntError> for DocumapError {
    fn from(err: std::num::ParseIntError) -> Self {
        DocumapError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidId,
        )
    }
}

impl From<uuid::Error> for DocumapError {
    fn from(err: uuid::Error) -> Self {
        DocumapError::new(&format!("UUID parsing error: {}", err), ErrorKind::InvalidId)
    }
}
