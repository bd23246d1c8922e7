use combdb_core::error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    /// Whether retrying after re-reading metadata may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Conflict)
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class.into(), err.origin.into(), err.message)
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
    /// The caller passed something the schema or key layout rejects.
    Invalid,

    /// A value does not fit its column type.
    Domain,

    NotFound,
    AlreadyExists,

    /// Metadata changed underneath the operation.
    Conflict,

    /// Stored bytes could not be decoded.
    Corruption,

    /// The backing store failed.
    Unavailable,

    /// The caller cannot remediate this.
    Internal,
}

impl From<ErrorClass> for ErrorKind {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::Precondition => Self::Invalid,
            ErrorClass::Domain => Self::Domain,
            ErrorClass::NotFound => Self::NotFound,
            ErrorClass::AlreadyExists => Self::AlreadyExists,
            ErrorClass::Conflict => Self::Conflict,
            ErrorClass::Corruption => Self::Corruption,
            ErrorClass::Io => Self::Unavailable,
            ErrorClass::Internal => Self::Internal,
        }
    }
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Config,
    Index,
    Metadata,
    Store,
    Table,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Codec | CoreErrorOrigin::Key | CoreErrorOrigin::Serialize => {
                Self::Codec
            }
            CoreErrorOrigin::Config => Self::Config,
            CoreErrorOrigin::Index | CoreErrorOrigin::Mutation => Self::Index,
            CoreErrorOrigin::Metadata | CoreErrorOrigin::Cache => Self::Metadata,
            CoreErrorOrigin::Store | CoreErrorOrigin::Kv => Self::Store,
            CoreErrorOrigin::Table => Self::Table,
        }
    }
}

///
/// TESTS
///
