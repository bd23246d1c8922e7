use crate::kv::KvError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every fallible path in the engine ends up here, either directly through
/// one of the constructors below or through a module-local error enum.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError without structured detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a precondition violation (caller bug, never retried).
    pub(crate) fn precondition(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Precondition, origin, message)
    }

    /// Construct a not-found error for a specific origin.
    pub(crate) fn not_found(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, origin, message)
    }

    pub(crate) fn already_exists(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::AlreadyExists, origin, message)
    }

    /// Construct a concurrent-modification error.
    pub(crate) fn conflict(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Conflict, origin, message)
    }

    /// Construct a domain error raised while encoding a value.
    pub(crate) fn domain(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Domain, origin, message)
    }

    /// Construct a corruption error for a specific origin.
    pub(crate) fn corruption(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, origin, message)
    }

    /// Construct a metadata-origin not-found error for a table name.
    pub(crate) fn table_not_found(name: &str) -> Self {
        Self::not_found(ErrorOrigin::Metadata, format!("table not found: '{name}'"))
    }

    /// Construct a metadata-origin not-found error for a table id.
    pub(crate) fn table_id_not_found(table_id: u64) -> Self {
        Self::not_found(
            ErrorOrigin::Metadata,
            format!("no schema stored for table id {table_id}"),
        )
    }

    pub(crate) fn index_not_found(table_id: u64, index: &str) -> Self {
        Self::not_found(
            ErrorOrigin::Metadata,
            format!("index '{index}' not found on table id {table_id}"),
        )
    }

    pub(crate) fn row_not_found(table_id: u64, row: impl fmt::Display) -> Self {
        Self::not_found(
            ErrorOrigin::Table,
            format!("row {row} not found in table id {table_id}"),
        )
    }

    /// Construct a schema-blob compare-and-swap failure.
    pub(crate) fn schema_conflict(table_id: u64) -> Self {
        Self::conflict(
            ErrorOrigin::Metadata,
            format!("schema for table id {table_id} was modified concurrently"),
        )
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self.class, ErrorClass::Conflict)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Kv(KvError),
}

impl From<KvError> for InternalError {
    fn from(err: KvError) -> Self {
        let class = match err {
            KvError::Io { .. } => ErrorClass::Io,
            KvError::CounterCorrupt { .. } => ErrorClass::Corruption,
        };

        Self {
            class,
            origin: ErrorOrigin::Kv,
            message: err.to_string(),
            detail: Some(ErrorDetail::Kv(err)),
        }
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    Precondition,
    NotFound,
    AlreadyExists,
    Conflict,
    Domain,
    Corruption,
    Io,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Precondition => "precondition",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::Conflict => "conflict",
            Self::Domain => "domain",
            Self::Corruption => "corruption",
            Self::Io => "io",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Codec,
    Key,
    Index,
    Mutation,
    Metadata,
    Cache,
    Table,
    Store,
    Kv,
    Serialize,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Codec => "codec",
            Self::Key => "key",
            Self::Index => "index",
            Self::Mutation => "mutation",
            Self::Metadata => "metadata",
            Self::Cache => "cache",
            Self::Table => "table",
            Self::Store => "store",
            Self::Kv => "kv",
            Self::Serialize => "serialize",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
