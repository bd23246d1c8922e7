#[macro_use]
mod macros;

///
/// ColumnKind
///
/// Canonical column type tag shared by the schema, codec and key layers.
/// Parameters such as decimal precision live on the schema, not here.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ColumnKind {
    SignedInt,
    UnsignedInt,
    Double,
    Decimal,
    String,
    Binary,
    Date,
    Time,
    DateTime,
}

impl ColumnKind {
    /// Return the full metadata descriptor for one column kind.
    #[must_use]
    pub const fn metadata(self) -> ColumnMetadata {
        column_kind_registry!(metadata_from_registry, self)
    }

    /// Stable lowercase label used in messages and serialized schemas.
    #[must_use]
    pub const fn label(self) -> &'static str {
        self.metadata().label
    }

    /// Width in bytes of a stored cell, when fixed.
    #[must_use]
    pub const fn cell_width(self) -> Option<usize> {
        self.metadata().cell_width
    }

    /// Return whether the column must declare a maximum byte length.
    #[must_use]
    pub const fn requires_max_length(self) -> bool {
        self.metadata().requires_max_length
    }

    #[must_use]
    pub const fn supports_auto_increment(self) -> bool {
        self.metadata().supports_auto_increment
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

///
/// ColumnMetadata
///
/// Static capability metadata for one column kind.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnMetadata {
    pub label: &'static str,
    pub cell_width: Option<usize>,
    pub requires_max_length: bool,
    pub supports_auto_increment: bool,
}

/// Ordered list of all column kinds in registry order.
pub const ALL_COLUMN_KINDS: [ColumnKind; 9] = column_kind_registry!(all_kinds_from_registry);

///
/// TESTS
///
