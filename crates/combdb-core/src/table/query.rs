use crate::row::Records;

///
/// QueryType
///
/// Position of an index read relative to the query key.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryType {
    /// Rows equal to the key.
    ExactKey,
    /// Rows strictly greater, ascending.
    AfterKey,
    /// Rows greater than or equal, ascending.
    KeyOrNext,
    /// Rows less than or equal, descending.
    KeyOrPrevious,
    /// Rows strictly less, descending.
    BeforeKey,
    /// The whole index, ascending.
    IndexFirst,
    /// The whole index, descending.
    IndexLast,
}

impl QueryType {
    /// Whether this query reads the descending index space.
    #[must_use]
    pub const fn is_descending(self) -> bool {
        matches!(self, Self::KeyOrPrevious | Self::BeforeKey | Self::IndexLast)
    }

    /// Whether the key values are ignored.
    #[must_use]
    pub const fn is_full(self) -> bool {
        matches!(self, Self::IndexFirst | Self::IndexLast)
    }
}

///
/// QueryKey
///
/// Index name, query type and a partial map of member column values. Only a
/// leading run of members may be set.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryKey {
    pub index_name: String,
    pub query_type: QueryType,
    pub keys: Records,
}

impl QueryKey {
    #[must_use]
    pub fn new(index_name: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            index_name: index_name.into(),
            query_type,
            keys: Records::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Vec<u8>>) -> Self {
        self.keys.insert(column.into(), Some(cell.into()));
        self
    }

    /// Match NULL for this member.
    #[must_use]
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.keys.insert(column.into(), None);
        self
    }
}
