use crate::{MAX_INDEX_COLUMNS, schema::SchemaError};
use serde::{Deserialize, Serialize};

///
/// IndexSchema
///
/// Named, ordered list of member columns. Member order is the key order of
/// both physical index spaces.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IndexSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexSchema {
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Structural checks that do not need the owning table.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyName { what: "index" });
        }
        if self.columns.is_empty() || self.columns.len() > MAX_INDEX_COLUMNS {
            return Err(SchemaError::IndexWidth {
                index: self.name.clone(),
                max: MAX_INDEX_COLUMNS,
            });
        }

        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(column) {
                return Err(SchemaError::DuplicateIndexColumn {
                    index: self.name.clone(),
                    column: column.clone(),
                });
            }
        }

        Ok(())
    }
}
