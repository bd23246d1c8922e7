use crate::{
    MAX_COLUMNS,
    schema::{ColumnSchema, IndexSchema, SchemaError},
};
use serde::{Deserialize, Serialize};

///
/// TableSchema
///
/// Ordered columns plus the indices defined over them. Column ids and index
/// ids are not part of the schema; the metadata store keeps them in separate
/// name→id maps.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    pub indices: Vec<IndexSchema>,
}

impl TableSchema {
    #[must_use]
    pub const fn new(columns: Vec<ColumnSchema>) -> Self {
        Self {
            columns,
            indices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexSchema) -> Self {
        self.indices.push(index);
        self
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indices.iter().find(|i| i.name == name)
    }

    /// Return the auto-increment column, if one is declared.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Resolve an index's member columns in member order.
    pub fn index_columns(&self, index: &IndexSchema) -> Result<Vec<&ColumnSchema>, SchemaError> {
        index
            .columns
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| SchemaError::IndexUnknownColumn {
                        index: index.name.clone(),
                        column: name.clone(),
                    })
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns);
        }
        if self.columns.len() > MAX_COLUMNS {
            return Err(SchemaError::TooManyColumns {
                count: self.columns.len(),
                max: MAX_COLUMNS,
            });
        }

        for (i, column) in self.columns.iter().enumerate() {
            column.validate()?;
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }
        if self.columns.iter().filter(|c| c.auto_increment).count() > 1 {
            return Err(SchemaError::MultipleAutoIncrement);
        }

        for (i, index) in self.indices.iter().enumerate() {
            self.validate_index(index)?;
            if self.indices[..i].iter().any(|other| other.name == index.name) {
                return Err(SchemaError::DuplicateIndex(index.name.clone()));
            }
        }

        Ok(())
    }

    /// Check an index against this table's columns.
    pub fn validate_index(&self, index: &IndexSchema) -> Result<(), SchemaError> {
        index.validate()?;
        self.index_columns(index)?;

        Ok(())
    }

    /// Add an index definition, rejecting duplicates.
    pub fn add_index(&mut self, index: IndexSchema) -> Result<(), SchemaError> {
        if self.index(&index.name).is_some() {
            return Err(SchemaError::DuplicateIndex(index.name));
        }
        self.validate_index(&index)?;
        self.indices.push(index);

        Ok(())
    }

    pub fn remove_index(&mut self, name: &str) -> Result<IndexSchema, SchemaError> {
        let pos = self
            .indices
            .iter()
            .position(|i| i.name == name)
            .ok_or_else(|| SchemaError::UnknownIndex(name.to_string()))?;

        Ok(self.indices.remove(pos))
    }

    pub fn add_column(&mut self, column: ColumnSchema) -> Result<(), SchemaError> {
        column.validate()?;
        if self.column(&column.name).is_some() {
            return Err(SchemaError::DuplicateColumn(column.name));
        }
        if column.auto_increment && self.auto_increment_column().is_some() {
            return Err(SchemaError::MultipleAutoIncrement);
        }
        if self.columns.len() >= MAX_COLUMNS {
            return Err(SchemaError::TooManyColumns {
                count: self.columns.len() + 1,
                max: MAX_COLUMNS,
            });
        }
        self.columns.push(column);

        Ok(())
    }

    /// Remove a column no index references.
    pub fn remove_column(&mut self, name: &str) -> Result<ColumnSchema, SchemaError> {
        if let Some(index) = self.indices.iter().find(|i| i.contains(name)) {
            return Err(SchemaError::ColumnIndexed {
                column: name.to_string(),
                index: index.name.clone(),
            });
        }
        if self.columns.len() == 1 && self.columns[0].name == name {
            return Err(SchemaError::NoColumns);
        }

        let pos = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| SchemaError::UnknownColumn(name.to_string()))?;

        Ok(self.columns.remove(pos))
    }
}

///
/// TESTS
///
