use crate::{
    codec::decimal::{MAX_DECIMAL_PRECISION, encoded_len},
    schema::SchemaError,
};
use combdb_primitives::ColumnKind;
use serde::{Deserialize, Serialize};

///
/// ColumnType
///
/// Declared column type. Cell formats:
/// - `SignedInt` / `UnsignedInt` / `Double`: 8 bytes big-endian
/// - `Decimal`: unscaled value as a 16-byte big-endian `i128`
/// - `String` / `Binary`: raw bytes up to the column's max length
/// - `Date` / `Time` / `DateTime`: canonical ASCII text
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    SignedInt,
    UnsignedInt,
    Double,
    Decimal { precision: u8, scale: u8 },
    String,
    Binary,
    Date,
    Time,
    DateTime,
}

impl ColumnType {
    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::SignedInt => ColumnKind::SignedInt,
            Self::UnsignedInt => ColumnKind::UnsignedInt,
            Self::Double => ColumnKind::Double,
            Self::Decimal { .. } => ColumnKind::Decimal,
            Self::String => ColumnKind::String,
            Self::Binary => ColumnKind::Binary,
            Self::Date => ColumnKind::Date,
            Self::Time => ColumnKind::Time,
            Self::DateTime => ColumnKind::DateTime,
        }
    }
}

///
/// ColumnSchema
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub auto_increment: bool,
    pub max_length: Option<u32>,
}

impl ColumnSchema {
    /// Nullable column without max length or auto-increment.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            auto_increment: false,
            max_length: None,
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyName { what: "column" });
        }

        let kind = self.column_type.kind();
        match (kind.requires_max_length(), self.max_length) {
            (true, None) => {
                return Err(SchemaError::MissingMaxLength {
                    column: self.name.clone(),
                    kind: kind.label(),
                });
            }
            (false, Some(_)) => {
                return Err(SchemaError::UnexpectedMaxLength {
                    column: self.name.clone(),
                    kind: kind.label(),
                });
            }
            _ => {}
        }

        if let ColumnType::Decimal { precision, scale } = self.column_type
            && (precision > MAX_DECIMAL_PRECISION
                || scale > precision
                || encoded_len(precision, scale) == 0)
        {
            return Err(SchemaError::InvalidDecimal {
                column: self.name.clone(),
                precision,
                scale,
            });
        }

        if self.auto_increment && !kind.supports_auto_increment() {
            return Err(SchemaError::AutoIncrementUnsupported {
                column: self.name.clone(),
                kind: kind.label(),
            });
        }

        Ok(())
    }
}
