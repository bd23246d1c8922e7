use crate::{
    codec::{SortOrder, ValueEncodeError, decode_value, encode_value, encoded_width},
    error::{ErrorOrigin, InternalError},
    key::{IndexKey, RowKey},
    row::{RowId, Records},
    schema::{ColumnSchema, IndexSchema, TableSchema},
};

// Segment markers. Ascending: NULL first. Descending: NULL last, so the
// descending space is the exact reverse of the ascending one.
const ASC_NULL: u8 = 0x00;
const ASC_PRESENT: u8 = 0x01;
const DESC_PRESENT: u8 = 0x00;
const DESC_NULL: u8 = 0x01;

///
/// IndexRowKeyBuilder
///
/// Composes an index row key from ids, direction, optional row id and an
/// optional value source. Every `with_*` consumes the builder and returns a
/// new one; nothing is shared between builders.
///
/// Two value sources exist:
/// - a row (`with_row`): every member column is encoded, and a member the
///   row does not carry is an explicit NULL
/// - a query (`with_query`): the leading members present in the query map
///   are encoded, producing a prefix for range scans
///

#[derive(Clone, Debug)]
pub struct IndexRowKeyBuilder<'a> {
    table_id: u64,
    index_id: u64,
    order: SortOrder,
    row_id: Option<RowId>,
    source: Option<ValueSource<'a>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SourceMode {
    Row,
    Query,
}

#[derive(Clone, Debug)]
struct ValueSource<'a> {
    mode: SourceMode,
    records: &'a Records,
    index: &'a IndexSchema,
    schema: &'a TableSchema,
}

impl<'a> IndexRowKeyBuilder<'a> {
    #[must_use]
    pub const fn new(table_id: u64, index_id: u64) -> Self {
        Self {
            table_id,
            index_id,
            order: SortOrder::Ascending,
            row_id: None,
            source: None,
        }
    }

    #[must_use]
    pub const fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn with_row_id(mut self, row_id: RowId) -> Self {
        self.row_id = Some(row_id);
        self
    }

    /// Take member values from a full row image.
    #[must_use]
    pub const fn with_row(
        mut self,
        records: &'a Records,
        index: &'a IndexSchema,
        schema: &'a TableSchema,
    ) -> Self {
        self.source = Some(ValueSource {
            mode: SourceMode::Row,
            records,
            index,
            schema,
        });
        self
    }

    /// Take member values from a partial query key.
    #[must_use]
    pub const fn with_query(
        mut self,
        keys: &'a Records,
        index: &'a IndexSchema,
        schema: &'a TableSchema,
    ) -> Self {
        self.source = Some(ValueSource {
            mode: SourceMode::Query,
            records: keys,
            index,
            schema,
        });
        self
    }

    pub fn build(&self) -> Result<RowKey, InternalError> {
        let values = match &self.source {
            Some(source) => encode_source(source, self.order)?,
            None => Vec::new(),
        };

        Ok(RowKey::index(
            self.order,
            IndexKey {
                table_id: self.table_id,
                index_id: self.index_id,
                values,
                row_id: self.row_id,
            },
        ))
    }
}

fn encode_source(source: &ValueSource<'_>, order: SortOrder) -> Result<Vec<u8>, InternalError> {
    let columns = source.schema.index_columns(source.index)?;
    let mut out = Vec::new();
    let mut gap: Option<&str> = None;

    for column in columns {
        let cell = match (source.mode, source.records.get(&column.name)) {
            (_, Some(Some(cell))) => Some(cell.as_slice()),
            (SourceMode::Row, _) | (SourceMode::Query, Some(None)) => None,
            (SourceMode::Query, None) => {
                gap.get_or_insert(column.name.as_str());
                continue;
            }
        };

        if let Some(missing) = gap {
            return Err(InternalError::precondition(
                ErrorOrigin::Index,
                format!(
                    "query on index '{}' sets '{}' but skips earlier member '{missing}'",
                    source.index.name, column.name
                ),
            ));
        }

        push_segment(&mut out, column, cell, order)?;
    }

    Ok(out)
}

/// Append one member segment: a NULL marker, or a present marker followed by
/// the encoded value.
pub fn push_segment(
    out: &mut Vec<u8>,
    column: &ColumnSchema,
    cell: Option<&[u8]>,
    order: SortOrder,
) -> Result<(), ValueEncodeError> {
    match (cell, order) {
        (None, SortOrder::Ascending) => out.push(ASC_NULL),
        (None, SortOrder::Descending) => out.push(DESC_NULL),
        (Some(cell), _) => {
            let encoded = encode_value(column, cell, order)?;
            out.push(match order {
                SortOrder::Ascending => ASC_PRESENT,
                SortOrder::Descending => DESC_PRESENT,
            });
            out.extend_from_slice(&encoded);
        }
    }

    Ok(())
}

/// Split an index key's value bytes back into member cells.
pub fn decode_index_values(
    values: &[u8],
    columns: &[&ColumnSchema],
    order: SortOrder,
) -> Result<Vec<Option<Vec<u8>>>, InternalError> {
    let (null, present) = match order {
        SortOrder::Ascending => (ASC_NULL, ASC_PRESENT),
        SortOrder::Descending => (DESC_NULL, DESC_PRESENT),
    };

    let mut rest = values;
    let mut cells = Vec::with_capacity(columns.len());
    for column in columns {
        let corrupt = || {
            InternalError::corruption(
                ErrorOrigin::Index,
                format!("index segment for column '{}' is malformed", column.name),
            )
        };

        let (&marker, tail) = rest.split_first().ok_or_else(corrupt)?;
        if marker == null {
            cells.push(None);
            rest = tail;
        } else if marker == present {
            let width = encoded_width(column)?;
            if tail.len() < width {
                return Err(corrupt());
            }
            cells.push(Some(decode_value(column, &tail[..width], order)?));
            rest = &tail[width..];
        } else {
            return Err(corrupt());
        }
    }

    if !rest.is_empty() {
        return Err(InternalError::corruption(
            ErrorOrigin::Index,
            format!("{} trailing bytes after index values", rest.len()),
        ));
    }

    Ok(cells)
}
