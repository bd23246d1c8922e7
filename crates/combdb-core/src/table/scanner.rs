use crate::{
    error::{ErrorOrigin, InternalError},
    kv::{KvScan, display_key},
    mutation::PAYLOAD_QUALIFIER,
    obs::sink::{self, MetricsEvent},
    row::Row,
    schema::TableSchema,
};
use std::sync::Arc;

///
/// Scanner
///
/// Iterator over the rows of one scan range. Every item is decoded from the
/// payload stored on the entry; a missing or undecodable payload surfaces as
/// an error item rather than ending the scan early.
///

pub struct Scanner<'a> {
    inner: KvScan<'a>,
    schema: Arc<TableSchema>,
    table_id: u64,
    max_row_bytes: usize,
    metrics: bool,
    rows: u64,
}

impl<'a> Scanner<'a> {
    pub(crate) const fn new(
        inner: KvScan<'a>,
        schema: Arc<TableSchema>,
        table_id: u64,
        max_row_bytes: usize,
        metrics: bool,
    ) -> Self {
        Self {
            inner,
            schema,
            table_id,
            max_row_bytes,
            metrics,
            rows: 0,
        }
    }

    fn decode(&self, key: &[u8], payload: Option<&[u8]>) -> Result<Row, InternalError> {
        let payload = payload.ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Table,
                format!("entry {} has no row payload", display_key(key)),
            )
        })?;
        let mut row = Row::from_payload(payload, self.max_row_bytes)?;

        // Cells of dropped columns stay in old payloads until rewritten.
        row.retain_columns(&self.schema);

        Ok(row)
    }
}

impl Iterator for Scanner<'_> {
    type Item = Result<Row, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.inner.next()? {
            Ok(entry) => self.decode(&entry.key, entry.value(PAYLOAD_QUALIFIER)),
            Err(err) => Err(err.into()),
        };
        if item.is_ok() {
            self.rows += 1;
        }

        Some(item)
    }
}

impl Drop for Scanner<'_> {
    fn drop(&mut self) {
        if self.rows > 0 {
            sink::record_if(
                self.metrics,
                MetricsEvent::RowsScanned {
                    table_id: self.table_id,
                    rows: self.rows,
                },
            );
        }
    }
}
