//! Batched export merging
//!
//! Splits an entity id set into provider-limited batches, issues one export
//! request per batch in input order and stitches the CSV bodies into a
//! single header + rows document.

pub mod merge;
pub mod query;
pub mod record;

use async_trait::async_trait;

pub use merge::{MergedTable, TableMerger};
pub use query::{ExportQuery, GroupBy, MetricSpec, RollUp};
pub use record::MetricRecord;

use crate::error::{Error, Result};

/// A provider able to export one batch of entities.
///
/// `Ok(None)` means the provider reported no content for the batch.
#[async_trait]
pub trait ExportSource: Send + Sync {
    async fn export_batch(&self, ids: &[String], query: &ExportQuery) -> Result<Option<String>>;
}

pub struct BatchedExporter<'a> {
    source: &'a dyn ExportSource,
}

impl<'a> BatchedExporter<'a> {
    pub fn new(source: &'a dyn ExportSource) -> Self {
        Self { source }
    }

    /// Export `ids` in batches of `batch_size`.
    ///
    /// Empty batches (no content, or a per-batch [`Error::NoData`]) are
    /// skipped. Fails with [`Error::NoData`] only when no batch produced a
    /// header. Any other error aborts the export.
    pub async fn export(&self, ids: &[String], query: &ExportQuery, batch_size: usize) -> Result<MergedTable> {
        if batch_size == 0 {
            return Err(Error::validation("batch_size must be greater than 0"));
        }

        let total_batches = ids.len().div_ceil(batch_size);
        let mut merger = TableMerger::new();

        for (idx, batch) in ids.chunks(batch_size).enumerate() {
            let batch_num = idx + 1;
            log::info!(
                "[export] Batch {}/{}: {} {} ids ({}, {})",
                batch_num,
                total_batches,
                batch.len(),
                query.group_by,
                query.roll_up,
                query.range
            );

            let body = match self.source.export_batch(batch, query).await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    log::warn!("[export] No data for batch {}/{}", batch_num, total_batches);
                    continue;
                }
                Err(e) if e.is_no_data() => {
                    log::warn!("[export] Batch {}/{}: {}", batch_num, total_batches, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let rows = merger.push(batch_num, &body)?;
            log::info!("[export] Batch {}/{} returned {} rows", batch_num, total_batches, rows);
        }

        let table = merger.finish()?;
        log::info!(
            "[export] Merged {} rows from {} batches",
            table.row_count(),
            total_batches
        );
        Ok(table)
    }
}
