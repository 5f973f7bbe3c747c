//! Stitching per-batch CSV responses into one document

use std::collections::BTreeMap;

use super::query::GroupBy;
use super::record::MetricRecord;
use crate::error::{Error, Result};

/// Accumulates batch bodies: header from the first non-empty batch, data
/// rows appended verbatim in arrival order.
#[derive(Debug, Default)]
pub struct TableMerger {
    header: Option<String>,
    rows: Vec<String>,
    non_empty_batches: usize,
}

impl TableMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch body, returning how many data rows it contributed.
    ///
    /// A header that differs from the captured one fails with
    /// [`Error::SchemaMismatch`]; rows are never merged under the wrong columns.
    pub fn push(&mut self, batch: usize, body: &str) -> Result<usize> {
        let mut lines = body.trim().lines().map(|l| l.trim_end_matches('\r'));

        let header = match lines.next() {
            Some(h) if !h.trim().is_empty() => h,
            _ => return Ok(0),
        };

        match &self.header {
            None => self.header = Some(header.to_string()),
            Some(expected) if expected != header => {
                return Err(Error::SchemaMismatch {
                    batch,
                    expected: expected.clone(),
                    found: header.to_string(),
                })
            }
            Some(_) => {}
        }

        let before = self.rows.len();
        self.rows
            .extend(lines.filter(|l| !l.trim().is_empty()).map(str::to_string));
        self.non_empty_batches += 1;
        Ok(self.rows.len() - before)
    }

    pub fn non_empty_batches(&self) -> usize {
        self.non_empty_batches
    }

    /// The merged document, or [`Error::NoData`] when no batch had a header
    pub fn finish(self) -> Result<MergedTable> {
        match self.header {
            Some(header) => Ok(MergedTable {
                header,
                rows: self.rows,
            }),
            None => Err(Error::no_data("No data available for the specified date range")),
        }
    }
}

/// Header line plus concatenated data lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTable {
    pub header: String,
    pub rows: Vec<String>,
}

impl MergedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Newline-joined document with no per-batch markers
    pub fn to_csv_string(&self) -> String {
        std::iter::once(self.header.as_str())
            .chain(self.rows.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn columns(&self) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(self.header.as_bytes());
        match reader.records().next() {
            Some(record) => Ok(record?.iter().map(|c| c.trim().to_string()).collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Parsed cells: the column names and one vector per data row
    pub fn cells(&self) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let text = self.to_csv_string();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader.headers()?.iter().map(|c| c.trim().to_string()).collect();
        let mut rows = Vec::with_capacity(self.rows.len());
        for record in reader.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok((columns, rows))
    }

    /// Each data row keyed by column name
    pub fn row_maps(&self) -> Result<Vec<BTreeMap<String, String>>> {
        let (columns, rows) = self.cells()?;
        Ok(rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect())
    }

    /// One normalized record per data row
    pub fn records(&self, group_by: GroupBy) -> Result<Vec<MetricRecord>> {
        let (columns, rows) = self.cells()?;
        Ok(rows
            .iter()
            .map(|row| MetricRecord::from_row(&columns, row, group_by))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_from_first_non_empty_batch() {
        let mut merger = TableMerger::new();
        assert_eq!(merger.push(1, "").unwrap(), 0);
        assert_eq!(merger.push(2, "team_id,value\n1,10\n2,20\n").unwrap(), 2);
        assert_eq!(merger.push(3, "team_id,value\r\n3,30\r\n\r\n").unwrap(), 1);

        let table = merger.finish().unwrap();
        assert_eq!(table.header, "team_id,value");
        assert_eq!(table.to_csv_string(), "team_id,value\n1,10\n2,20\n3,30");
    }

    #[test]
    fn test_header_only_batch_counts_as_non_empty() {
        let mut merger = TableMerger::new();
        assert_eq!(merger.push(1, "team_id,value").unwrap(), 0);
        assert_eq!(merger.non_empty_batches(), 1);
        assert_eq!(merger.finish().unwrap().row_count(), 0);
    }

    #[test]
    fn test_schema_mismatch_fails() {
        let mut merger = TableMerger::new();
        merger.push(1, "team_id,a\n1,2").unwrap();
        let err = merger.push(2, "team_id,b\n3,4").unwrap_err();
        match err {
            Error::SchemaMismatch { batch, expected, found } => {
                assert_eq!(batch, 2);
                assert_eq!(expected, "team_id,a");
                assert_eq!(found, "team_id,b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_header_is_no_data() {
        let mut merger = TableMerger::new();
        merger.push(1, "\n\n").unwrap();
        assert!(merger.finish().unwrap_err().is_no_data());
    }

    #[test]
    fn test_row_maps_handle_quoted_cells() {
        let table = MergedTable {
            header: "team_id,team_name".to_string(),
            rows: vec!["1,\"Payments, EU\"".to_string()],
        };
        let maps = table.row_maps().unwrap();
        assert_eq!(maps[0]["team_name"], "Payments, EU");
        assert_eq!(table.columns().unwrap(), vec!["team_id", "team_name"]);
    }
}
