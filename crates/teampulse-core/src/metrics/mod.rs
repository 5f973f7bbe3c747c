//! Metric pipelines
//!
//! Each pipeline composes the provider clients, the exporter, the period
//! bucketers and the aggregator into one report value. Writing the report
//! anywhere is left to the caller.

pub mod cycle_time;
pub mod incidents;
pub mod lead_time;
pub mod tech_debt;
pub mod tech_module;

use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize `rows` as CSV with a header line; an empty slice yields ""
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::internal(format!("CSV buffer: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::internal(format!("CSV encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "Issue Key")]
        key: &'static str,
        pct: f64,
    }

    #[test]
    fn test_to_csv_uses_serde_names() {
        let csv = to_csv(&[Row { key: "ENG-1", pct: 62.5 }, Row { key: "ENG-2", pct: 50.0 }]).unwrap();
        assert_eq!(csv, "Issue Key,pct\nENG-1,62.5\nENG-2,50.0\n");
    }

    #[test]
    fn test_to_csv_empty() {
        assert_eq!(to_csv::<Row>(&[]).unwrap(), "");
    }
}
