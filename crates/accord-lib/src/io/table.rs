use crate::metrics::rate::AgreementRow;
use crate::pipeline::MatchRow;
use anyhow::Result;
use csv::WriterBuilder;
use serde_json::{json, Map, Value};
use std::io::Write;

pub const MATCH_COLUMNS: [&str; 7] = ["Epoch", "TP", "FN", "FP", "Se", "PPV", "F1"];

/// Column label for one agreement level.
pub fn agreement_column(level: f64) -> String {
    if level.fract() == 0.0 && level.abs() < 1e9 {
        format!("Agreement {}BPM", level as i64)
    } else {
        format!("Agreement {}BPM", level)
    }
}

/// Write a match table as CSV, one row per epoch.
pub fn write_match_csv<W: Write>(writer: W, rows: &[MatchRow]) -> Result<()> {
    let mut csv = WriterBuilder::new().from_writer(writer);
    csv.write_record(MATCH_COLUMNS)?;
    for row in rows {
        csv.write_record(&[
            row.epoch.to_string(),
            row.true_positives.to_string(),
            row.false_negatives.to_string(),
            row.false_positives.to_string(),
            row.sensitivity.to_string(),
            row.ppv.to_string(),
            row.f1.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write an agreement table as CSV, one level column per configured cutoff.
pub fn write_agreement_csv<W: Write>(
    writer: W,
    levels: &[f64],
    rows: &[AgreementRow],
) -> Result<()> {
    let mut csv = WriterBuilder::new().from_writer(writer);
    let mut header = vec!["Epoch".to_string()];
    header.extend(levels.iter().map(|&l| agreement_column(l)));
    csv.write_record(&header)?;
    for row in rows {
        let mut record = vec![row.epoch.to_string()];
        record.extend(row.agreement.iter().map(|v| v.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Agreement rows as labeled JSON objects, one object per epoch.
pub fn agreement_rows_json(levels: &[f64], rows: &[AgreementRow]) -> Value {
    Value::Array(
        rows.iter()
            .map(|row| {
                let mut obj = Map::new();
                obj.insert("Epoch".into(), json!(row.epoch));
                for (&level, &value) in levels.iter().zip(&row.agreement) {
                    obj.insert(agreement_column(level), json!(value));
                }
                Value::Object(obj)
            })
            .collect(),
    )
}
