use crate::io::table::agreement_column;
use crate::metrics::rate::AgreementRow;
use crate::pipeline::MatchRow;
use anyhow::Result;
use polars::prelude::*;

/// Match table as a DataFrame, one row per epoch.
pub fn match_frame(rows: &[MatchRow]) -> Result<DataFrame> {
    let df = df!(
        "Epoch" => rows.iter().map(|r| r.epoch as u32).collect::<Vec<_>>(),
        "TP" => rows.iter().map(|r| r.true_positives as u32).collect::<Vec<_>>(),
        "FN" => rows.iter().map(|r| r.false_negatives as u32).collect::<Vec<_>>(),
        "FP" => rows.iter().map(|r| r.false_positives as u32).collect::<Vec<_>>(),
        "Se" => rows.iter().map(|r| r.sensitivity).collect::<Vec<_>>(),
        "PPV" => rows.iter().map(|r| r.ppv).collect::<Vec<_>>(),
        "F1" => rows.iter().map(|r| r.f1).collect::<Vec<_>>(),
    )?;
    Ok(df)
}

/// Agreement table as a DataFrame, one level column per configured cutoff.
pub fn agreement_frame(levels: &[f64], rows: &[AgreementRow]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(levels.len() + 1);
    columns.push(Column::new(
        "Epoch".into(),
        rows.iter().map(|r| r.epoch as u32).collect::<Vec<_>>(),
    ));
    for (j, &level) in levels.iter().enumerate() {
        let values: Vec<f64> = rows
            .iter()
            .map(|r| r.agreement.get(j).copied().unwrap_or(f64::NAN))
            .collect();
        columns.push(Column::new(agreement_column(level).into(), values));
    }
    Ok(DataFrame::new(columns)?)
}
