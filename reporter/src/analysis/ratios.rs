use std::collections::HashSet;

use log::{info, warn};
use polars::prelude::*;

use crate::models::{OrderBy, RatioMetric, ReportError, ReportResult, STATE_COL};

/// Ratio of two counter columns for one state.
///
/// The unified table joins to exactly one row per state, so "first match
/// wins" only matters for malformed input; taking it keeps the result
/// deterministic rather than fixing a case valid data never produces.
pub fn compute_ratio(
    df: &DataFrame,
    state: &str,
    numerator_col: &str,
    denominator_col: &str,
) -> ReportResult<f64> {
    let states = column_str(df, STATE_COL)?;
    let numerators = column_f64(df, numerator_col)?;
    let denominators = column_f64(df, denominator_col)?;

    for i in 0..df.height() {
        if states.get(i) != Some(state) {
            continue;
        }
        let numerator = numerators.get(i).unwrap_or(0.0);
        let denominator = denominators.get(i).unwrap_or(0.0);
        if denominator == 0.0 {
            return Err(ReportError::UndefinedRatio {
                state: state.to_string(),
                denominator: denominator_col.to_string(),
            });
        }
        return Ok(numerator / denominator);
    }

    Err(ReportError::Table(PolarsError::ComputeError(
        format!("state {state} not present in unified table").into(),
    )))
}

/// Display form of a ratio: `round(ratio * 100, 3)` with a percent sign.
/// Kept separate from the computation so tables and reports share one
/// ratio code path.
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", (ratio * 100_000.0).round() / 1000.0)
}

/// One row per state, one column per metric, ordered by explicit policy.
///
/// A zero denominator leaves a null cell rather than dropping the state or
/// inventing a value; the gap is logged.
pub fn build_ratio_table(
    df: &DataFrame,
    metrics: &[RatioMetric],
    order_by: OrderBy,
) -> ReportResult<DataFrame> {
    let ordered = apply_order(df, order_by)?;
    let states_col = column_str(&ordered, STATE_COL)?;

    // Distinct state names, in table order.
    let mut seen = HashSet::new();
    let mut states: Vec<String> = Vec::new();
    for i in 0..ordered.height() {
        if let Some(state) = states_col.get(i) {
            if seen.insert(state.to_string()) {
                states.push(state.to_string());
            }
        }
    }

    let mut columns = vec![Column::from(Series::new(
        PlSmallStr::from(STATE_COL),
        states.clone(),
    ))];

    for metric in metrics {
        let mut values: Vec<Option<f64>> = Vec::with_capacity(states.len());
        for state in &states {
            match compute_ratio(&ordered, state, metric.numerator, metric.denominator) {
                Ok(ratio) => values.push(Some(ratio)),
                Err(ReportError::UndefinedRatio { state, denominator }) => {
                    warn!(
                        "{} undefined for {state}: zero `{denominator}`, leaving the cell empty",
                        metric.name
                    );
                    values.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        columns.push(Column::from(Series::new(
            PlSmallStr::from(metric.name),
            values,
        )));
    }

    Ok(DataFrame::new(columns)?)
}

/// Pure reordering; the input table is never mutated.
pub fn apply_order(df: &DataFrame, order_by: OrderBy) -> ReportResult<DataFrame> {
    let ordered = match order_by {
        OrderBy::FirstSeen => df.clone(),
        OrderBy::Alphabetical => df.sort(
            [STATE_COL],
            SortMultipleOptions::default().with_maintain_order(true),
        )?,
        OrderBy::ByPopulation => df.sort(
            ["population"],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )?,
    };
    Ok(ordered)
}

/// Count / mean / std / min / max per metric column, for the run log.
pub fn describe(ratio_table: &DataFrame, metrics: &[RatioMetric]) -> ReportResult<()> {
    for metric in metrics {
        let values: Vec<f64> = column_f64(ratio_table, metric.name)?
            .into_iter()
            .flatten()
            .collect();

        let count = values.len();
        if count == 0 {
            info!("{:>16}  no defined values", metric.name);
            continue;
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let std = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        info!(
            "{:>16}  count {:>3}  mean {:.5}  std {:.5}  min {:.5}  max {:.5}",
            metric.name, count, mean, std, min, max
        );
    }
    Ok(())
}

fn column_str<'a>(df: &'a DataFrame, name: &str) -> ReportResult<&'a StringChunked> {
    df.column(name)
        .map_err(|_| ReportError::SchemaMismatch {
            column: name.to_string(),
        })?
        .str()
        .map_err(ReportError::from)
}

fn column_f64(df: &DataFrame, name: &str) -> ReportResult<Float64Chunked> {
    let column = df.column(name).map_err(|_| ReportError::SchemaMismatch {
        column: name.to_string(),
    })?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.clone())
}
