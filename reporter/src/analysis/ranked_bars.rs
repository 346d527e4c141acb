use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use polars::prelude::*;
use tracing::info;

use crate::helper_functions::humanize_label;
use crate::models::{polars_err, ReportError, ReportResult, STATE_COL};

const CHART_SIZE: (u32, u32) = (1000, 1000);
const MAX_X_TICKS: usize = 25;

/// Stable descending sort by `rank_col`, returned as a new frame. Ties keep
/// their input order and the caller's table is left untouched.
pub fn rank_descending(df: &DataFrame, rank_col: &str) -> ReportResult<DataFrame> {
    if !df.get_column_names().iter().any(|c| c.as_str() == rank_col) {
        return Err(ReportError::SchemaMismatch {
            column: rank_col.to_string(),
        });
    }
    let ranked = df.sort(
        [rank_col],
        SortMultipleOptions::default()
            .with_order_descending(true)
            .with_maintain_order(true),
    )?;
    Ok(ranked)
}

/// Pull a column as f64 values, casting integer counters on the way out.
pub fn column_values(df: &DataFrame, name: &str) -> ReportResult<Vec<f64>> {
    let column = df.column(name).map_err(|_| ReportError::SchemaMismatch {
        column: name.to_string(),
    })?;
    let values = match column.f64() {
        Ok(chunked) => chunked.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        Err(_) => column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(0.0))
            .collect(),
    };
    Ok(values)
}

/// Ranked horizontal bar chart: one bar per state, largest value at the top,
/// plus a vertical reference line marking the scale of a neighbouring metric.
/// Returns the path of the written PNG.
#[allow(clippy::too_many_arguments)]
pub fn render_ranked_bars(
    df: &DataFrame,
    value_col: &str,
    rank_col: &str,
    colour: RGBColor,
    reference_values: &[f64],
    reference_colour: RGBColor,
    out_dir: &Path,
) -> ReportResult<PathBuf> {
    let ranked = rank_descending(df, rank_col)?;

    let states_col = ranked
        .column(STATE_COL)
        .map_err(|_| ReportError::SchemaMismatch {
            column: STATE_COL.to_string(),
        })?
        .str()?;
    let mut states = Vec::with_capacity(ranked.height());
    for i in 0..ranked.height() {
        states.push(states_col.get(i).unwrap_or("").to_string());
    }

    let values = column_values(&ranked, value_col)?;
    let x_max = values.iter().cloned().fold(0.0_f64, f64::max);
    if x_max <= 0.0 {
        // A zero-width axis has no tick step; the chart is skipped instead
        // of rendering a degenerate range.
        return Err(ReportError::EmptyRange {
            column: value_col.to_string(),
        });
    }

    create_dir_all(out_dir).map_err(|e| polars_err(Box::new(e)))?;
    let out_path = out_dir.join(format!("state_{value_col}.png"));

    draw(
        &out_path,
        &states,
        &values,
        x_max,
        value_col,
        colour,
        reference_values,
        reference_colour,
    )?;

    info!(
        "Ranked bar chart for `{}` saved to {}",
        value_col,
        out_path.display()
    );
    Ok(out_path)
}

#[allow(clippy::too_many_arguments)]
fn draw(
    out_path: &Path,
    states: &[String],
    values: &[f64],
    x_max: f64,
    value_col: &str,
    colour: RGBColor,
    reference_values: &[f64],
    reference_colour: RGBColor,
) -> ReportResult<()> {
    let n = states.len();
    let y_top = n as f64 - 0.5;

    let root = BitMapBackend::new(out_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("{} by State", humanize_label(value_col)),
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(140)
        .build_cartesian_2d(0.0..x_max, -0.5..y_top)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(MAX_X_TICKS)
        .y_labels(n)
        .y_label_formatter(&|y: &f64| {
            let idx = y.round() as i64;
            if idx < 0 || idx >= n as i64 {
                return String::new();
            }
            // y counts up from the chart bottom; rank 0 sits at the top.
            states[n - 1 - idx as usize].clone()
        })
        .x_desc(humanize_label(value_col))
        .y_desc("State")
        .label_style(("sans-serif", 14))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .draw_series(values.iter().enumerate().map(|(rank, &value)| {
            let y = (n - 1 - rank) as f64;
            Rectangle::new([(0.0, y - 0.35), (value, y + 0.35)], colour.filled())
        }))
        .map_err(|e| polars_err(Box::new(e)))?;

    // Marks where the next metric in the sequence tops out, so neighbouring
    // charts can be compared on this one's scale.
    let reference = reference_values.iter().cloned().fold(0.0_f64, f64::max);
    chart
        .draw_series(LineSeries::new(
            vec![(reference, -0.5), (reference, y_top)],
            reference_colour.stroke_width(2),
        ))
        .map_err(|e| polars_err(Box::new(e)))?;

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper_functions::read_csv_bytes;

    #[test]
    fn ranking_is_stable_on_ties() {
        let df = read_csv_bytes(b"state,value\nA,10\nB,30\nC,30\nD,5\n").unwrap();
        let ranked = rank_descending(&df, "value").unwrap();

        let states = ranked.column(STATE_COL).unwrap().str().unwrap();
        assert_eq!(states.get(0), Some("B"));
        assert_eq!(states.get(1), Some("C"));
        assert_eq!(states.get(2), Some("A"));
        assert_eq!(states.get(3), Some("D"));

        // The source table keeps its original order.
        let original = df.column(STATE_COL).unwrap().str().unwrap();
        assert_eq!(original.get(0), Some("A"));
    }

    #[test]
    fn all_zero_column_is_empty_range() {
        let df = read_csv_bytes(b"state,value\nA,0\nB,0\n").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let err =
            render_ranked_bars(&df, "value", "value", BLACK, &[], BLACK, dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::EmptyRange { .. }));
    }

    #[test]
    fn chart_file_is_written() {
        let df = read_csv_bytes(b"state,value\nA,10\nB,30\nC,5\n").unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = render_ranked_bars(
            &df,
            "value",
            "value",
            RGBColor(218, 165, 32),
            &[12.0, 4.0],
            BLACK,
            dir.path(),
        )
        .unwrap();

        assert!(path.exists());
        assert_eq!(path.file_name().unwrap(), "state_value.png");
    }
}
