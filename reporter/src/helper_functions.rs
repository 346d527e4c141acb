use std::fs;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use plotters::style::RGBColor;
use polars::prelude::*;
use serde_json::json;
use tracing::info;

use crate::models::{polars_err, RatioMetric, ReportResult};

pub fn read_csv(file_path: &str) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

/// Parse a CSV body already held in memory (fetched feeds, fixtures).
pub fn read_csv_bytes(body: &[u8]) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(body.to_vec()))
        .finish()
}

pub fn dataframe_to_csv(df: &mut DataFrame, path: &Path) -> ReportResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!("Table written to {}", path.display());
    Ok(())
}

/// Fixed colour per counter column, matching across bars and reference lines.
pub fn colour_for_column(column: &str) -> RGBColor {
    match column {
        "population" => RGBColor(0, 0, 0),
        "infections" => RGBColor(218, 165, 32), // goldenrod
        "deaths" => RGBColor(139, 0, 0),        // dark red
        _ => RGBColor(0, 119, 182),
    }
}

/// `confirmed_cases` -> `Confirmed Cases`, for axis descriptions.
pub fn humanize_label(column: &str) -> String {
    column
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Record what a run consumed and produced next to its outputs.
pub fn write_run_manifest(
    path: &Path,
    feed_url: &str,
    census_path: &Path,
    metrics: &[RatioMetric],
    figures: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = json!({
        "sources": {
            "counts": feed_url,
            "census": census_path.to_string_lossy(),
        },
        "metrics": serde_json::to_value(metrics)?,
        "figures": figures
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
    });

    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}
