use std::time::Duration;

use anyhow::Context;
use polars::prelude::*;
use tracing::{debug, error, info};

use crate::helper_functions::{read_csv, read_csv_bytes};
use crate::models::{Dataset, ReportError, ReportResult, STATE_COL};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Live per-state case/death feed (NYT covid-19-data layout).
pub struct StateCountsFeed {
    pub url: String,
}

impl Dataset for StateCountsFeed {
    fn load(&self) -> ReportResult<DataFrame> {
        info!("Fetching count feed from {}", self.url);
        let body = fetch_text(&self.url).map_err(|cause| ReportError::SourceUnavailable {
            source: self.url.clone(),
            cause,
        })?;

        let df = read_csv_bytes(body.as_bytes())?;
        debug!("Feed parsed: {:>7} rows", df.height());
        normalize_counts(df)
    }
}

/// Offline variant: a saved copy of the feed on disk.
pub struct StateCountsFile {
    pub path: String,
}

impl Dataset for StateCountsFile {
    fn load(&self) -> ReportResult<DataFrame> {
        info!("Reading count feed from {}", self.path);
        let df = read_csv(&self.path).map_err(|e| ReportError::SourceUnavailable {
            source: self.path.clone(),
            cause: e.into(),
        })?;
        normalize_counts(df)
    }
}

fn fetch_text(url: &str) -> anyhow::Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    let body = client
        .get(url)
        .send()
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?
        .text()
        .with_context(|| format!("reading body from {url}"))?;

    Ok(body)
}

/// Column cleanup shared by the live feed and file-based copies: drop the
/// FIPS code, rename `cases` to `infections`, zero-fill numeric gaps.
///
/// Absent cells must never turn into invented infections or deaths, so the
/// substitution is always zero.
pub fn normalize_counts(mut df: DataFrame) -> ReportResult<DataFrame> {
    if df.get_column_names().iter().any(|c| c.as_str() == "fips") {
        df = df.drop("fips")?;
    }
    if df.get_column_names().iter().any(|c| c.as_str() == "cases") {
        df = df.lazy().rename(["cases"], ["infections"], true).collect()?;
    }

    if !df.get_column_names().iter().any(|c| c.as_str() == STATE_COL) {
        error!("count feed has no `{STATE_COL}` column");
        return Err(ReportError::SchemaMismatch {
            column: STATE_COL.to_string(),
        });
    }

    let zero_fill: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|c| is_counter_dtype(c.dtype()))
        .map(|c| col(c.name().as_str()).fill_null(lit(0)))
        .collect();

    if zero_fill.is_empty() {
        error!("count feed has no numeric counter columns");
        return Err(ReportError::SchemaMismatch {
            column: "<numeric counter>".to_string(),
        });
    }

    let df = df.lazy().with_columns(zero_fill).collect()?;
    Ok(df)
}

fn is_counter_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
