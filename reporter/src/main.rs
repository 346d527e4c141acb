use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::ranked_bars::{column_values, render_ranked_bars};
use crate::analysis::ratios::{build_ratio_table, describe};
use crate::data_handling::census::CensusDataset;
use crate::data_handling::merged::load_and_join_sources;
use crate::data_handling::state_counts::StateCountsFeed;
use crate::helper_functions::{colour_for_column, dataframe_to_csv, write_run_manifest};
use crate::models::{polars_err, OrderBy, RatioMetric, ReportResult};

mod analysis;
mod data_handling;
mod helper_functions;
mod models;
#[cfg(test)]
mod tests;

const FEED_URL: &str =
    "https://raw.githubusercontent.com/nytimes/covid-19-data/master/live/us-states.csv";
const CENSUS_PATH: &str = "data/Population Estimates by State.csv";
const DATA_DIR: &str = "data";
const FIGURES_DIR: &str = "figures";

/// Per-state rates derived from the unified table.
const METRICS: [RatioMetric; 2] = [
    RatioMetric {
        name: "infection_ratio",
        numerator: "infections",
        denominator: "population",
    },
    RatioMetric {
        name: "death_ratio",
        numerator: "deaths",
        denominator: "infections",
    },
];

fn main() -> ReportResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the state ratio report");

    let feed = StateCountsFeed {
        url: FEED_URL.to_string(),
    };
    let census = CensusDataset {
        path: PathBuf::from(CENSUS_PATH),
    };
    let unified = load_and_join_sources(&feed, &census)?;

    // Summary table in feed order, matching the published CSV layout.
    let mut ratio_table = build_ratio_table(&unified, &METRICS, OrderBy::FirstSeen)?;
    std::fs::create_dir_all(DATA_DIR).map_err(|e| polars_err(Box::new(e)))?;
    let summary_path = Path::new(DATA_DIR).join("us_ratio_data.csv");
    dataframe_to_csv(&mut ratio_table, &summary_path)?;
    describe(&ratio_table, &METRICS)?;

    // Each chart overlays the maximum of the next metric in the sequence, so
    // neighbouring scales can be compared at a glance.
    let charts = [
        ("population", Some("infections")),
        ("infections", Some("deaths")),
        ("deaths", None),
    ];

    let figures_dir = Path::new(FIGURES_DIR);
    let mut figures = Vec::new();
    let mut failed = 0usize;

    for (value_col, reference_col) in charts {
        let reference = match reference_col {
            Some(column) => column_values(&unified, column)?,
            None => Vec::new(),
        };
        let reference_colour = colour_for_column(reference_col.unwrap_or(value_col));

        match render_ranked_bars(
            &unified,
            value_col,
            value_col,
            colour_for_column(value_col),
            &reference,
            reference_colour,
            figures_dir,
        ) {
            Ok(path) => figures.push(path),
            Err(e) => {
                // One bad chart must not block the remaining charts.
                error!("Chart for `{value_col}` failed: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!("{failed} chart(s) skipped");
    }

    let manifest_path = Path::new(DATA_DIR).join("run_manifest.json");
    if let Err(e) = write_run_manifest(
        &manifest_path,
        FEED_URL,
        Path::new(CENSUS_PATH),
        &METRICS,
        &figures,
    ) {
        warn!("Could not write run manifest: {e}");
    }

    info!(
        "Report complete: {} figure(s), summary at {}",
        figures.len(),
        summary_path.display()
    );
    Ok(())
}
