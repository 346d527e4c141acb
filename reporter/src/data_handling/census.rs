use std::path::PathBuf;

use polars::prelude::*;
use tracing::{info, warn};

use crate::models::{Dataset, ReportError, ReportResult, STATE_COL};

/// Census population-estimate reference file. The first line cites the data
/// source, the second carries the column headers, and a trailing source row
/// has no population value.
pub struct CensusDataset {
    pub path: PathBuf,
}

impl Dataset for CensusDataset {
    fn load(&self) -> ReportResult<DataFrame> {
        info!("Reading census data from {}", self.path.display());
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            ReportError::SourceUnavailable {
                source: self.path.display().to_string(),
                cause: e.into(),
            }
        })?;
        parse_census(&raw)
    }
}

/// Parse the reference table into `state, population` columns.
///
/// Population values carry thousands separators and are parsed as integers
/// after separator removal. A row with a missing or unparseable population is
/// dropped entirely; zero would claim an empty state, not absent data.
pub fn parse_census(raw: &str) -> ReportResult<DataFrame> {
    // The citation line is not part of the table; the header follows it.
    let table = match raw.split_once('\n') {
        Some((_citation, rest)) => rest,
        None => "",
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(table.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ReportError::SourceUnavailable {
            source: "census reference".to_string(),
            cause: e.into(),
        })?
        .clone();
    if headers.len() < 2 {
        return Err(ReportError::SchemaMismatch {
            column: "population".to_string(),
        });
    }

    let mut states: Vec<String> = Vec::new();
    let mut populations: Vec<i64> = Vec::new();

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable census row: {e}");
                continue;
            }
        };

        let state = record.get(0).unwrap_or("").trim();
        let population = record
            .get(1)
            .map(|p| p.replace(',', ""))
            .and_then(|p| p.trim().parse::<i64>().ok());

        match population {
            Some(population) if !state.is_empty() && population >= 0 => {
                states.push(state.to_string());
                populations.push(population);
            }
            _ => warn!("Dropping census row {state:?}: no usable population"),
        }
    }

    let states = Series::new(PlSmallStr::from(STATE_COL), states);
    let populations = Series::new(PlSmallStr::from("population"), populations);
    Ok(DataFrame::new(vec![
        Column::from(states),
        Column::from(populations),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "Annual Estimates of the Resident Population for the United States\n\
        Geographic Area,Population\n\
        Alabama,\"4,903,185\"\n\
        Alaska,\"731,545\"\n\
        Source: U.S. Census Bureau,\n";

    #[test]
    fn citation_line_and_source_row_are_dropped() {
        let df = parse_census(FIXTURE).unwrap();
        assert_eq!(df.height(), 2);

        let states = df.column(STATE_COL).unwrap().str().unwrap();
        assert_eq!(states.get(0), Some("Alabama"));

        let populations = df.column("population").unwrap().i64().unwrap();
        assert_eq!(populations.get(0), Some(4903185));
        assert_eq!(populations.get(1), Some(731545));
    }

    #[test]
    fn unparseable_population_drops_the_row() {
        let raw = "citation\nGeographic Area,Population\nOhio,\"11,689,100\"\nAtlantis,unknown\nUtopia,\n";
        let df = parse_census(raw).unwrap();
        assert_eq!(df.height(), 1);
        let states = df.column(STATE_COL).unwrap().str().unwrap();
        assert_eq!(states.get(0), Some("Ohio"));
    }

    #[test]
    fn narrow_header_is_schema_mismatch() {
        let raw = "citation\nstate_only\nAlabama\n";
        let err = parse_census(raw).unwrap_err();
        assert!(matches!(err, ReportError::SchemaMismatch { .. }));
    }

    #[test]
    fn absent_file_is_source_unavailable() {
        let source = CensusDataset {
            path: PathBuf::from("does/not/exist.csv"),
        };
        let err = source.load().unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable { .. }));
    }
}
