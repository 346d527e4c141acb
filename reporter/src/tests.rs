use std::fs;

use plotters::style::RGBColor;
use polars::prelude::*;

use crate::analysis::ranked_bars::render_ranked_bars;
use crate::analysis::ratios::build_ratio_table;
use crate::data_handling::census::parse_census;
use crate::data_handling::merged::load_and_join;
use crate::data_handling::state_counts::normalize_counts;
use crate::helper_functions::{dataframe_to_csv, read_csv_bytes};
use crate::models::{OrderBy, RatioMetric, ReportError, STATE_COL};

const FEED_FIXTURE: &[u8] = b"date,state,fips,cases,deaths\n\
2020-07-28,California,06,100,5\n\
2020-07-28,Texas,48,50,1\n\
2020-07-28,Guam,66,20,\n";

const CENSUS_FIXTURE: &str = "Annual Estimates of the Resident Population\n\
Geographic Area,Population\n\
California,\"1,000\"\n\
Texas,\"500\"\n\
New York,\"2,000\"\n\
Guam,\"170\"\n\
Source: U.S. Census Bureau,\n";

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

fn unified() -> DataFrame {
    let counts = normalize_counts(read_csv_bytes(FEED_FIXTURE).unwrap()).unwrap();
    let census = parse_census(CENSUS_FIXTURE).unwrap();
    load_and_join(&counts, &census).unwrap()
}

#[test]
fn join_drops_census_only_states_and_zero_fills_counts() {
    let df = unified();
    assert_eq!(df.height(), 3);

    let states = df.column(STATE_COL).unwrap().str().unwrap();
    for i in 0..df.height() {
        assert_ne!(states.get(i), Some("New York"));
    }

    // Guam's missing death count became zero, not a dropped row.
    assert_eq!(states.get(2), Some("Guam"));
    let deaths = df.column("deaths").unwrap().i64().unwrap();
    assert_eq!(deaths.get(2), Some(0));
}

#[test]
fn summary_table_matches_feed_order_and_values() {
    let table = build_ratio_table(&unified(), &METRICS, OrderBy::FirstSeen).unwrap();
    assert_eq!(table.height(), 3);

    let states = table.column(STATE_COL).unwrap().str().unwrap();
    assert_eq!(states.get(0), Some("California"));
    assert_eq!(states.get(1), Some("Texas"));
    assert_eq!(states.get(2), Some("Guam"));

    let infection = table.column("infection_ratio").unwrap().f64().unwrap();
    assert!((infection.get(0).unwrap() - 0.10).abs() < 1e-12);
    assert!((infection.get(1).unwrap() - 0.10).abs() < 1e-12);

    let death = table.column("death_ratio").unwrap().f64().unwrap();
    assert!((death.get(0).unwrap() - 0.05).abs() < 1e-12);
    assert!((death.get(2).unwrap() - 0.0).abs() < 1e-12);
}

#[test]
fn summary_output_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();

    for run in 0..2 {
        let mut table = build_ratio_table(&unified(), &METRICS, OrderBy::FirstSeen).unwrap();
        let path = dir.path().join(format!("us_ratio_data_{run}.csv"));
        dataframe_to_csv(&mut table, &path).unwrap();
        paths.push(path);
    }

    let first = fs::read(&paths[0]).unwrap();
    let second = fs::read(&paths[1]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn chart_failure_does_not_block_other_charts() {
    let df = read_csv_bytes(b"state,infections,recovered\nAlaska,10,0\nMaine,5,0\n").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let black = RGBColor(0, 0, 0);

    let degenerate =
        render_ranked_bars(&df, "recovered", "recovered", black, &[], black, dir.path());
    assert!(matches!(
        degenerate.unwrap_err(),
        ReportError::EmptyRange { .. }
    ));

    let rendered =
        render_ranked_bars(&df, "infections", "infections", black, &[], black, dir.path())
            .unwrap();
    assert!(rendered.exists());
    assert_eq!(rendered.file_name().unwrap(), "state_infections.png");
}
