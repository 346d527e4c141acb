use polars::prelude::*;
use tracing::{debug, info};

use crate::models::{Dataset, ReportError, ReportResult, STATE_COL};

const ORDER_COL: &str = "__feed_order";

/// Inner-join the count feed with the census reference on the state name.
///
/// States present in only one source are silently excluded, and matching is
/// exact string equality; mismatched naming conventions between sources are a
/// known accuracy risk, not handled here. The result keeps the feed's row
/// order, one row per state present in both inputs.
pub fn load_and_join(counts: &DataFrame, census: &DataFrame) -> ReportResult<DataFrame> {
    for df in [counts, census] {
        if !df.get_column_names().iter().any(|c| c.as_str() == STATE_COL) {
            return Err(ReportError::SchemaMismatch {
                column: STATE_COL.to_string(),
            });
        }
    }

    // Join implementations are free to reorder rows; pin the feed order with
    // an explicit index so the output stays reproducible.
    let indexed = counts.with_row_index(ORDER_COL.into(), None)?;
    let joined = indexed.join(
        census,
        [STATE_COL],
        [STATE_COL],
        JoinArgs::from(JoinType::Inner),
        None,
    )?;
    let joined = joined.sort([ORDER_COL], SortMultipleOptions::default())?;
    let joined = joined.drop(ORDER_COL)?;

    info!(
        "Joined {} feed rows with {} census rows: {} states in common",
        counts.height(),
        census.height(),
        joined.height()
    );
    debug!("Unified table: {:?}", joined);
    Ok(joined)
}

/// Load both sources and join them; either side failing aborts the run.
pub fn load_and_join_sources(
    counts: &dyn Dataset,
    census: &dyn Dataset,
) -> ReportResult<DataFrame> {
    let counts = counts.load()?;
    let census = census.load()?;
    load_and_join(&counts, &census)
}
