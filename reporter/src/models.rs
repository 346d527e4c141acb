use std::error::Error;
use std::fmt;

use polars::prelude::{DataFrame, PolarsError};

/// Join key shared by the count feed and the census reference.
pub const STATE_COL: &str = "state";

pub type ReportResult<T> = Result<T, ReportError>;

/// Failure kinds of a report run.
///
/// Join-stage failures (`SourceUnavailable`, `SchemaMismatch`) abort the run;
/// `UndefinedRatio` and `EmptyRange` are recoverable and the caller decides
/// how to handle them per metric.
#[derive(Debug)]
pub enum ReportError {
    /// A source could not be fetched or read at all.
    SourceUnavailable {
        source: String,
        cause: anyhow::Error,
    },
    /// An expected column is absent after normalization.
    SchemaMismatch { column: String },
    /// Zero denominator; never surfaces as NaN or Infinity.
    UndefinedRatio { state: String, denominator: String },
    /// A chart axis with no positive values has no usable tick step.
    EmptyRange { column: String },
    /// Engine error crossing the table boundary.
    Table(PolarsError),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::SourceUnavailable { source, cause } => {
                write!(f, "source unavailable: {source}: {cause}")
            }
            ReportError::SchemaMismatch { column } => {
                write!(f, "schema mismatch: expected column `{column}`")
            }
            ReportError::UndefinedRatio { state, denominator } => {
                write!(f, "undefined ratio for {state}: `{denominator}` is zero")
            }
            ReportError::EmptyRange { column } => {
                write!(f, "empty axis range: `{column}` has no positive values")
            }
            ReportError::Table(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReportError::SourceUnavailable { cause, .. } => {
                let cause: &(dyn Error + 'static) = cause.as_ref();
                Some(cause)
            }
            ReportError::Table(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PolarsError> for ReportError {
    fn from(e: PolarsError) -> Self {
        ReportError::Table(e)
    }
}

/// Adapt a foreign error into a polars error at module seams.
pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{e}").into())
}

/// A tabular source that can be materialized into a DataFrame.
pub trait Dataset {
    fn load(&self) -> ReportResult<DataFrame>;
}

/// Named (numerator, denominator) column pair deriving a per-state rate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RatioMetric {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

/// Row-ordering policy for the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// Keep the unified table's order, i.e. the count feed's order.
    FirstSeen,
    Alphabetical,
    /// Descending population, the order the charts rank by.
    ByPopulation,
}
