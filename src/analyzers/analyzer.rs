use crate::analyzers::aggregate::aggregate;
use crate::analyzers::types::{AggregateError, Observation};
use crate::config::Settings;
use crate::output::SeasonalityTable;
use crate::query::{QueryError, RequestParams, validate_extract, validate_seasonality};
use crate::store::ObservationStore;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("There was no data found. Please try again with a different request.")]
    NoData,
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the caller sent a bad request, as opposed to a failure on our
    /// side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Query(_) | PipelineError::NoData)
    }
}

/// Validates a seasonality request, fetches the matching observations and
/// aggregates them into a per-day table.
#[tracing::instrument(skip(store, settings))]
pub async fn run_seasonality<S: ObservationStore + ?Sized>(
    store: &S,
    params: &RequestParams,
    settings: &Settings,
) -> Result<SeasonalityTable, PipelineError> {
    let filter = validate_seasonality(params, settings)?;

    let rows = store.fetch(&filter, settings.detector_count).await?;
    if rows.is_empty() {
        warn!(site_id = filter.site_id, from = %filter.from, to = %filter.to, "No observations matched");
        return Err(PipelineError::NoData);
    }

    let with_gaps = rows.iter().filter(|o| o.has_sentinel()).count();
    let daily = aggregate(&rows)?;

    info!(
        site_id = filter.site_id,
        rows = rows.len(),
        rows_with_gaps = with_gaps,
        days = daily.len(),
        "Seasonality analysis complete"
    );

    Ok(SeasonalityTable::from_aggregates(daily))
}

/// Validates a raw extract request and returns the matching observations
/// for every detector of the site.
#[tracing::instrument(skip(store, settings))]
pub async fn run_extract<S: ObservationStore + ?Sized>(
    store: &S,
    params: &RequestParams,
    settings: &Settings,
) -> Result<Vec<Observation>, PipelineError> {
    let filter = validate_extract(params, settings)?;

    let rows = store.fetch(&filter, settings.detector_count).await?;
    if rows.is_empty() {
        warn!(site_id = filter.site_id, from = %filter.from, to = %filter.to, "No observations matched");
        return Err(PipelineError::NoData);
    }

    info!(site_id = filter.site_id, rows = rows.len(), days = filter.days(), "Extract complete");
    Ok(rows)
}
