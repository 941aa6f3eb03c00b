use std::io::Read;
use std::sync::Arc;

use crate::backend::models::{DataRequest, DeletionQueue, ManualEntry};
use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::insertion::importer::{self, ImportOptions, ImportReport};
use crate::series::models::{AlignedSeries, ParameterId};
use crate::series::normalizer;

use super::cache;

/// Fetch `requested` parameters over `[start, end]` and align them.
///
/// An empty selection returns an empty result without contacting the backend.
/// Columns follow the order of `requested`; repeats are ignored.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if `end <= start`, otherwise any backend error.
pub async fn fetch_series(
    state: &AppState,
    start: i64,
    end: i64,
    requested: &[ParameterId],
) -> AppResult<Arc<AlignedSeries>> {
    if requested.is_empty() {
        return Ok(Arc::new(AlignedSeries::default()));
    }

    if end <= start {
        return Err(AppError::BadRequest(
            "end time must be after start time".to_string(),
        ));
    }

    let mut params: Vec<ParameterId> = Vec::with_capacity(requested.len());
    for id in requested {
        if !params.contains(id) {
            params.push(*id);
        }
    }

    let request = DataRequest {
        start_time: start,
        end_time: end,
        params,
    };

    let cache_key = cache::query_key(&request);
    let cacheable = cache::is_cacheable(&request, chrono::Utc::now().timestamp_millis());
    if cacheable && let Some(cached) = cache::get_cached(state, &cache_key).await {
        return Ok(cached);
    }

    let response = state.backend.fetch_query(&request).await?;
    let set = normalizer::series_from_response(response, &state.catalog);
    let aligned = Arc::new(normalizer::align(set, &request.params, &state.catalog));

    tracing::debug!(
        rows = aligned.clock.len(),
        columns = aligned.columns.len(),
        "Series aligned"
    );

    if cacheable {
        cache::store_cached(state, cache_key, aligned.clone()).await;
    }
    Ok(aligned)
}

/// Import a CSV sheet using the configured batch size, offset and strictness.
///
/// # Errors
///
/// See [`importer::import_csv`].
pub async fn import_csv<R: Read>(state: &AppState, input: R) -> AppResult<ImportReport> {
    let options = ImportOptions::from_config(&state.config)?;
    let result = importer::import_csv(state.backend.as_ref(), input, &options).await;
    // Batches may have been committed even if a later one failed
    cache::invalidate_all(state);
    result
}

/// Send every queued deletion, one request per parameter.
///
/// Returns how many observations were removed.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a parameter the catalog does not know,
/// before anything is sent; otherwise the first backend error.
pub async fn delete_data(state: &AppState, queue: DeletionQueue) -> AppResult<usize> {
    if queue.is_empty() {
        return Ok(0);
    }
    let requests = queue.into_requests();
    for request in &requests {
        state.catalog.require_name(&request.parameter)?;
    }

    let mut removed = 0;
    for request in &requests {
        if let Err(e) = state.backend.remove_data(request).await {
            if removed > 0 {
                cache::invalidate_all(state);
            }
            return Err(e);
        }
        removed += request.time.len();
        tracing::info!(parameter = %request.parameter, count = request.time.len(), "Data removed");
    }

    if removed > 0 {
        cache::invalidate_all(state);
    }
    Ok(removed)
}

/// Insert a single hand-entered value.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown parameter or a non-finite
/// value, otherwise any backend error.
pub async fn input_data(state: &AppState, entry: &ManualEntry) -> AppResult<()> {
    state.catalog.require_name(&entry.data_name)?;
    if !entry.value.is_finite() {
        return Err(AppError::BadRequest(format!(
            "value for '{}' must be a finite number",
            entry.data_name
        )));
    }

    state.backend.input_data(entry).await?;
    cache::invalidate_all(state);
    tracing::info!(parameter = %entry.data_name, time = entry.time, "Manual value inserted");
    Ok(())
}
