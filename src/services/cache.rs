//! Query-result caching for the dashboard.
//!
//! Aligned results are cached per request (time range + parameters):
//!
//! - **Closed ranges** (end time in the past): cached until the TTL expires.
//!   Re-selecting a parameter or switching between table and chart reuses the
//!   result instead of asking the backend again.
//!
//! - **Open ranges** (end time now or later): never cached, new readings may
//!   still arrive inside the range.
//!
//! Any write through this crate (CSV import, manual entry, deletion) clears the
//! whole cache, since it can change any cached range.

use std::sync::Arc;

use crate::backend::models::DataRequest;
use crate::common::AppState;
use crate::series::models::AlignedSeries;

/// Build a cache key from a prefix and components.
///
/// Components are joined with `:` separator. Empty components are included
/// to ensure different queries produce different keys.
pub fn cache_key(prefix: &str, components: &[&str]) -> String {
    let mut key = prefix.to_string();
    for c in components {
        key.push(':');
        key.push_str(c);
    }
    key
}

/// Key for a `fetchQuery` request. Parameter order matters, it fixes column order.
pub fn query_key(request: &DataRequest) -> String {
    let params = request
        .params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    cache_key(
        "query",
        &[
            &request.start_time.to_string(),
            &request.end_time.to_string(),
            &params,
        ],
    )
}

/// Only ranges that are already over can be cached.
pub fn is_cacheable(request: &DataRequest, now_ms: i64) -> bool {
    request.end_time < now_ms
}

pub async fn get_cached(state: &AppState, cache_key: &str) -> Option<Arc<AlignedSeries>> {
    let cached = state.query_cache.get(cache_key).await?;
    tracing::debug!(cache_key = %cache_key, "cache_hit");
    Some(cached)
}

pub async fn store_cached(state: &AppState, cache_key: String, aligned: Arc<AlignedSeries>) {
    let rows = aligned.clock.len();
    state.query_cache.insert(cache_key.clone(), aligned).await;
    tracing::debug!(cache_key = %cache_key, rows, "cache_stored");
}

/// Drop every cached result.
pub fn invalidate_all(state: &AppState) {
    state.query_cache.invalidate_all();
    tracing::debug!("cache_cleared");
}
