use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::models::ParameterMask;
use crate::backend::{Backend, DashboardClient};
use crate::config::Config;
use crate::error::AppResult;
use crate::series::models::AlignedSeries;
use crate::services::catalog::ParameterCatalog;

/// Cache for aligned query results. Key is request params.
pub type QueryCache = Cache<String, Arc<AlignedSeries>>;

/// Everything the dashboard operations need, passed explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
    /// Loaded once, read-only afterwards.
    pub catalog: Arc<ParameterCatalog>,
    pub query_cache: QueryCache,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn Backend>, catalog: ParameterCatalog) -> Self {
        let cache: QueryCache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self {
            config: Arc::new(config),
            backend,
            catalog: Arc::new(catalog),
            query_cache: cache,
        }
    }

    /// Build the HTTP client and load the full parameter catalog.
    ///
    /// # Errors
    ///
    /// Fails if the client cannot be built or the catalog cannot be loaded.
    pub async fn connect(config: Config, cancel: CancellationToken) -> AppResult<Self> {
        let client = DashboardClient::with_cancellation(&config, cancel)?;
        let catalog = ParameterCatalog::load(&client, ParameterMask::ALL).await?;
        Ok(Self::new(config, Arc::new(client), catalog))
    }
}
