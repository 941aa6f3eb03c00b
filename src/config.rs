use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Default size bound for one `insertData` request, in serialized bytes.
pub const DEFAULT_INSERT_BATCH_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Backend
    pub base_url: String,
    pub admin_servlet: String,
    pub control_servlet: String,
    pub request_timeout_seconds: u64,

    // CSV import
    pub insert_batch_bytes: usize,
    pub csv_utc_offset_minutes: i32,
    pub csv_strict: bool,

    // Caching
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Backend
            base_url: env::var("DASHBOARD_BASE_URL")
                .map_err(|_| ConfigError::Missing("DASHBOARD_BASE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            admin_servlet: env::var("DASHBOARD_ADMIN_SERVLET")
                .unwrap_or_else(|_| "AdminServlet".to_string()),
            control_servlet: env::var("DASHBOARD_CONTROL_SERVLET")
                .unwrap_or_else(|_| "ControlServlet".to_string()),
            request_timeout_seconds: parse_or("DASHBOARD_REQUEST_TIMEOUT_SECONDS", 30),

            // CSV import
            insert_batch_bytes: parse_or("DASHBOARD_INSERT_BATCH_BYTES", DEFAULT_INSERT_BATCH_BYTES),
            csv_utc_offset_minutes: parse_or("DASHBOARD_CSV_UTC_OFFSET_MINUTES", 0),
            csv_strict: parse_or("DASHBOARD_CSV_STRICT", false),

            // Caching
            cache_ttl_seconds: parse_or("DASHBOARD_CACHE_TTL_SECONDS", 300),
            cache_max_entries: parse_or("DASHBOARD_CACHE_MAX_ENTRIES", 256),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    /// Config pointing at `base_url` with every other setting at its default.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            admin_servlet: "AdminServlet".to_string(),
            control_servlet: "ControlServlet".to_string(),
            request_timeout_seconds: 30,
            insert_batch_bytes: DEFAULT_INSERT_BATCH_BYTES,
            csv_utc_offset_minutes: 0,
            csv_strict: false,
            cache_ttl_seconds: 300,
            cache_max_entries: 256,
            deployment: Deployment::Local,
        }
    }

    #[must_use]
    pub fn admin_url(&self) -> String {
        format!("{}/{}", self.base_url, self.admin_servlet)
    }

    #[must_use]
    pub fn control_url(&self) -> String {
        format!("{}/{}", self.base_url, self.control_servlet)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_parses_aliases() {
        assert_eq!(Deployment::from_str("Production"), Deployment::Prod);
        assert_eq!(Deployment::from_str("staging"), Deployment::Stage);
        assert_eq!(Deployment::from_str("dev"), Deployment::Dev);
        assert_eq!(Deployment::from_str("anything"), Deployment::Local);
    }

    #[test]
    fn servlet_urls_join_base() {
        let config = Config::with_base_url("http://localhost:8080/envmon");
        assert_eq!(config.admin_url(), "http://localhost:8080/envmon/AdminServlet");
        assert_eq!(config.control_url(), "http://localhost:8080/envmon/ControlServlet");
        assert_eq!(config.insert_batch_bytes, 8192);
    }
}
