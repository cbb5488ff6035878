use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Book catalog base URL
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// Bearer token sent to the catalog, if it requires one
    #[serde(default)]
    pub catalog_api_key: Option<String>,

    /// Upper bound on one catalog request, in seconds
    #[serde(default = "default_catalog_timeout_secs")]
    pub catalog_timeout_secs: u64,

    /// JSON file of book records; replaces the HTTP catalog when set
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,

    /// Redis connection URL for catalog response caching
    #[serde(default)]
    pub redis_url: Option<String>,

    /// PostgreSQL connection URL for favorites and blocked books.
    /// Without it the library lives in memory only.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Quiet period before a typed query is sent to the catalog
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_catalog_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_catalog_timeout_secs() -> u64 {
    10
}

fn default_search_debounce_ms() -> u64 {
    300
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Debounce delay for search sessions; `None` when disabled
    pub fn search_debounce(&self) -> Option<Duration> {
        match self.search_debounce_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();
        envy::from_iter::<_, Config>(vars).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.catalog_url, "http://localhost:8080");
        assert_eq!(config.catalog_timeout(), Duration::from_secs(10));
        assert!(config.redis_url.is_none());
        assert!(config.database_url.is_none());
        assert_eq!(config.search_debounce(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_zero_debounce_disables_delay() {
        let config = from_pairs(&[("SEARCH_DEBOUNCE_MS", "0")]);
        assert_eq!(config.search_debounce(), None);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8000"),
            ("CATALOG_FILE", "/tmp/books.json"),
            ("CATALOG_TIMEOUT_SECS", "3"),
            ("DATABASE_URL", "postgres://localhost/shelfwise"),
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.catalog_file, Some(PathBuf::from("/tmp/books.json")));
        assert_eq!(config.catalog_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shelfwise")
        );
    }
}
