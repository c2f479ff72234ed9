use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::upstream::HttpMutatorConfig;

/// Where documents are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local maps, for development and tests
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown STORAGE_BACKEND {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub storage_backend: StorageBackend,
    pub database_url: String,
    // Database connection pool settings
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub db_idle_timeout_secs: u64,
    pub db_max_lifetime_secs: u64,
    pub db_max_concurrent_queries: usize,
    // Upstream mutator; unset disables forwarding
    pub upstream_url: Option<String>,
    pub upstream_connect_timeout_ms: u64,
    pub upstream_timeout_ms: u64,
    pub upstream_max_retries: u32,
    pub upstream_retry_base_ms: u64,
    pub upstream_retry_max_ms: u64,
    pub blocked_subdocs: HashSet<String>,
    pub validate_event_device_id: bool,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".to_string(),
            storage_backend: StorageBackend::Postgres,
            database_url: String::new(),
            db_max_connections: 20,
            db_min_connections: 5,
            db_acquire_timeout_secs: 30,
            db_idle_timeout_secs: 600,  // 10 minutes
            db_max_lifetime_secs: 1800, // 30 minutes
            db_max_concurrent_queries: 100,
            upstream_url: None,
            upstream_connect_timeout_ms: 2_000,
            upstream_timeout_ms: 10_000,
            upstream_max_retries: 3,
            upstream_retry_base_ms: 100,
            upstream_retry_max_ms: 2_000,
            blocked_subdocs: HashSet::new(),
            validate_event_device_id: true,
            max_body_bytes: 1024 * 1024,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Comma-separated list, blanks dropped.
pub fn parse_list(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let storage_backend = match std::env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.storage_backend,
        };

        Ok(Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            storage_backend,
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_min_connections: env_or("DB_MIN_CONNECTIONS", defaults.db_min_connections),
            db_acquire_timeout_secs: env_or(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout_secs,
            ),
            db_idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", defaults.db_idle_timeout_secs),
            db_max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", defaults.db_max_lifetime_secs),
            db_max_concurrent_queries: env_or(
                "DB_MAX_CONCURRENT_QUERIES",
                defaults.db_max_concurrent_queries,
            ),
            upstream_url: std::env::var("UPSTREAM_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            upstream_connect_timeout_ms: env_or(
                "UPSTREAM_CONNECT_TIMEOUT_MS",
                defaults.upstream_connect_timeout_ms,
            ),
            upstream_timeout_ms: env_or("UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout_ms),
            upstream_max_retries: env_or("UPSTREAM_MAX_RETRIES", defaults.upstream_max_retries),
            upstream_retry_base_ms: env_or(
                "UPSTREAM_RETRY_BASE_MS",
                defaults.upstream_retry_base_ms,
            ),
            upstream_retry_max_ms: env_or("UPSTREAM_RETRY_MAX_MS", defaults.upstream_retry_max_ms),
            blocked_subdocs: std::env::var("BLOCKED_SUBDOCS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            validate_event_device_id: env_or(
                "VALIDATE_EVENT_DEVICE_ID",
                defaults.validate_event_device_id,
            ),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_backend == StorageBackend::Postgres
            && !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err("DATABASE_URL must start with postgres:// or postgresql://".to_string());
        }

        if self.listen_addr.is_empty() {
            return Err("LISTEN_ADDR cannot be empty".to_string());
        }

        if self.db_max_concurrent_queries == 0 {
            return Err("DB_MAX_CONCURRENT_QUERIES must be greater than 0".to_string());
        }

        if let Some(url) = &self.upstream_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("UPSTREAM_URL must start with http:// or https://".to_string());
            }
            if self.upstream_connect_timeout_ms == 0 || self.upstream_timeout_ms == 0 {
                return Err("upstream timeouts must be greater than 0".to_string());
            }
            if self.upstream_max_retries > 10 {
                return Err("UPSTREAM_MAX_RETRIES must be at most 10".to_string());
            }
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn upstream(&self) -> Option<HttpMutatorConfig> {
        self.upstream_url.as_ref().map(|url| HttpMutatorConfig {
            base_url: url.clone(),
            connect_timeout: Duration::from_millis(self.upstream_connect_timeout_ms),
            timeout: Duration::from_millis(self.upstream_timeout_ms),
            max_retries: self.upstream_max_retries,
            retry_base: Duration::from_millis(self.upstream_retry_base_ms),
            retry_max: Duration::from_millis(self.upstream_retry_max_ms),
        })
    }
}
