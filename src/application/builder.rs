use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api::router::AppState;
use crate::application::{
    ports::{DatabaseClient, UpstreamMutator},
    use_cases::{
        ApplyEventUseCase, DocumentsUseCase, FetchDocumentUseCase, PostSubDocumentUseCase,
        ReferenceDocumentsUseCase,
    },
};
use crate::config::{Config, StorageBackend};
use crate::domain::capability::CapabilityTable;
use crate::infrastructure::{
    persistence::{InMemoryDatabaseClient, PostgresDatabaseClient},
    upstream::HttpUpstreamMutator,
};

/// Application builder for clean dependency injection and setup
pub struct ApplicationBuilder {
    config: Config,
    db: Option<Arc<dyn DatabaseClient>>,
    upstream: Option<Arc<dyn UpstreamMutator>>,
    capabilities: Arc<CapabilityTable>,
}

impl ApplicationBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            db: None,
            upstream: None,
            capabilities: Arc::new(CapabilityTable::default()),
        }
    }

    /// Connect the configured storage backend. Postgres connects with retry
    /// and runs migrations.
    pub async fn with_database(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        let db: Arc<dyn DatabaseClient> = match self.config.storage_backend {
            StorageBackend::Memory => {
                info!("Using in-memory document store");
                Arc::new(InMemoryDatabaseClient::new())
            }
            StorageBackend::Postgres => {
                let pool = self.connect_postgres().await?;
                Arc::new(PostgresDatabaseClient::new(
                    pool,
                    self.config.db_max_concurrent_queries,
                ))
            }
        };

        self.db = Some(db);
        Ok(self)
    }

    async fn connect_postgres(&self) -> Result<sqlx::PgPool, Box<dyn std::error::Error>> {
        info!("Connecting to database");

        // Retry connection with exponential backoff
        let mut retries = 3;
        let mut delay = Duration::from_secs(1);
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(self.config.db_max_connections)
                .min_connections(self.config.db_min_connections)
                .acquire_timeout(Duration::from_secs(self.config.db_acquire_timeout_secs))
                .idle_timeout(Some(Duration::from_secs(self.config.db_idle_timeout_secs)))
                .max_lifetime(Some(Duration::from_secs(self.config.db_max_lifetime_secs)))
                .connect(&self.config.database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        "Database connection failed, retrying in {:?} ({} retries left): {}",
                        delay,
                        retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!("Failed to connect to database after retries: {}", e);
                    return Err(Box::new(e));
                }
            }
        };

        info!(
            "Database pool configured: max={}, min={}, acquire_timeout={}s, max_concurrent_queries={}",
            self.config.db_max_connections,
            self.config.db_min_connections,
            self.config.db_acquire_timeout_secs,
            self.config.db_max_concurrent_queries
        );

        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;

        Ok(pool)
    }

    /// Use an already constructed store (tests, tools).
    pub fn with_database_client(mut self, db: Arc<dyn DatabaseClient>) -> Self {
        self.db = Some(db);
        self
    }

    /// Create the HTTP upstream mutator when `UPSTREAM_URL` is configured.
    pub fn with_upstream(mut self) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(upstream_config) = self.config.upstream() {
            info!(url = %upstream_config.base_url, "Upstream mutator enabled");
            self.upstream = Some(Arc::new(HttpUpstreamMutator::new(upstream_config)?));
        }
        Ok(self)
    }

    pub fn with_upstream_mutator(mut self, upstream: Arc<dyn UpstreamMutator>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityTable) -> Self {
        self.capabilities = Arc::new(capabilities);
        self
    }

    /// Build application state with all use cases
    pub fn build(self) -> Result<AppState, Box<dyn std::error::Error>> {
        let db = self.db.ok_or("Database client not initialized")?;
        let blocked = Arc::new(self.config.blocked_subdocs.clone());

        let mut fetch = FetchDocumentUseCase::new(
            Arc::clone(&db),
            Arc::clone(&self.capabilities),
            blocked,
        );
        if let Some(upstream) = self.upstream {
            fetch = fetch.with_upstream(upstream);
        }

        let state = AppState {
            db: Arc::clone(&db),
            fetch_use_case: Arc::new(fetch),
            apply_event_use_case: Arc::new(ApplyEventUseCase::new(
                Arc::clone(&db),
                self.config.validate_event_device_id,
            )),
            post_sub_document_use_case: Arc::new(PostSubDocumentUseCase::new(Arc::clone(&db))),
            documents_use_case: Arc::new(DocumentsUseCase::new(Arc::clone(&db))),
            reference_use_case: Arc::new(ReferenceDocumentsUseCase::new(db)),
            max_body_bytes: self.config.max_body_bytes,
        };

        info!("Application layer initialized");
        Ok(state)
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
