use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use crate::application::ports::{DatabaseClient, DatabaseError};
use crate::domain::entities::{Document, RefSubDocument, RootDocument, SubDocument};
use crate::domain::value_objects::{DeploymentState, DeviceId};

/// Postgres-backed document store.
///
/// Query concurrency is bounded by a semaphore on top of the pool so bursts
/// of device polls queue here instead of timing out on connection acquire.
pub struct PostgresDatabaseClient {
    pool: PgPool,
    limiter: Arc<Semaphore>,
}

impl PostgresDatabaseClient {
    pub fn new(pool: PgPool, max_concurrent_queries: usize) -> Self {
        Self {
            pool,
            limiter: Arc::new(Semaphore::new(max_concurrent_queries.max(1))),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, DatabaseError> {
        self.limiter
            .acquire()
            .await
            .map_err(|e| DatabaseError::Internal(format!("query limiter closed: {}", e)))
    }

    async fn fetch_root(&self, device_id: &DeviceId) -> Result<Option<RootDocument>, DatabaseError> {
        let row = sqlx::query_as::<_, RootDocumentRow>(
            r#"
            SELECT bitmap, firmware_version, model_name, partner_id,
                   schema_version, version, query_params
            FROM root_documents
            WHERE device_id = $1
            "#,
        )
        .bind(device_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RootDocumentRow::into_domain))
    }
}

#[async_trait]
impl DatabaseClient for PostgresDatabaseClient {
    async fn get_document(&self, device_id: &DeviceId) -> Result<Document, DatabaseError> {
        let _permit = self.permit().await?;

        let rows = sqlx::query_as::<_, SubDocumentRow>(
            r#"
            SELECT name, payload, version, state, updated_time,
                   error_code, error_details, expiry
            FROM sub_documents
            WHERE device_id = $1
            ORDER BY name
            "#,
        )
        .bind(device_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let root = self.fetch_root(device_id).await?;
        if rows.is_empty() && root.is_none() {
            return Err(DatabaseError::NotFound(format!("device {}", device_id)));
        }

        let mut document = rows
            .into_iter()
            .map(SubDocumentRow::into_domain)
            .collect::<Result<Document, _>>()?;
        document.set_root(root);
        Ok(document)
    }

    async fn get_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<SubDocument, DatabaseError> {
        let _permit = self.permit().await?;

        let row = sqlx::query_as::<_, SubDocumentRow>(
            r#"
            SELECT name, payload, version, state, updated_time,
                   error_code, error_details, expiry
            FROM sub_documents
            WHERE device_id = $1 AND name = $2
            "#,
        )
        .bind(device_id.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(r.into_domain()?.1),
            None => Err(DatabaseError::NotFound(format!(
                "sub-document {} of {}",
                name, device_id
            ))),
        }
    }

    async fn set_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
        sub_document: &SubDocument,
        prev_state: Option<DeploymentState>,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        sqlx::query(
            r#"
            INSERT INTO sub_documents (
                device_id, name, payload, version, state, updated_time,
                error_code, error_details, expiry
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (device_id, name) DO UPDATE SET
                payload = COALESCE(EXCLUDED.payload, sub_documents.payload),
                version = COALESCE(EXCLUDED.version, sub_documents.version),
                state = COALESCE(EXCLUDED.state, sub_documents.state),
                updated_time = COALESCE(EXCLUDED.updated_time, sub_documents.updated_time),
                error_code = COALESCE(EXCLUDED.error_code, sub_documents.error_code),
                error_details = COALESCE(EXCLUDED.error_details, sub_documents.error_details),
                expiry = COALESCE(EXCLUDED.expiry, sub_documents.expiry)
            "#,
        )
        .bind(device_id.as_str())
        .bind(name)
        .bind(sub_document.payload.as_ref().map(|p| p.as_ref()))
        .bind(sub_document.version.as_deref())
        .bind(sub_document.state.map(|s| s.as_i32() as i16))
        .bind(sub_document.updated_time)
        .bind(sub_document.error_code)
        .bind(sub_document.error_details.as_deref())
        .bind(sub_document.expiry)
        .execute(&self.pool)
        .await?;

        if let Some(state) = sub_document.state {
            debug!(
                device_id = %device_id,
                namespace = name,
                from = prev_state.map(|s| s.to_string()).unwrap_or_default(),
                to = %state,
                "Sub-document state written"
            );
        }

        Ok(())
    }

    async fn delete_sub_document(
        &self,
        device_id: &DeviceId,
        name: &str,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        let result = sqlx::query("DELETE FROM sub_documents WHERE device_id = $1 AND name = $2")
            .bind(device_id.as_str())
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "sub-document {} of {}",
                name, device_id
            )));
        }
        Ok(())
    }

    async fn delete_document(&self, device_id: &DeviceId) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        let mut tx = self.pool.begin().await?;
        let subs = sqlx::query("DELETE FROM sub_documents WHERE device_id = $1")
            .bind(device_id.as_str())
            .execute(&mut *tx)
            .await?;
        let root = sqlx::query("DELETE FROM root_documents WHERE device_id = $1")
            .bind(device_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if subs.rows_affected() == 0 && root.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("device {}", device_id)));
        }
        Ok(())
    }

    async fn get_root_document(&self, device_id: &DeviceId) -> Result<RootDocument, DatabaseError> {
        let _permit = self.permit().await?;

        self.fetch_root(device_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("root document {}", device_id)))
    }

    async fn set_root_document(
        &self,
        device_id: &DeviceId,
        root: &RootDocument,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        sqlx::query(
            r#"
            INSERT INTO root_documents (
                device_id, bitmap, firmware_version, model_name, partner_id,
                schema_version, version, query_params, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                bitmap = EXCLUDED.bitmap,
                firmware_version = EXCLUDED.firmware_version,
                model_name = EXCLUDED.model_name,
                partner_id = EXCLUDED.partner_id,
                schema_version = EXCLUDED.schema_version,
                version = EXCLUDED.version,
                query_params = EXCLUDED.query_params,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(device_id.as_str())
        .bind(root.bitmap)
        .bind(&root.firmware_version)
        .bind(&root.model_name)
        .bind(&root.partner_id)
        .bind(&root.schema_version)
        .bind(&root.version)
        .bind(&root.query_params)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_root_document_version(
        &self,
        device_id: &DeviceId,
        version: &str,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        sqlx::query(
            r#"
            INSERT INTO root_documents (device_id, version, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(device_id.as_str())
        .bind(version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_root_document_bitmap(
        &self,
        device_id: &DeviceId,
        bitmap: i64,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        sqlx::query(
            r#"
            INSERT INTO root_documents (device_id, bitmap, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (device_id) DO UPDATE SET
                bitmap = EXCLUDED.bitmap,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(device_id.as_str())
        .bind(bitmap)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_ref_sub_document(&self, ref_id: &str) -> Result<RefSubDocument, DatabaseError> {
        let _permit = self.permit().await?;

        let row: Option<(Vec<u8>, String)> =
            sqlx::query_as("SELECT payload, version FROM ref_sub_documents WHERE ref_id = $1")
                .bind(ref_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(payload, version)| RefSubDocument::new(payload, Some(version)))
            .ok_or_else(|| DatabaseError::NotFound(format!("reference {}", ref_id)))
    }

    async fn set_ref_sub_document(
        &self,
        ref_id: &str,
        document: &RefSubDocument,
    ) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        sqlx::query(
            r#"
            INSERT INTO ref_sub_documents (ref_id, payload, version, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (ref_id) DO UPDATE SET
                payload = EXCLUDED.payload,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(ref_id)
        .bind(document.payload().as_ref())
        .bind(document.version())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_ref_sub_document(&self, ref_id: &str) -> Result<(), DatabaseError> {
        let _permit = self.permit().await?;

        let result = sqlx::query("DELETE FROM ref_sub_documents WHERE ref_id = $1")
            .bind(ref_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("reference {}", ref_id)));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// Internal row mapping structs
#[derive(sqlx::FromRow)]
struct SubDocumentRow {
    name: String,
    payload: Option<Vec<u8>>,
    version: Option<String>,
    state: Option<i16>,
    updated_time: Option<i64>,
    error_code: Option<i32>,
    error_details: Option<String>,
    expiry: Option<i64>,
}

impl SubDocumentRow {
    fn into_domain(self) -> Result<(String, SubDocument), DatabaseError> {
        let state = self
            .state
            .map(|s| DeploymentState::from_i32(i32::from(s)))
            .transpose()
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let sub_document = SubDocument {
            payload: self.payload.map(Bytes::from),
            version: self.version,
            state,
            updated_time: self.updated_time,
            error_code: self.error_code,
            error_details: self.error_details,
            expiry: self.expiry,
        };
        Ok((self.name, sub_document))
    }
}

#[derive(sqlx::FromRow)]
struct RootDocumentRow {
    bitmap: i64,
    firmware_version: String,
    model_name: String,
    partner_id: String,
    schema_version: String,
    version: String,
    query_params: String,
}

impl RootDocumentRow {
    fn into_domain(self) -> RootDocument {
        RootDocument {
            bitmap: self.bitmap,
            firmware_version: self.firmware_version,
            model_name: self.model_name,
            partner_id: self.partner_id,
            schema_version: self.schema_version,
            version: self.version,
            query_params: self.query_params,
        }
    }
}
