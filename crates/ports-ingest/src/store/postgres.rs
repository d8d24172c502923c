//! PostgreSQL port store

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::{PortStore, StoreError};
use crate::{config::StoreConfig, error::IngestError, model::StoredPort};

const UPSERT_PORT: &str = r#"
    INSERT INTO ports (
        key, code, name, city, province, country, timezone,
        latitude, longitude, unlocs, alias
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (key) DO UPDATE SET
        code = EXCLUDED.code,
        name = EXCLUDED.name,
        city = EXCLUDED.city,
        province = EXCLUDED.province,
        country = EXCLUDED.country,
        timezone = EXCLUDED.timezone,
        latitude = EXCLUDED.latitude,
        longitude = EXCLUDED.longitude,
        unlocs = EXCLUDED.unlocs,
        alias = EXCLUDED.alias
"#;

/// `ports` table backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgPortStore {
    pool: PgPool,
}

impl PgPortStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, IngestError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(IngestError::Connection)?;

        info!("Database connection pool established");
        Ok(Self::new(pool))
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<(), IngestError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub async fn find(&self, key: &str) -> Result<Option<StoredPort>, StoreError> {
        let port = sqlx::query_as::<_, StoredPort>(
            r#"
            SELECT key, code, name, city, province, country, timezone,
                   latitude, longitude, unlocs, alias
            FROM ports
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(port)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PortStore for PgPortStore {
    async fn upsert(&self, port: &StoredPort) -> Result<(), StoreError> {
        sqlx::query(UPSERT_PORT)
            .bind(&port.key)
            .bind(&port.code)
            .bind(&port.name)
            .bind(&port.city)
            .bind(&port.province)
            .bind(&port.country)
            .bind(&port.timezone)
            .bind(port.latitude)
            .bind(port.longitude)
            .bind(&port.unlocs)
            .bind(&port.alias)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn health(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
