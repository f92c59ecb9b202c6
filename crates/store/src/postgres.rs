//! Postgres backend built on a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::models::{AnalysisRow, Object, ObjectMetadata, MEASUREMENT_FLOAT_COLUMNS};
use crate::query::{AnalysisFilter, PaginationParams};
use crate::{AnalysisRepository, StoreError};

const ANALYSIS_COLUMNS: &str = "id, date_time, \
    COALESCE(product, '') AS product, \
    COALESCE(color_rhs, '') AS color_rhs, \
    COALESCE(id_user, '') AS id_user, \
    COALESCE(telegram_link, '') AS telegram_link, \
    COALESCE(text, '') AS text, \
    COALESCE(file_source, '') AS file_source, \
    COALESCE(scale_mm_pixel, 0)::float8 AS scale_mm_pixel, \
    COALESCE(mass, 0)::float8 AS mass, \
    COALESCE(area, 0)::float8 AS area, \
    r, g, b, h, s, v, lab_l, lab_a, lab_b, w, l, t, \
    COALESCE(file_output, '') AS file_output, \
    COALESCE(id_analysis, '') AS id_analysis";

static MEASUREMENT_COLUMNS: Lazy<String> = Lazy::new(|| {
    let mut columns: Vec<String> = MEASUREMENT_FLOAT_COLUMNS
        .iter()
        .map(|c| format!("COALESCE({c}, 0)::float8 AS {c}"))
        .collect();
    columns.push("COALESCE(color_rhs, '') AS color_rhs".to_string());
    columns.join(", ")
});

static OBJECTS_BY_ANALYSIS_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT id, COALESCE(id_analysis, 0)::int8 AS id_analysis, COALESCE(file, '') AS file, \
         COALESCE(class, '') AS class, COALESCE(geometry, '') AS geometry, \
         COALESCE(id_image, 0)::int8 AS id_image, {} \
         FROM objects WHERE id_analysis = $1 ORDER BY id",
        *MEASUREMENT_COLUMNS
    )
});

static OBJECTS_BY_IDS_SQL: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT id, {} FROM objects WHERE id = ANY($1) ORDER BY id",
        *MEASUREMENT_COLUMNS
    )
});

/// Connection and pool sizing for the Postgres backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open even when idle.
    pub min_connections: u32,
    /// Connections older than this are closed and replaced.
    pub max_lifetime_secs: u64,
    /// Idle connections beyond `min_connections` are closed after this long.
    pub idle_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "user".to_string(),
            password: "password".to_string(),
            database: "db".to_string(),
            max_connections: 10,
            min_connections: 2,
            max_lifetime_secs: 3600,
            idle_timeout_secs: 300,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .max_lifetime(Duration::from_secs(self.max_lifetime_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
    }
}

/// [`AnalysisRepository`] over a shared Postgres database.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Open the pool and verify the database answers.
    pub async fn connect(cfg: &PoolConfig) -> Result<Self, StoreError> {
        debug!(host = %cfg.host, port = cfg.port, database = %cfg.database, "connecting to database");
        let pool = cfg
            .pool_options()
            .connect_with(cfg.connect_options())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let repo = Self { pool };
        repo.ping().await?;
        info!(
            max_connections = cfg.max_connections,
            min_connections = cfg.min_connections,
            "database pool ready"
        );
        Ok(repo)
    }
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a AnalysisFilter) {
    qb.push(" WHERE id_user = ");
    qb.push_bind(filter.user_id.to_string());
    if let Some(product) = &filter.product {
        qb.push(" AND product = ");
        qb.push_bind(product.as_str());
    }
    if let Some(analysis_id) = &filter.analysis_id {
        qb.push(" AND id_analysis = ");
        qb.push_bind(analysis_id.as_str());
    }
}

#[async_trait]
impl AnalysisRepository for PgRepository {
    async fn find_analyses(
        &self,
        filter: &AnalysisFilter,
        page: &PaginationParams,
    ) -> Result<Vec<AnalysisRow>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ANALYSIS_COLUMNS} FROM analyses"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY ");
        qb.push(page.sort_by.column());
        qb.push(" ");
        qb.push(page.sort_order.keyword());
        qb.push(", id ");
        qb.push(page.sort_order.keyword());
        qb.push(" LIMIT ");
        qb.push_bind(page.limit);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset);

        let rows = qb
            .build_query_as::<AnalysisRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_analyses(&self, filter: &AnalysisFilter) -> Result<i64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM analyses");
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn find_analysis_by_id(
        &self,
        analysis_id: &str,
    ) -> Result<Option<AnalysisRow>, StoreError> {
        let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM analyses WHERE id_analysis = $1 LIMIT 1");
        let row = sqlx::query_as::<_, AnalysisRow>(&sql)
            .bind(analysis_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_objects_by_analysis_id(&self, id: i64) -> Result<Vec<Object>, StoreError> {
        let rows = sqlx::query_as::<_, Object>(OBJECTS_BY_ANALYSIS_SQL.as_str())
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_objects_by_ids(&self, ids: &[i32]) -> Result<Vec<ObjectMetadata>, StoreError> {
        let rows = sqlx::query_as::<_, ObjectMetadata>(OBJECTS_BY_IDS_SQL.as_str())
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("database pool closed");
    }
}
