use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::model::{Id, InstanceInfo, MetadataRow};
use crate::store::traits::{InstanceStore, MetadataStore, Store};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Apply the schema. The DDL is idempotent, so this is safe to run on
    /// every startup.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::Executor::execute(&self.pool, include_str!("../../migrations/0001_init.sql"))
            .await
            .context("Failed to apply database schema")?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_metadata(row: &sqlx::postgres::PgRow) -> MetadataRow {
        MetadataRow {
            id: row.get("id"),
            instance_id: row.get("instance_id"),
            key: row.get("key"),
            value: row.get("value"),
            created: row.get("created"),
            updated: row.get("updated"),
            deleted: row.get("deleted"),
            deleted_at: row.get("deleted_at"),
        }
    }
}

#[async_trait::async_trait]
impl InstanceStore for PostgresStore {
    async fn get_instance(&self, tenant_id: &str, id: &Id) -> Result<Option<InstanceInfo>> {
        let row = sqlx::query(
            "SELECT id, tenant_id, name, created_at FROM instances WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch instance")?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(InstanceInfo {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }))
    }

    async fn upsert_instance(&self, instance: InstanceInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO instances (id, tenant_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                tenant_id = EXCLUDED.tenant_id,
                name = EXCLUDED.name
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.tenant_id)
        .bind(&instance.name)
        .bind(instance.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert instance")?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl MetadataStore for PostgresStore {
    async fn find_all_metadata(&self, instance_id: &Id) -> Result<Vec<MetadataRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instance_id, key, value, created, updated, deleted, deleted_at
            FROM instance_metadata
            WHERE instance_id = $1 AND deleted = false
            ORDER BY created
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch instance metadata")?;

        Ok(rows.iter().map(Self::row_to_metadata).collect())
    }

    async fn create_metadata(&self, row: MetadataRow) -> Result<MetadataRow> {
        // Uniqueness of (instance_id, key) among non-deleted rows is enforced
        // by the model's scan before insert; a race between two concurrent
        // creates is settled by the database, not here.
        sqlx::query(
            r#"
            INSERT INTO instance_metadata (id, instance_id, key, value, created, updated, deleted, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&row.id)
        .bind(&row.instance_id)
        .bind(&row.key)
        .bind(&row.value)
        .bind(row.created)
        .bind(row.updated)
        .bind(row.deleted)
        .bind(row.deleted_at)
        .execute(&self.pool)
        .await
        .context("Failed to create metadata row")?;

        Ok(row)
    }

    async fn save_metadata(&self, row: &MetadataRow) -> Result<MetadataRow> {
        let saved = sqlx::query(
            r#"
            UPDATE instance_metadata
            SET value = $2, updated = NOW()
            WHERE id = $1
            RETURNING id, instance_id, key, value, created, updated, deleted, deleted_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.value)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save metadata row")?;

        Ok(Self::row_to_metadata(&saved))
    }

    async fn delete_metadata(&self, row: &MetadataRow) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE instance_metadata
            SET deleted = true, deleted_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&row.id)
        .execute(&self.pool)
        .await
        .context("Failed to delete metadata row")?;

        Ok(())
    }
}

impl Store for PostgresStore {}
