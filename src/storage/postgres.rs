use crate::models::{NewQrAsset, QrAsset};
use crate::storage::row::{template_json, AssetRow};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_assets (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                color TEXT NOT NULL,
                background_color TEXT NOT NULL,
                pixel_shape TEXT NOT NULL,
                hosted_url TEXT,
                hosted_thumbnail_url TEXT,
                external_file_id TEXT,
                embedded_image TEXT,
                logo_file_id TEXT,
                template_data TEXT NOT NULL DEFAULT '{}',
                scanned BOOLEAN NOT NULL DEFAULT FALSE,
                scanned_at BIGINT,
                scan_count BIGINT NOT NULL DEFAULT 0,
                owner TEXT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_qr_assets_code ON qr_assets(code)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_qr_assets_owner ON qr_assets(owner)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create(&self, asset: &NewQrAsset) -> StorageResult<QrAsset> {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| StorageError::Other(e.into()))?
            .as_secs() as i64;

        let template = template_json(&asset.template_data)?;

        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            INSERT INTO qr_assets (
                code, kind, payload, color, background_color, pixel_shape,
                hosted_url, hosted_thumbnail_url, external_file_id,
                embedded_image, logo_file_id, template_data, owner, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (code) DO NOTHING
            RETURNING id, code, kind, payload, color, background_color, pixel_shape,
                      hosted_url, hosted_thumbnail_url, external_file_id,
                      embedded_image, logo_file_id, template_data, scanned,
                      scanned_at, scan_count, owner, created_at
            "#,
        )
        .bind(&asset.code)
        .bind(&asset.kind)
        .bind(&asset.payload)
        .bind(&asset.color)
        .bind(&asset.background_color)
        .bind(asset.pixel_shape.as_str())
        .bind(asset.hosted_url.as_deref())
        .bind(asset.hosted_thumbnail_url.as_deref())
        .bind(asset.external_file_id.as_deref())
        .bind(asset.embedded_image.as_deref())
        .bind(asset.logo_file_id.as_deref())
        .bind(&template)
        .bind(asset.owner.as_deref())
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        match row {
            Some(row) => Ok(row.into_asset()?),
            None => Err(StorageError::Conflict),
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<QrAsset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, code, kind, payload, color, background_color, pixel_shape,
                   hosted_url, hosted_thumbnail_url, external_file_id,
                   embedded_image, logo_file_id, template_data, scanned,
                   scanned_at, scan_count, owner, created_at
            FROM qr_assets
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(AssetRow::into_asset).transpose()
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<QrAsset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, code, kind, payload, color, background_color, pixel_shape,
                   hosted_url, hosted_thumbnail_url, external_file_id,
                   embedded_image, logo_file_id, template_data, scanned,
                   scanned_at, scan_count, owner, created_at
            FROM qr_assets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(AssetRow::into_asset).transpose()
    }

    async fn update(&self, asset: &QrAsset) -> Result<bool> {
        let template = template_json(&asset.template_data)?;

        let result = sqlx::query(
            r#"
            UPDATE qr_assets
            SET kind = $1, payload = $2, color = $3, background_color = $4,
                pixel_shape = $5, hosted_url = $6, hosted_thumbnail_url = $7,
                external_file_id = $8, embedded_image = $9, logo_file_id = $10,
                template_data = $11, scanned = $12, scanned_at = $13, owner = $14
            WHERE id = $15
            "#,
        )
        .bind(&asset.kind)
        .bind(&asset.payload)
        .bind(&asset.color)
        .bind(&asset.background_color)
        .bind(asset.pixel_shape.as_str())
        .bind(asset.hosted_url.as_deref())
        .bind(asset.hosted_thumbnail_url.as_deref())
        .bind(asset.external_file_id.as_deref())
        .bind(asset.embedded_image.as_deref())
        .bind(asset.logo_file_id.as_deref())
        .bind(&template)
        .bind(asset.scanned)
        .bind(asset.scanned_at)
        .bind(asset.owner.as_deref())
        .bind(asset.id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_scanned(&self, id: i64, _code: &str, scanned_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE qr_assets
            SET scanned = TRUE, scanned_at = $1
            WHERE id = $2
            "#,
        )
        .bind(scanned_at)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn record_scans(&self, id: i64, count: u64, scanned_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE qr_assets
            SET scanned = TRUE, scanned_at = $1, scan_count = scan_count + $2
            WHERE id = $3
            "#,
        )
        .bind(scanned_at)
        .bind(count as i64)
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete(&self, id: i64, _code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM qr_assets WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64, owner: Option<&str>) -> Result<Vec<QrAsset>> {
        let rows = if let Some(owner) = owner {
            sqlx::query_as::<_, AssetRow>(
                r#"
                SELECT id, code, kind, payload, color, background_color, pixel_shape,
                       hosted_url, hosted_thumbnail_url, external_file_id,
                       embedded_image, logo_file_id, template_data, scanned,
                       scanned_at, scan_count, owner, created_at
                FROM qr_assets
                WHERE owner = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, AssetRow>(
                r#"
                SELECT id, code, kind, payload, color, background_color, pixel_shape,
                       hosted_url, hosted_thumbnail_url, external_file_id,
                       embedded_image, logo_file_id, template_data, scanned,
                       scanned_at, scan_count, owner, created_at
                FROM qr_assets
                ORDER BY created_at DESC, id DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        rows.into_iter().map(AssetRow::into_asset).collect()
    }
}
