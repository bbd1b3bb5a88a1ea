use crate::models::{NewQrAsset, QrAsset};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("asset code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Cache observability for the scan hot path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupMetadata {
    pub cache_hit: bool,
}

#[derive(Debug)]
pub struct LookupResult {
    pub asset: Option<QrAsset>,
    pub metadata: LookupMetadata,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a new asset; fails with `Conflict` when the code is taken.
    async fn create(&self, asset: &NewQrAsset) -> StorageResult<QrAsset>;

    /// Get an asset by its public code.
    async fn get_by_code(&self, code: &str) -> Result<Option<QrAsset>>;

    /// Get an asset by its internal id.
    async fn get_by_id(&self, id: i64) -> Result<Option<QrAsset>>;

    /// Code lookup that also reports whether a cache answered.
    async fn get_with_metadata(&self, code: &str) -> Result<LookupResult> {
        Ok(LookupResult {
            asset: self.get_by_code(code).await?,
            metadata: LookupMetadata::default(),
        })
    }

    /// Code lookup that bypasses any cache layer. Mutating handlers read
    /// through this so they never act on a stale row.
    async fn get_authoritative(&self, code: &str) -> Result<Option<QrAsset>> {
        self.get_by_code(code).await
    }

    /// Overwrite the mutable columns of an asset row. Returns false when
    /// the row no longer exists. The scan counter is not touched here; it
    /// moves only through `record_scans`.
    async fn update(&self, asset: &QrAsset) -> Result<bool>;

    /// Stamp the scanned flag and last-scan time.
    async fn mark_scanned(&self, id: i64, code: &str, scanned_at: i64) -> Result<()>;

    /// Fold `count` scans, the latest at `scanned_at`, into the counter.
    async fn record_scans(&self, id: i64, count: u64, scanned_at: i64) -> Result<()>;

    /// Remove the asset row.
    async fn delete(&self, id: i64, code: &str) -> Result<bool>;

    /// List assets, newest first, optionally scoped to one owner.
    async fn list(&self, limit: i64, offset: i64, owner: Option<&str>) -> Result<Vec<QrAsset>>;
}
