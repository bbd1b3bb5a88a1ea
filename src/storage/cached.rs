use crate::models::{NewQrAsset, QrAsset};
use crate::storage::{LookupMetadata, LookupResult, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Buffered scan activity for one asset.
#[derive(Debug, Clone, Copy, Default)]
struct ScanTally {
    count: u64,
    last_scanned_at: i64,
}

/// Storage wrapper that adds read caching for lookups and write buffering
/// for scan counts. Assets are cached under both their code and their id,
/// so every mutation invalidates both keys.
pub struct CachedStorage {
    inner: Arc<dyn Storage>,
    read_cache: Cache<String, Option<QrAsset>>,
    scan_buffer: Arc<DashMap<i64, ScanTally>>,
    shutdown_tx: watch::Sender<bool>,
}

fn code_key(code: &str) -> String {
    format!("code:{code}")
}

fn id_key(id: i64) -> String {
    format!("id:{id}")
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_cache_entries: u64, flush_interval_secs: u64) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(max_cache_entries)
            .time_to_live(Duration::from_secs(300)) // 5 minutes TTL
            .build();

        let scan_buffer = Arc::new(DashMap::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        // Background task flushing buffered scans to the database.
        let storage = Arc::clone(&inner);
        let buffer = Arc::clone(&scan_buffer);
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(flush_interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = flush_scan_buffer(&storage, &buffer).await {
                            tracing::error!("Failed to flush scan buffer: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Shutdown signal received, flushing scan buffer...");
                            if let Err(e) = flush_scan_buffer(&storage, &buffer).await {
                                tracing::error!("Failed to flush scan buffer on shutdown: {}", e);
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            inner,
            read_cache,
            scan_buffer,
            shutdown_tx,
        }
    }

    /// Signal shutdown to flush buffered data.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn buffered_tally(&self, id: i64) -> ScanTally {
        self.scan_buffer
            .get(&id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Fold buffered scans into a database row so readers see them before
    /// the next flush.
    fn apply_buffered(&self, asset: &mut QrAsset) {
        let tally = self.buffered_tally(asset.id);
        if tally.count > 0 {
            asset.scan_count += tally.count as i64;
            asset.scanned = true;
            asset.scanned_at = Some(
                asset
                    .scanned_at
                    .map_or(tally.last_scanned_at, |t| t.max(tally.last_scanned_at)),
            );
        }
    }

    async fn invalidate(&self, id: i64, code: &str) {
        self.read_cache.invalidate(&id_key(id)).await;
        self.read_cache.invalidate(&code_key(code)).await;
    }
}

/// Flush accumulated scans to the database.
async fn flush_scan_buffer(
    storage: &Arc<dyn Storage>,
    buffer: &Arc<DashMap<i64, ScanTally>>,
) -> Result<()> {
    // Collect tallies while zeroing them so concurrent scanners can continue.
    let pending = buffer
        .iter_mut()
        .filter_map(|mut entry| {
            let tally = *entry.value();
            if tally.count == 0 {
                return None;
            }

            *entry.value_mut() = ScanTally::default();
            Some((*entry.key(), tally))
        })
        .collect::<Vec<(i64, ScanTally)>>();

    // Remove entries that stayed empty in case no new scans arrived meanwhile.
    buffer.retain(|_, tally| tally.count > 0);

    for (id, tally) in pending {
        storage
            .record_scans(id, tally.count, tally.last_scanned_at)
            .await?;
    }

    Ok(())
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create(&self, asset: &NewQrAsset) -> StorageResult<QrAsset> {
        let created = self.inner.create(asset).await?;

        self.read_cache
            .insert(code_key(&created.code), Some(created.clone()))
            .await;
        self.read_cache
            .insert(id_key(created.id), Some(created.clone()))
            .await;

        Ok(created)
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<QrAsset>> {
        if let Some(cached) = self.read_cache.get(&code_key(code)).await {
            return Ok(cached);
        }

        let result = self.inner.get_by_code(code).await?;
        self.read_cache
            .insert(code_key(code), result.clone())
            .await;

        Ok(result)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<QrAsset>> {
        if let Some(cached) = self.read_cache.get(&id_key(id)).await {
            return Ok(cached);
        }

        let result = self.inner.get_by_id(id).await?;
        self.read_cache.insert(id_key(id), result.clone()).await;

        Ok(result)
    }

    async fn get_with_metadata(&self, code: &str) -> Result<LookupResult> {
        if let Some(cached) = self.read_cache.get(&code_key(code)).await {
            return Ok(LookupResult {
                asset: cached,
                metadata: LookupMetadata { cache_hit: true },
            });
        }

        let result = self.inner.get_by_code(code).await?;
        self.read_cache
            .insert(code_key(code), result.clone())
            .await;

        Ok(LookupResult {
            asset: result,
            metadata: LookupMetadata { cache_hit: false },
        })
    }

    async fn get_authoritative(&self, code: &str) -> Result<Option<QrAsset>> {
        let db_value = self.inner.get_authoritative(code).await?;

        // Keep the cache in sync with the latest database read.
        self.read_cache
            .insert(code_key(code), db_value.clone())
            .await;
        if let Some(ref asset) = db_value {
            self.read_cache
                .insert(id_key(asset.id), db_value.clone())
                .await;
        }

        let mut result = db_value;
        if let Some(ref mut asset) = result {
            self.apply_buffered(asset);
        }

        Ok(result)
    }

    async fn update(&self, asset: &QrAsset) -> Result<bool> {
        let updated = self.inner.update(asset).await?;

        if updated {
            self.invalidate(asset.id, &asset.code).await;
        }

        Ok(updated)
    }

    async fn mark_scanned(&self, id: i64, code: &str, scanned_at: i64) -> Result<()> {
        self.inner.mark_scanned(id, code, scanned_at).await?;
        self.invalidate(id, code).await;
        Ok(())
    }

    async fn record_scans(&self, id: i64, count: u64, scanned_at: i64) -> Result<()> {
        if count == 0 {
            return Ok(());
        }

        self.scan_buffer
            .entry(id)
            .and_modify(|tally| {
                tally.count += count;
                tally.last_scanned_at = tally.last_scanned_at.max(scanned_at);
            })
            .or_insert(ScanTally {
                count,
                last_scanned_at: scanned_at,
            });

        Ok(())
    }

    async fn delete(&self, id: i64, code: &str) -> Result<bool> {
        let deleted = self.inner.delete(id, code).await?;

        if deleted {
            self.scan_buffer.remove(&id);
            self.invalidate(id, code).await;
        }

        Ok(deleted)
    }

    async fn list(&self, limit: i64, offset: i64, owner: Option<&str>) -> Result<Vec<QrAsset>> {
        let mut assets = self.inner.list(limit, offset, owner).await?;

        for asset in &mut assets {
            self.apply_buffered(asset);
        }

        Ok(assets)
    }
}
