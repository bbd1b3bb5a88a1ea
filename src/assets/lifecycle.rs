use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::external::ImageStore;
use crate::models::QrAsset;
use crate::storage::{Storage, StorageResult};

/// One external delete that did not go through. The blob stays on the host
/// until someone reconciles it by hand.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedDelete {
    pub file_id: String,
    pub error: String,
}

/// Outcome of a full teardown pass over one asset.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted_external: Vec<String>,
    pub failed_external: Vec<FailedDelete>,
    /// False when the row was already gone by the time we deleted it.
    pub local_deleted: bool,
}

/// Tears down an asset and every external blob it references.
///
/// External deletes fan out concurrently and are joined before the local
/// row is touched. The local delete does not depend on their outcome: a
/// leaked blob is recoverable, an undeletable row is not.
pub struct AssetLifecycleCoordinator {
    storage: Arc<dyn Storage>,
    store: Option<Arc<dyn ImageStore>>,
}

impl AssetLifecycleCoordinator {
    pub fn new(storage: Arc<dyn Storage>, store: Option<Arc<dyn ImageStore>>) -> Self {
        Self { storage, store }
    }

    pub async fn destroy(&self, asset: &QrAsset) -> StorageResult<CleanupReport> {
        let file_ids = referenced_file_ids(asset);

        let mut deleted_external = Vec::new();
        let mut failed_external = Vec::new();

        if file_ids.is_empty() {
            // Nothing stored externally.
        } else if let Some(store) = &self.store {
            // Detached tasks: once dispatched, a delete runs to completion
            // even if the caller goes away mid-teardown.
            let mut in_flight = Vec::with_capacity(file_ids.len());
            for file_id in file_ids {
                let store = Arc::clone(store);
                let task_id = file_id.clone();
                let handle = tokio::spawn(async move { store.delete(&task_id).await });
                in_flight.push((file_id, handle));
            }

            for (file_id, handle) in in_flight {
                match handle.await {
                    Ok(Ok(())) => deleted_external.push(file_id),
                    Ok(Err(e)) => {
                        tracing::error!(
                            file_id = %file_id,
                            operation = "delete",
                            error = %e,
                            "external delete failed, blob needs manual reconciliation"
                        );
                        failed_external.push(FailedDelete {
                            file_id,
                            error: e.to_string(),
                        });
                    }
                    Err(e) => {
                        tracing::error!(
                            file_id = %file_id,
                            operation = "delete",
                            error = %e,
                            "external delete task did not complete"
                        );
                        failed_external.push(FailedDelete {
                            file_id,
                            error: e.to_string(),
                        });
                    }
                }
            }
        } else {
            for file_id in file_ids {
                tracing::error!(
                    file_id = %file_id,
                    operation = "delete",
                    "no image store configured, blob needs manual reconciliation"
                );
                failed_external.push(FailedDelete {
                    file_id,
                    error: "no image store configured".to_string(),
                });
            }
        }

        let local_deleted = self.storage.delete(asset.id, &asset.code).await?;
        Ok(CleanupReport {
            deleted_external,
            failed_external,
            local_deleted,
        })
    }
}

/// Every external file id an asset references, de-duplicated: the primary
/// image, the logo, and anything registered by the designer.
fn referenced_file_ids(asset: &QrAsset) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();

    if let Some(id) = asset.external_file_id.as_deref().filter(|v| !v.is_empty()) {
        ids.insert(id.to_string());
    }
    if let Some(id) = asset.logo_file_id.as_deref().filter(|v| !v.is_empty()) {
        ids.insert(id.to_string());
    }
    for upload in &asset.template_data.uploads {
        if !upload.file_id.is_empty() {
            ids.insert(upload.file_id.clone());
        }
    }

    ids
}
