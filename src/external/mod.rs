pub mod http;

pub use http::HttpImageStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("image store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image store rejected {operation}: status {status}")]
    Rejected { operation: &'static str, status: u16 },
    #[error("image store returned an unreadable response: {0}")]
    Malformed(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One stored blob as reported by the external host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_id: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Parameters understood by the host's URL-based image pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformParams {
    pub width: u32,
    pub quality: u8,
    pub format: Option<&'static str>,
}

/// Third-party host for generated images: upload, delete, and URL-based
/// transformation. Deletes are best-effort for callers; failures are
/// reported, never retried here.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        folder: &str,
        tags: &[&str],
    ) -> StoreResult<StoredFile>;

    async fn delete(&self, file_id: &str) -> StoreResult<()>;

    /// Build a URL that serves a transformed rendition of a stored file.
    fn transform_url(&self, file_id: &str, params: TransformParams) -> String;

    /// Annotate a transform URL so browsers download instead of render.
    fn attachment_url(&self, url: &str) -> String;
}

/// Derive a collision-resistant stored name from the original name and the
/// file content. Identical bytes always map to the same name.
pub fn hashed_file_name(name: &str, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let tag = digest
        .iter()
        .take(5)
        .map(|b| format!("{b:02x}"))
        .collect::<String>();

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{tag}.{ext}"),
        _ => format!("{name}-{tag}"),
    }
}
