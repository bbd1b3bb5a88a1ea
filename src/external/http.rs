use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ImageStore, StoreError, StoreResult, StoredFile, TransformParams};

/// Query-string marker the host honors for forced downloads.
pub const ATTACHMENT_MARKER: &str = "attachment=true";

/// Client for a hosted image service with URL-based transforms. Uploads
/// carry the file content base64-encoded in a JSON body; renditions are
/// requested by appending transform parameters to the media URL.
pub struct HttpImageStore {
    client: reqwest::Client,
    api_base: String,
    media_base: String,
    api_key: String,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    file: String,
    file_name: &'a str,
    folder: &'a str,
    tags: &'a [&'a str],
    content_type: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    file_id: String,
    url: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
}

impl HttpImageStore {
    pub fn new(api_base: &str, media_base: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            media_base: media_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ImageStore for HttpImageStore {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        folder: &str,
        tags: &[&str],
    ) -> StoreResult<StoredFile> {
        let content_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string();

        let body = UploadBody {
            file: BASE64_STANDARD.encode(bytes),
            file_name,
            folder,
            tags,
            content_type,
        };

        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected {
                operation: "upload",
                status: status.as_u16(),
            });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.into()))?;

        Ok(StoredFile {
            file_id: parsed.file_id,
            url: parsed.url,
            thumbnail_url: parsed.thumbnail_url,
        })
    }

    async fn delete(&self, file_id: &str) -> StoreResult<()> {
        let response = self
            .client
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        // A blob that is already gone counts as deleted.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(StoreError::Rejected {
            operation: "delete",
            status: status.as_u16(),
        })
    }

    fn transform_url(&self, file_id: &str, params: TransformParams) -> String {
        let mut tr = format!("w-{},q-{}", params.width, params.quality);
        if let Some(format) = params.format {
            tr.push_str(",f-");
            tr.push_str(format);
        }
        format!("{}/{}?tr={}", self.media_base, file_id, tr)
    }

    fn attachment_url(&self, url: &str) -> String {
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{ATTACHMENT_MARKER}")
    }
}
