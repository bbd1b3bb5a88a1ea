use std::sync::Arc;

use base64::prelude::*;

use crate::external::{ImageStore, TransformParams};
use crate::models::QrAsset;

/// Rendition parameters for inline previews.
pub const PREVIEW_TRANSFORM: TransformParams = TransformParams {
    width: 512,
    quality: 80,
    format: None,
};

/// Rendition parameters for downloads. Format is pinned so the attachment
/// filename extension stays honest.
pub const DOWNLOAD_TRANSFORM: TransformParams = TransformParams {
    width: 1024,
    quality: 100,
    format: Some("png"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Preview,
    Download,
}

/// Outcome of resolving an asset to something servable.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Redirectable URL (hosted, thumbnail, transform, or data URL).
    Url(String),
    /// Raw bytes to serve with an attachment disposition.
    Attachment {
        bytes: Vec<u8>,
        file_name: String,
        content_type: &'static str,
    },
    /// The asset has no usable representation. Not an error; the boundary
    /// layer maps this to a not-found response.
    Unavailable,
}

/// Picks exactly one servable representation from an asset's stored fields.
///
/// Strategies run in a fixed priority order and each either produces a
/// result or passes to the next: hosted URL, hosted thumbnail, transform
/// URL built from the stored file id, embedded image. Resolution never
/// fails; an asset with nothing usable resolves to [`Resolved::Unavailable`].
pub struct AssetLocator {
    store: Option<Arc<dyn ImageStore>>,
}

impl AssetLocator {
    pub fn new(store: Option<Arc<dyn ImageStore>>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, asset: &QrAsset, fidelity: Fidelity) -> Resolved {
        self.hosted(asset)
            .or_else(|| self.thumbnail(asset))
            .or_else(|| self.transform(asset, fidelity))
            .or_else(|| self.embedded(asset, fidelity))
            .unwrap_or(Resolved::Unavailable)
    }

    fn hosted(&self, asset: &QrAsset) -> Option<Resolved> {
        present(asset.hosted_url.as_deref()).map(|url| Resolved::Url(url.to_string()))
    }

    fn thumbnail(&self, asset: &QrAsset) -> Option<Resolved> {
        present(asset.hosted_thumbnail_url.as_deref()).map(|url| Resolved::Url(url.to_string()))
    }

    fn transform(&self, asset: &QrAsset, fidelity: Fidelity) -> Option<Resolved> {
        let store = self.store.as_ref()?;
        let file_id = present(asset.external_file_id.as_deref())?;

        let url = match fidelity {
            Fidelity::Preview => store.transform_url(file_id, PREVIEW_TRANSFORM),
            // Downloads stay on the store's edge: ask for the full-size
            // rendition and let the host force the attachment.
            Fidelity::Download => {
                store.attachment_url(&store.transform_url(file_id, DOWNLOAD_TRANSFORM))
            }
        };
        Some(Resolved::Url(url))
    }

    fn embedded(&self, asset: &QrAsset, fidelity: Fidelity) -> Option<Resolved> {
        let embedded = present(asset.embedded_image.as_deref())?;

        match fidelity {
            Fidelity::Preview => Some(Resolved::Url(normalized_data_url(embedded))),
            Fidelity::Download => match embedded_bytes(embedded) {
                Some(bytes) => Some(Resolved::Attachment {
                    bytes,
                    file_name: format!("{}.png", asset.code),
                    content_type: "image/png",
                }),
                None => {
                    tracing::warn!(
                        code = %asset.code,
                        "embedded image is not decodable base64, treating as unavailable"
                    );
                    None
                }
            },
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Stored embedded images are usually full data URLs already; older rows
/// hold bare base64.
fn normalized_data_url(embedded: &str) -> String {
    if embedded.starts_with("data:") {
        embedded.to_string()
    } else {
        format!("data:image/png;base64,{embedded}")
    }
}

fn embedded_bytes(embedded: &str) -> Option<Vec<u8>> {
    let encoded = match embedded.split_once("base64,") {
        Some((_, rest)) => rest,
        None => embedded,
    };
    BASE64_STANDARD.decode(encoded.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::HttpImageStore;
    use crate::models::{PixelShape, TemplateData};

    fn asset() -> QrAsset {
        QrAsset {
            id: 1,
            code: "abc12345".to_string(),
            kind: "url".to_string(),
            payload: "https://example.com".to_string(),
            color: "#000000".to_string(),
            background_color: "#FFFFFF".to_string(),
            pixel_shape: PixelShape::Square,
            hosted_url: None,
            hosted_thumbnail_url: None,
            external_file_id: None,
            embedded_image: None,
            logo_file_id: None,
            template_data: TemplateData::default(),
            scanned: false,
            scanned_at: None,
            scan_count: 0,
            owner: None,
            created_at: 0,
        }
    }

    fn locator_with_store() -> AssetLocator {
        AssetLocator::new(Some(Arc::new(HttpImageStore::new(
            "https://api.store.test",
            "https://media.store.test",
            "key",
        ))))
    }

    #[test]
    fn hosted_url_wins_over_embedded() {
        let mut a = asset();
        a.hosted_url = Some("https://media.store.test/hosted.png".to_string());
        a.embedded_image = Some("data:image/png;base64,aGk=".to_string());

        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("https://media.store.test/hosted.png".to_string())
        );
    }

    #[test]
    fn thumbnail_is_second_in_line() {
        let mut a = asset();
        a.hosted_thumbnail_url = Some("https://media.store.test/thumb.png".to_string());
        a.embedded_image = Some("aGk=".to_string());

        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("https://media.store.test/thumb.png".to_string())
        );
    }

    #[test]
    fn zero_representations_resolve_to_unavailable() {
        let a = asset();
        assert_eq!(
            AssetLocator::new(None).resolve(&a, Fidelity::Preview),
            Resolved::Unavailable
        );
        assert_eq!(
            locator_with_store().resolve(&a, Fidelity::Download),
            Resolved::Unavailable
        );
    }

    #[test]
    fn file_id_builds_a_preview_transform_url() {
        let mut a = asset();
        a.external_file_id = Some("file-9".to_string());

        let resolved = locator_with_store().resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("https://media.store.test/file-9?tr=w-512,q-80".to_string())
        );
    }

    #[test]
    fn download_transform_url_carries_the_attachment_marker() {
        let mut a = asset();
        a.external_file_id = Some("file-9".to_string());

        let resolved = locator_with_store().resolve(&a, Fidelity::Download);
        assert_eq!(
            resolved,
            Resolved::Url(
                "https://media.store.test/file-9?tr=w-1024,q-100,f-png&attachment=true"
                    .to_string()
            )
        );
    }

    #[test]
    fn file_id_without_a_store_falls_through_to_embedded() {
        let mut a = asset();
        a.external_file_id = Some("file-9".to_string());
        a.embedded_image = Some("aGk=".to_string());

        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("data:image/png;base64,aGk=".to_string())
        );
    }

    #[test]
    fn bare_base64_is_normalized_for_previews() {
        let mut a = asset();
        a.embedded_image = Some("aGk=".to_string());

        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("data:image/png;base64,aGk=".to_string())
        );

        a.embedded_image = Some("data:image/png;base64,aGk=".to_string());
        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("data:image/png;base64,aGk=".to_string())
        );
    }

    #[test]
    fn embedded_download_decodes_to_attachment_bytes() {
        let mut a = asset();
        a.embedded_image = Some("data:image/png;base64,aGk=".to_string());

        match AssetLocator::new(None).resolve(&a, Fidelity::Download) {
            Resolved::Attachment {
                bytes,
                file_name,
                content_type,
            } => {
                assert_eq!(bytes, b"hi");
                assert_eq!(file_name, "abc12345.png");
                assert_eq!(content_type, "image/png");
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_embedded_download_is_unavailable() {
        let mut a = asset();
        a.embedded_image = Some("data:image/png;base64,%%%not-base64%%%".to_string());

        assert_eq!(
            AssetLocator::new(None).resolve(&a, Fidelity::Download),
            Resolved::Unavailable
        );
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let mut a = asset();
        a.hosted_url = Some(String::new());
        a.hosted_thumbnail_url = Some(String::new());
        a.embedded_image = Some("aGk=".to_string());

        let resolved = AssetLocator::new(None).resolve(&a, Fidelity::Preview);
        assert_eq!(
            resolved,
            Resolved::Url("data:image/png;base64,aGk=".to_string())
        );
    }
}
