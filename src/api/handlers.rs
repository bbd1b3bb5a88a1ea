use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assets::{
    AssetLifecycleCoordinator, AssetLocator, CleanupReport, Fidelity, Resolved,
};
use crate::external::{hashed_file_name, ImageStore, StoredFile};
use crate::models::{
    CreateAssetRequest, NewQrAsset, PixelShape, QrAsset, TemplateUpload, UpdateAssetRequest,
    UploadDesignRequest,
};
use crate::qr::{self, EncodeError, QrStyle, DEFAULT_BACKGROUND, DEFAULT_COLOR};
use crate::storage::{Storage, StorageError};

const QR_FOLDER: &str = "qr-codes";
const DESIGN_FOLDER: &str = "qr-designs";

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub store: Option<Arc<dyn ImageStore>>,
    pub locator: AssetLocator,
    pub lifecycle: AssetLifecycleCoordinator,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// An asset plus any non-fatal problems hit while producing it. A request
/// that degraded (logo skipped, upload failed) still succeeds; the
/// warnings tell the client what it lost.
#[derive(Serialize)]
pub struct AssetResponse {
    #[serde(flatten)]
    pub asset: QrAsset,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
pub struct ImageResponse {
    pub url: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: CleanupReport,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub owner: Option<String>,
}

fn default_limit() -> i64 {
    50
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const CODE_LETTERS: usize = 52;
const CODE_LENGTH: usize = 8;

/// Generate a random public code. The first character is always a letter
/// so a code can never look like a numeric internal id to the scan
/// endpoint's dual lookup.
fn generate_code() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    let mut code = String::with_capacity(CODE_LENGTH);
    code.push(CODE_ALPHABET[rng.random_range(0..CODE_LETTERS)] as char);
    for _ in 1..CODE_LENGTH {
        code.push(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char);
    }
    code
}

/// Accepts both bare base64 and full data URLs.
fn decode_base64_payload(input: &str) -> Option<Vec<u8>> {
    let encoded = match input.split_once("base64,") {
        Some((_, rest)) => rest,
        None => input,
    };
    BASE64_STANDARD.decode(encoded.trim()).ok()
}

struct GeneratedImage {
    png: Vec<u8>,
    embedded: String,
    /// Decoded logo bytes, present only when the overlay actually landed
    /// on the canvas.
    logo_bytes: Option<Vec<u8>>,
}

/// Encode the QR image and composite the optional logo. Only encoding
/// failures are fatal; logo problems degrade to the plain image with a
/// warning.
fn generate_image(
    payload: &str,
    style: &QrStyle,
    logo: Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<GeneratedImage, EncodeError> {
    let mut canvas = qr::encode(payload, style)?;

    let mut logo_bytes = None;
    if let Some(encoded) = logo {
        match decode_base64_payload(encoded) {
            Some(bytes) => match qr::overlay_logo(&mut canvas, &bytes) {
                Ok(()) => logo_bytes = Some(bytes),
                Err(e) => {
                    tracing::warn!(error = %e, "logo compositing failed, serving plain QR image");
                    warnings.push(format!("logo could not be applied: {}", e));
                }
            },
            None => {
                tracing::warn!("logo is not valid base64, serving plain QR image");
                warnings.push("logo is not valid base64; generated without it".to_string());
            }
        }
    }

    let png = qr::to_png(&canvas)?;
    let embedded = qr::to_data_url(&png);
    Ok(GeneratedImage {
        png,
        embedded,
        logo_bytes,
    })
}

fn logo_file_name(bytes: &[u8]) -> String {
    let ext = image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin");
    hashed_file_name(&format!("logo.{}", ext), bytes)
}

/// Push the generated image (and logo, when present) to the external
/// store. Failures are warnings: the embedded copy always remains as the
/// fallback representation.
async fn upload_generated(
    store: &Arc<dyn ImageStore>,
    png: &[u8],
    logo_bytes: Option<&[u8]>,
    warnings: &mut Vec<String>,
) -> (Option<StoredFile>, Option<String>) {
    let stored = match store
        .upload(png, &hashed_file_name("qr.png", png), QR_FOLDER, &["qr"])
        .await
    {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(error = %e, operation = "upload", "image upload failed, keeping embedded copy only");
            warnings.push(format!(
                "image upload failed: {}; the embedded copy will be served",
                e
            ));
            None
        }
    };

    let logo_file_id = match logo_bytes {
        Some(bytes) => match store
            .upload(bytes, &logo_file_name(bytes), QR_FOLDER, &["logo"])
            .await
        {
            Ok(stored) => Some(stored.file_id),
            Err(e) => {
                tracing::warn!(error = %e, operation = "upload", "logo upload failed");
                warnings.push(format!("logo upload failed: {}", e));
                None
            }
        },
        None => None,
    };

    (stored, logo_file_id)
}

fn encode_failure(err: EncodeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        EncodeError::EmptyPayload | EncodeError::PayloadTooLong(_) => StatusCode::BAD_REQUEST,
        EncodeError::Png(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Create a new QR asset
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<AssetResponse>), (StatusCode, Json<ErrorResponse>)> {
    let mut warnings = Vec::new();

    let shape = payload
        .pixel_shape
        .as_deref()
        .map(PixelShape::parse)
        .unwrap_or_default();
    let color = payload
        .color
        .clone()
        .unwrap_or_else(|| DEFAULT_COLOR.to_string());
    let background_color = payload
        .background_color
        .clone()
        .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string());

    // The stored style keeps whatever the client sent; invalid colors
    // degrade to the defaults inside resolve at render time.
    let style = QrStyle::resolve(&color, &background_color, shape);

    let generated = generate_image(
        &payload.payload,
        &style,
        payload.logo.as_deref(),
        &mut warnings,
    )
    .map_err(encode_failure)?;

    let mut hosted_url = None;
    let mut hosted_thumbnail_url = None;
    let mut external_file_id = None;
    let mut logo_file_id = None;

    if let Some(store) = &state.store {
        let (stored, logo_id) = upload_generated(
            store,
            &generated.png,
            generated.logo_bytes.as_deref(),
            &mut warnings,
        )
        .await;
        if let Some(stored) = stored {
            hosted_url = Some(stored.url);
            hosted_thumbnail_url = stored.thumbnail_url;
            external_file_id = Some(stored.file_id);
        }
        logo_file_id = logo_id;
    }

    let kind = payload.kind.clone().unwrap_or_else(|| {
        if payload.payload.starts_with("http://") || payload.payload.starts_with("https://") {
            "url".to_string()
        } else {
            "text".to_string()
        }
    });

    let mut new_asset = NewQrAsset {
        code: generate_code(),
        kind,
        payload: payload.payload,
        color,
        background_color,
        pixel_shape: shape,
        hosted_url,
        hosted_thumbnail_url,
        external_file_id,
        embedded_image: Some(generated.embedded),
        logo_file_id,
        template_data: payload.template_data.unwrap_or_default(),
        owner: payload.owner,
    };

    // Codes are random; retry a handful of times on the rare collision.
    let mut attempts = 0;
    let created = loop {
        match state.storage.create(&new_asset).await {
            Ok(asset) => break asset,
            Err(StorageError::Conflict) if attempts < 10 => {
                attempts += 1;
                new_asset.code = generate_code();
            }
            Err(StorageError::Conflict) => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Failed to allocate a unique code".to_string(),
                    }),
                ));
            }
            Err(StorageError::Other(e)) => {
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("Failed to create asset: {}", e),
                    }),
                ));
            }
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(AssetResponse {
            asset: created,
            warnings,
        }),
    ))
}

/// Get a QR asset by code
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<QrAsset>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.get_by_code(&code).await {
        Ok(Some(asset)) => Ok(Json(asset)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "QR asset not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to get asset: {}", e),
            }),
        )),
    }
}

/// Resolve the preview image for an asset
pub async fn get_asset_image(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ImageResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.get_by_code(&code).await {
        Ok(Some(asset)) => match state.locator.resolve(&asset, Fidelity::Preview) {
            Resolved::Url(url) => Ok(Json(ImageResponse { url })),
            Resolved::Attachment { .. } | Resolved::Unavailable => Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Asset has no servable image".to_string(),
                }),
            )),
        },
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "QR asset not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to get asset: {}", e),
            }),
        )),
    }
}

/// Download the asset image at full fidelity
pub async fn download_asset(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.get_by_code(&code).await {
        Ok(Some(asset)) => match state.locator.resolve(&asset, Fidelity::Download) {
            Resolved::Url(url) => Ok(Redirect::temporary(&url).into_response()),
            Resolved::Attachment {
                bytes,
                file_name,
                content_type,
            } => {
                let disposition = format!("attachment; filename=\"{}\"", file_name);
                Ok((
                    [
                        (header::CONTENT_TYPE, content_type.to_string()),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    bytes,
                )
                    .into_response())
            }
            Resolved::Unavailable => Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Asset has no servable image".to_string(),
                }),
            )),
        },
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "QR asset not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to get asset: {}", e),
            }),
        )),
    }
}

/// Update an asset, regenerating the image when style or payload change
pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(request): Json<UpdateAssetRequest>,
) -> Result<Json<AssetResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut asset = match state.storage.get_authoritative(&code).await {
        Ok(Some(asset)) => asset,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "QR asset not found".to_string(),
                }),
            ))
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to get asset: {}", e),
                }),
            ))
        }
    };

    let mut warnings = Vec::new();
    let regenerate = request.regenerates_image();

    if let Some(payload) = request.payload {
        asset.payload = payload;
    }
    if let Some(color) = request.color {
        asset.color = color;
    }
    if let Some(background_color) = request.background_color {
        asset.background_color = background_color;
    }
    if let Some(shape) = request.pixel_shape.as_deref() {
        asset.pixel_shape = PixelShape::parse(shape);
    }
    if let Some(template_data) = request.template_data {
        asset.template_data = template_data;
    }

    if regenerate {
        let style = QrStyle::resolve(&asset.color, &asset.background_color, asset.pixel_shape);
        let generated =
            generate_image(&asset.payload, &style, request.logo.as_deref(), &mut warnings)
                .map_err(encode_failure)?;

        if asset.logo_file_id.is_some() && request.logo.is_none() {
            warnings.push(
                "existing logo was not re-applied; supply the logo again to keep it".to_string(),
            );
        }

        // Blobs from the previous rendition go stale once the fields swap.
        let mut stale_blobs = Vec::new();
        if let Some(old) = asset.external_file_id.take() {
            stale_blobs.push(old);
        }
        if generated.logo_bytes.is_some() {
            if let Some(old) = asset.logo_file_id.take() {
                stale_blobs.push(old);
            }
        }

        asset.hosted_url = None;
        asset.hosted_thumbnail_url = None;
        asset.embedded_image = Some(generated.embedded.clone());

        if let Some(store) = &state.store {
            let (stored, logo_id) = upload_generated(
                store,
                &generated.png,
                generated.logo_bytes.as_deref(),
                &mut warnings,
            )
            .await;
            if let Some(stored) = stored {
                asset.hosted_url = Some(stored.url);
                asset.hosted_thumbnail_url = stored.thumbnail_url;
                asset.external_file_id = Some(stored.file_id);
            }
            if logo_id.is_some() {
                asset.logo_file_id = logo_id;
            }

            for file_id in stale_blobs {
                if let Err(e) = store.delete(&file_id).await {
                    tracing::warn!(file_id = %file_id, operation = "delete", error = %e, "failed to delete replaced blob");
                    warnings.push(format!(
                        "previous file {} could not be deleted: {}",
                        file_id, e
                    ));
                }
            }
        } else {
            for file_id in stale_blobs {
                tracing::warn!(file_id = %file_id, operation = "delete", "no image store configured, replaced blob left behind");
                warnings.push(format!(
                    "previous file {} was left behind (no image store configured)",
                    file_id
                ));
            }
        }
    }

    match state.storage.update(&asset).await {
        Ok(true) => Ok(Json(AssetResponse { asset, warnings })),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "QR asset not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to update asset: {}", e),
            }),
        )),
    }
}

/// Delete an asset and its external blobs
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let asset = match state.storage.get_authoritative(&code).await {
        Ok(Some(asset)) => asset,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "QR asset not found".to_string(),
                }),
            ))
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to get asset: {}", e),
                }),
            ))
        }
    };

    match state.lifecycle.destroy(&asset).await {
        Ok(report) => Ok(Json(DeleteResponse {
            message: "QR asset deleted".to_string(),
            report,
        })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to delete asset: {}", e),
            }),
        )),
    }
}

/// Register a designer file against an asset
pub async fn upload_design_file(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(request): Json<UploadDesignRequest>,
) -> Result<(StatusCode, Json<TemplateUpload>), (StatusCode, Json<ErrorResponse>)> {
    let store = match &state.store {
        Some(store) => store,
        None => {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "No image store configured; design uploads are disabled".to_string(),
                }),
            ))
        }
    };

    let mut asset = match state.storage.get_authoritative(&code).await {
        Ok(Some(asset)) => asset,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "QR asset not found".to_string(),
                }),
            ))
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to get asset: {}", e),
                }),
            ))
        }
    };

    let bytes = match decode_base64_payload(&request.data) {
        Some(bytes) => bytes,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Upload data is not valid base64".to_string(),
                }),
            ))
        }
    };

    let stored = match store
        .upload(
            &bytes,
            &hashed_file_name(&request.name, &bytes),
            DESIGN_FOLDER,
            &["design"],
        )
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            return Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: format!("Image store rejected the upload: {}", e),
                }),
            ))
        }
    };

    let upload = TemplateUpload {
        file_id: stored.file_id,
        url: Some(stored.url),
        kind: request.kind.unwrap_or_else(|| "other".to_string()),
        name: Some(request.name),
    };
    asset.template_data.uploads.push(upload.clone());

    match state.storage.update(&asset).await {
        Ok(true) => Ok((StatusCode::CREATED, Json(upload))),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "QR asset not found".to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to update asset: {}", e),
            }),
        )),
    }
}

/// List QR assets
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<QrAsset>>, (StatusCode, Json<ErrorResponse>)> {
    match state
        .storage
        .list(query.limit, query.offset, query.owner.as_deref())
        .await
    {
        Ok(assets) => Ok(Json(assets)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to list assets: {}", e),
            }),
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_start_with_a_letter() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.chars().next().unwrap().is_ascii_alphabetic());
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn base64_payload_accepts_data_urls_and_bare_base64() {
        assert_eq!(
            decode_base64_payload("data:image/png;base64,aGk=").as_deref(),
            Some(b"hi".as_slice())
        );
        assert_eq!(decode_base64_payload("aGk=").as_deref(), Some(b"hi".as_slice()));
        assert!(decode_base64_payload("%%%").is_none());
    }

    #[test]
    fn logo_file_names_carry_the_detected_extension() {
        let png = {
            let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
            let mut bytes = Vec::new();
            image
                .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
                .unwrap();
            bytes
        };
        assert!(logo_file_name(&png).ends_with(".png"));
        assert!(logo_file_name(b"not an image").ends_with(".bin"));
    }
}
