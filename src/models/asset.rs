use serde::{Deserialize, Serialize};

/// Shape used for the dark modules of a rendered QR image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelShape {
    #[default]
    Square,
    Round,
    Mixed,
}

impl PixelShape {
    /// Parse a stored or user-supplied shape name. Unknown values degrade to
    /// `Square` instead of failing the request.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "square" => PixelShape::Square,
            "round" | "dots" => PixelShape::Round,
            "mixed" => PixelShape::Mixed,
            other => {
                tracing::warn!(shape = %other, "unknown pixel shape, falling back to square");
                PixelShape::Square
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PixelShape::Square => "square",
            PixelShape::Round => "round",
            PixelShape::Mixed => "mixed",
        }
    }
}

/// One file registered by the designer against an asset. The blob itself
/// lives in the external store; we only keep the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateUpload {
    pub file_id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Role of the upload within the template (cover, logo, other).
    #[serde(default = "TemplateUpload::default_kind")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl TemplateUpload {
    fn default_kind() -> String {
        "other".to_string()
    }
}

/// Designer state attached to an asset. Parsed from the JSON column exactly
/// once, in the storage layer; handlers never touch raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateData {
    #[serde(default)]
    pub uploads: Vec<TemplateUpload>,
    /// Opaque designer payload (layout, fonts). Round-tripped untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub design: serde_json::Value,
}

impl TemplateData {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.design.is_null()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrAsset {
    pub id: i64,
    /// Public identifier; the only one exposed to scanners.
    pub code: String,
    pub kind: String,
    pub payload: String,
    pub color: String,
    pub background_color: String,
    pub pixel_shape: PixelShape,
    pub hosted_url: Option<String>,
    pub hosted_thumbnail_url: Option<String>,
    pub external_file_id: Option<String>,
    pub embedded_image: Option<String>,
    pub logo_file_id: Option<String>,
    pub template_data: TemplateData,
    pub scanned: bool,
    pub scanned_at: Option<i64>,
    pub scan_count: i64,
    pub owner: Option<String>,
    pub created_at: i64,
}

/// Everything the storage layer needs to insert a fresh asset row. The id
/// and creation time are assigned by the backend.
#[derive(Debug, Clone)]
pub struct NewQrAsset {
    pub code: String,
    pub kind: String,
    pub payload: String,
    pub color: String,
    pub background_color: String,
    pub pixel_shape: PixelShape,
    pub hosted_url: Option<String>,
    pub hosted_thumbnail_url: Option<String>,
    pub external_file_id: Option<String>,
    pub embedded_image: Option<String>,
    pub logo_file_id: Option<String>,
    pub template_data: TemplateData,
    pub owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub payload: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub pixel_shape: Option<String>,
    /// Base64-encoded logo image, composited onto the QR center.
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub template_data: Option<TemplateData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAssetRequest {
    pub payload: Option<String>,
    pub color: Option<String>,
    pub background_color: Option<String>,
    pub pixel_shape: Option<String>,
    /// Base64-encoded replacement logo; triggers regeneration.
    pub logo: Option<String>,
    pub template_data: Option<TemplateData>,
}

impl UpdateAssetRequest {
    /// True when the patch touches anything that feeds the encoder.
    pub fn regenerates_image(&self) -> bool {
        self.payload.is_some()
            || self.color.is_some()
            || self.background_color.is_some()
            || self.pixel_shape.is_some()
            || self.logo.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadDesignRequest {
    /// Base64-encoded file content.
    pub data: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}
