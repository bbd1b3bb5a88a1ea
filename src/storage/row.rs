use anyhow::{Context, Result};
use sqlx::FromRow;

use crate::models::{PixelShape, QrAsset, TemplateData};

/// Row shape shared by the SQLite and Postgres backends. The JSON template
/// column and the pixel-shape tag are decoded here, exactly once; nothing
/// above the storage layer sees raw JSON.
#[derive(Debug, FromRow)]
pub(crate) struct AssetRow {
    pub id: i64,
    pub code: String,
    pub kind: String,
    pub payload: String,
    pub color: String,
    pub background_color: String,
    pub pixel_shape: String,
    pub hosted_url: Option<String>,
    pub hosted_thumbnail_url: Option<String>,
    pub external_file_id: Option<String>,
    pub embedded_image: Option<String>,
    pub logo_file_id: Option<String>,
    pub template_data: String,
    pub scanned: bool,
    pub scanned_at: Option<i64>,
    pub scan_count: i64,
    pub owner: Option<String>,
    pub created_at: i64,
}

impl AssetRow {
    pub(crate) fn into_asset(self) -> Result<QrAsset> {
        let template_data = if self.template_data.is_empty() {
            TemplateData::default()
        } else {
            serde_json::from_str(&self.template_data)
                .with_context(|| format!("corrupt template_data for asset '{}'", self.code))?
        };

        Ok(QrAsset {
            id: self.id,
            code: self.code,
            kind: self.kind,
            payload: self.payload,
            color: self.color,
            background_color: self.background_color,
            pixel_shape: PixelShape::parse(&self.pixel_shape),
            hosted_url: self.hosted_url,
            hosted_thumbnail_url: self.hosted_thumbnail_url,
            external_file_id: self.external_file_id,
            embedded_image: self.embedded_image,
            logo_file_id: self.logo_file_id,
            template_data,
            scanned: self.scanned,
            scanned_at: self.scanned_at,
            scan_count: self.scan_count,
            owner: self.owner,
            created_at: self.created_at,
        })
    }
}

pub(crate) fn template_json(data: &TemplateData) -> Result<String> {
    serde_json::to_string(data).context("failed to serialize template_data")
}
