use image::{imageops, RgbaImage};
use thiserror::Error;

/// Fraction of the canvas edge the logo may occupy.
const LOGO_EDGE_RATIO: f32 = 0.2;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("failed to decode logo image: {0}")]
    Decode(#[source] image::ImageError),
}

/// Scale the logo to at most 20% of the canvas edge (aspect preserved,
/// never cropped) and alpha-composite it over the center.
///
/// A failure here must not abort QR generation; callers log the error as a
/// warning and keep the untouched canvas.
pub fn overlay_logo(canvas: &mut RgbaImage, logo_bytes: &[u8]) -> Result<(), CompositeError> {
    let logo = image::load_from_memory(logo_bytes).map_err(CompositeError::Decode)?;

    let box_edge = (canvas.width().min(canvas.height()) as f32 * LOGO_EDGE_RATIO) as u32;
    let resized = logo
        .resize(box_edge, box_edge, imageops::FilterType::Lanczos3)
        .to_rgba8();

    let x = (canvas.width() - resized.width()) / 2;
    let y = (canvas.height() - resized.height()) / 2;
    imageops::overlay(canvas, &resized, i64::from(x), i64::from(y));

    Ok(())
}
