use base64::prelude::*;
use image::{ImageFormat, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

use crate::models::PixelShape;

use super::style::QrStyle;

/// Rendered edge length in pixels. Every generated image is this square.
pub const CANVAS_EDGE: u32 = 512;

/// Quiet zone around the symbol, in modules.
const QUIET_ZONE_MODULES: u32 = 1;

/// Finder patterns occupy 7x7 modules in three corners of the symbol.
const FINDER_EDGE: u32 = 7;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload is empty")]
    EmptyPayload,
    #[error("payload of {0} bytes exceeds QR capacity at the high error-correction level")]
    PayloadTooLong(usize),
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Encode `payload` into a styled QR raster.
///
/// The symbol always uses the high error-correction level so that roughly
/// 30% of the modules can be damaged or covered by a logo and still scan.
pub fn encode(payload: &str, style: &QrStyle) -> Result<RgbaImage, EncodeError> {
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }

    // The only other failure mode without a forced version is running out
    // of symbol capacity.
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
        .map_err(|_| EncodeError::PayloadTooLong(payload.len()))?;

    let modules = code.width() as u32;
    let colors = code.to_colors();
    let total = modules + 2 * QUIET_ZONE_MODULES;
    let scale = CANVAS_EDGE / total;
    // Center the symbol; the integer remainder widens the quiet zone.
    let origin = (CANVAS_EDGE - scale * total) / 2 + scale * QUIET_ZONE_MODULES;

    let mut canvas = RgbaImage::from_pixel(CANVAS_EDGE, CANVAS_EDGE, style.light);
    for my in 0..modules {
        for mx in 0..modules {
            if colors[(my * modules + mx) as usize] == Color::Dark {
                paint_module(&mut canvas, mx, my, modules, scale, origin, style);
            }
        }
    }

    Ok(canvas)
}

/// Encode the raster as PNG bytes.
pub fn to_png(image: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64_STANDARD.encode(png))
}

fn paint_module(
    canvas: &mut RgbaImage,
    mx: u32,
    my: u32,
    modules: u32,
    scale: u32,
    origin: u32,
    style: &QrStyle,
) {
    let x0 = origin + mx * scale;
    let y0 = origin + my * scale;

    // Finder patterns stay square in every style so locators keep their
    // expected geometry.
    let round = match style.shape {
        PixelShape::Square => false,
        PixelShape::Round => !in_finder(mx, my, modules),
        PixelShape::Mixed => !in_finder(mx, my, modules) && (mx + my) % 2 == 1,
    };

    if round {
        let radius = scale as f32 / 2.0;
        let cx = x0 as f32 + radius;
        let cy = y0 as f32 + radius;
        for y in y0..y0 + scale {
            for x in x0..x0 + scale {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= radius * radius {
                    canvas.put_pixel(x, y, style.dark);
                }
            }
        }
    } else {
        for y in y0..y0 + scale {
            for x in x0..x0 + scale {
                canvas.put_pixel(x, y, style.dark);
            }
        }
    }
}

fn in_finder(mx: u32, my: u32, modules: u32) -> bool {
    let near = |v: u32| v < FINDER_EDGE;
    let far = |v: u32| v >= modules - FINDER_EDGE;
    (near(mx) && near(my)) || (far(mx) && near(my)) || (near(mx) && far(my))
}
