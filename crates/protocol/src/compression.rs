//! PNG compression for rosbridge frames
//!
//! A rosbridge server may wrap an envelope as `{"op":"png","data":"<base64>"}`.
//! The base64 payload is a PNG image whose raw 8-bit samples, read in raster
//! order, spell out the JSON text of the inner envelope. Unused trailing
//! samples are padding.
//!
//! ## Example
//!
//! ```
//! use rosbridge_protocol::compression::{compress_png, decompress_png};
//!
//! let text = br#"{"op":"publish","topic":"/t","msg":{"a":1}}"#;
//! let data = compress_png(text).unwrap();
//! let raw = decompress_png(&data).unwrap();
//! assert_eq!(raw, text.to_vec());
//! ```

use crate::error::{ProtocolError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// Compression requested in a `subscribe` op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Plain JSON frames
    #[default]
    None,
    /// Frames wrapped in a PNG image
    Png,
}

impl CompressionType {
    /// Returns the wire name of the compression
    pub fn name(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Png => "png",
        }
    }
}

/// Padding byte used to fill the last pixels of the image
const PADDING: u8 = b'\n';

/// Decodes the base64 PNG payload of a compressed frame into the inner JSON text
pub fn decompress_png(data: &str) -> Result<Vec<u8>> {
    let png = STANDARD.decode(data.trim())?;
    let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;

    let mut raw = image.as_bytes().to_vec();
    while matches!(raw.last(), Some(&b) if b == 0 || b.is_ascii_whitespace()) {
        raw.pop();
    }

    Ok(raw)
}

/// Packs JSON text into an RGB PNG and returns it base64-encoded
pub fn compress_png(text: &[u8]) -> Result<String> {
    let pixels = text.len().div_ceil(3).max(1);
    let width = (pixels as f64).sqrt().ceil() as u32;
    let height = (pixels as u32).div_ceil(width);

    let mut raster = text.to_vec();
    raster.resize((width * height * 3) as usize, PADDING);

    let len = raster.len();
    let image = RgbImage::from_raw(width, height, raster)
        .ok_or(ProtocolError::InvalidRaster { len, width, height })?;

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut png, ImageFormat::Png)?;

    Ok(STANDARD.encode(png.into_inner()))
}
