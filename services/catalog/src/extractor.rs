//! Attribute extraction for raw media assets.
//!
//! Decodes the asset bytes to derive dimensions, codec and orientation, and
//! derives tags from the original file name. Nothing here touches a store.

use crate::error::{IngestError, Result};
use crate::models::{Design, Orientation, Resolution};
use image::ImageFormat;

/// Extensions accepted by the batch importer before any decoding happens
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

const CONTENT_TYPE_IMAGE: &str = "image";
const UNIT_PIXELS: i32 = 1;

/// Decode `data` and build the design block for `file_name`
pub fn extract_design(data: &[u8], file_name: &str) -> Result<Design> {
    let format = image::guess_format(data)
        .map_err(|e| IngestError::unsupported(file_name, format!("unrecognized encoding: {e}")))?;

    let codec = codec_name(format).ok_or_else(|| {
        IngestError::unsupported(file_name, format!("encoding {format:?} is not allowed"))
    })?;

    let decoded = image::load_from_memory_with_format(data, format)
        .map_err(|e| IngestError::unsupported(file_name, format!("failed to decode image: {e}")))?;

    let width = decoded.width();
    let height = decoded.height();

    Ok(Design {
        template_id: None,
        resolution: Resolution {
            width,
            height,
            unit: UNIT_PIXELS,
        },
        content_type: CONTENT_TYPE_IMAGE.to_string(),
        tags: extract_tags(file_name),
        file_format: normalize_format(codec),
        orientation: Orientation::from_dimensions(width, height),
        file_name: file_name.to_string(),
    })
}

/// Codec name for the allow-listed encodings
fn codec_name(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpeg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        _ => None,
    }
}

/// Uppercase codec name with the `JPG` alias folded into `JPEG`
pub fn normalize_format(codec: &str) -> String {
    let upper = codec.to_uppercase();
    if upper == "JPG" {
        "JPEG".to_string()
    } else {
        upper
    }
}

/// Split the file stem on `_`; no filtering or normalization
pub fn extract_tags(file_name: &str) -> Vec<String> {
    let stem = match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    };

    if stem.is_empty() {
        return Vec::new();
    }

    stem.split('_').map(String::from).collect()
}

/// Lowercased extension of `file_name`, if any
pub fn file_extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Cheap extension check used before reading a file
pub fn has_supported_extension(file_name: &str) -> bool {
    file_extension(file_name)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// MIME type for an uppercase codec name
pub fn content_type_for(file_format: &str) -> &'static str {
    match file_format {
        "JPEG" => "image/jpeg",
        "PNG" => "image/png",
        "GIF" => "image/gif",
        _ => "application/octet-stream",
    }
}
