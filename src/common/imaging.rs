use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};

use crate::error::ServiceError;

const DATA_URL_PREFIX: &str = "base64,";

/// Decodes an encoded image (JPEG, PNG, ...) received from a client or the sidecar.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ServiceError> {
    image::load_from_memory(bytes).map_err(|e| ServiceError::FrameDecode(e.to_string()))
}

pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, ServiceError> {
    let mut buffer = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| ServiceError::FrameDecode(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Accepts plain base64 as well as `data:image/jpeg;base64,` URLs.
pub fn decode_base64(value: &str) -> Option<Vec<u8>> {
    let payload = match value.find(DATA_URL_PREFIX) {
        Some(start) if value.starts_with("data:") => &value[start + DATA_URL_PREFIX.len()..],
        _ => value,
    };
    general_purpose::STANDARD.decode(payload.trim()).ok()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, Rgba};

    #[test]
    fn jpeg_round_trip_keeps_dimensions() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(24, 16, Rgba([9, 8, 7, 255])));
        let encoded = encode_jpeg(&img).unwrap();
        let decoded = decode_image(&encoded).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(ServiceError::FrameDecode(_))
        ));
    }

    #[test]
    fn strips_data_url_prefix() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(4, 4, Rgb([1, 2, 3])));
        let encoded = encode_jpeg(&img).unwrap();
        let url = format!("data:image/jpeg;base64,{}", encode_base64(&encoded));
        assert_eq!(decode_base64(&url), Some(encoded.clone()));
        assert_eq!(decode_base64(&encode_base64(&encoded)), Some(encoded));
        assert_eq!(decode_base64("%%%"), None);
    }
}
