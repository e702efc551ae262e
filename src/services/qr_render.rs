//! Renders a redemption code into a scannable QR image.
//!
//! Pure function of the code string: the same input always yields a
//! bit-identical PNG. Error correction is HIGH so codes survive worn
//! printouts and dim phone screens at the gate.

use image::{ImageBuffer, Luma};
use qrcode::{EcLevel, QrCode};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Output image edge length in pixels.
const IMAGE_SIZE: u32 = 200;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    // The codec keeps codes far below EC-H capacity, but the bound is
    // checked here rather than assumed.
    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Renders `code` as a 200x200 grayscale PNG and returns it base64-encoded.
pub fn render_png_base64(code: &str) -> Result<String, RenderError> {
    let qr = QrCode::with_error_correction_level(code.as_bytes(), EcLevel::H)?;
    let width = qr.width() as u32;

    // Nearest-neighbor scale of the module grid onto a fixed-size canvas.
    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(IMAGE_SIZE, IMAGE_SIZE);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let module_x = (x * width / IMAGE_SIZE).min(width - 1) as usize;
        let module_y = (y * width / IMAGE_SIZE).min(width - 1) as usize;
        *pixel = match qr[(module_x, module_y)] {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(BASE64.encode(png_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TKT-1766998800-00000042-xK3mPq9Z-20261229";

    #[test]
    fn test_render_produces_png() {
        let b64 = render_png_base64(SAMPLE).unwrap();
        let bytes = BASE64.decode(b64).unwrap();
        // PNG magic header
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render_png_base64(SAMPLE).unwrap(), render_png_base64(SAMPLE).unwrap());
    }

    #[test]
    fn test_render_rejects_oversized_input() {
        // EC level H tops out well below 8 KiB of input.
        let oversized = "x".repeat(8192);
        assert!(matches!(
            render_png_base64(&oversized),
            Err(RenderError::Qr(_))
        ));
    }

    #[test]
    fn test_image_dimensions_are_fixed() {
        let bytes = BASE64.decode(render_png_base64(SAMPLE).unwrap()).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (IMAGE_SIZE, IMAGE_SIZE));
    }
}
