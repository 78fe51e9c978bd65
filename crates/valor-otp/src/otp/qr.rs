//! QR rendering of enrollment URIs.
//!
//! Authenticator apps enroll by scanning the `otpauth://` URI, so the same
//! matrix is offered as a PNG data URI (for UIs and JSON consumers) and as
//! half-block text for a terminal.

use base64::Engine as _;
use image::{ImageEncoder, Luma};
use qrcode::render::unicode::Dense1x2;
use qrcode::QrCode;

use crate::otp::types::*;

/// Pixels per QR module in PNG output.
const MODULE_PX: u32 = 8;

fn encode(text: &str) -> Result<QrCode, OtpError> {
    QrCode::new(text.as_bytes()).map_err(|e| {
        OtpError::new(OtpErrorKind::QrEncodeFailed, "QR encode error").with_detail(e.to_string())
    })
}

/// PNG bytes of a QR code for `text`, with the standard quiet zone.
pub fn qr_png(text: &str, module_px: Option<u32>) -> Result<Vec<u8>, OtpError> {
    let px = module_px.unwrap_or(MODULE_PX).max(1);
    let img = encode(text)?
        .render::<Luma<u8>>()
        .module_dimensions(px, px)
        .build();

    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|e| {
            OtpError::new(OtpErrorKind::QrEncodeFailed, "PNG encode error")
                .with_detail(e.to_string())
        })?;
    Ok(buf)
}

/// `data:image/png;base64,...` for embedding the QR code in HTML.
pub fn qr_data_uri(text: &str) -> Result<String, OtpError> {
    let png = qr_png(text, None)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// The QR code drawn with Unicode half blocks, two modules per character
/// row, dark on light.
pub fn qr_terminal(text: &str) -> Result<String, OtpError> {
    Ok(encode(text)?
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Dark)
        .light_color(Dense1x2::Light)
        .quiet_zone(true)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "otpauth://totp/Valor:alice?secret=JBSWY3DPEHPK3PXP&issuer=Valor";

    #[test]
    fn png_has_magic_bytes() {
        let png = qr_png(URI, None).unwrap();
        assert!(png.len() > 100);
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn module_size_scales_output() {
        let small = qr_png(URI, Some(1)).unwrap();
        let large = qr_png(URI, Some(8)).unwrap();
        assert!(large.len() > small.len());
    }

    #[test]
    fn data_uri_prefix() {
        let uri = qr_data_uri(URI).unwrap();
        assert!(uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn terminal_rendering_is_rectangular() {
        let text = qr_terminal(URI).unwrap();
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.len() > 10);
        assert!(widths.iter().all(|&w| w == widths[0]));
        assert!(text.contains('█') || text.contains('▀') || text.contains('▄'));
    }

    #[test]
    fn oversized_payload_is_an_error() {
        let huge = "A".repeat(8000);
        let err = qr_png(&huge, None).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::QrEncodeFailed);
    }
}
