//! Image input boundary: format detection, filtering and decoding.
//!
//! Only PNG input becomes a layer. Anything else is filtered out before it
//! reaches the layer stack.

use image::RgbaImage;

use crate::error::{RenderError, RenderResult};

/// A decoded raster ready for compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// RGBA pixels, 8 bits per channel, straight alpha.
    pub pixels: RgbaImage,
    /// Format the raster was decoded from.
    pub format: ImageFormat,
}

impl Raster {
    /// Wrap already decoded pixels.
    #[must_use]
    pub fn new(pixels: RgbaImage, format: ImageFormat) -> Self {
        Self { pixels, format }
    }

    /// Create a raster filled with one color.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, image::Rgba(rgba)),
            format: ImageFormat::Unknown,
        }
    }

    /// Intrinsic width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Intrinsic height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Image container formats recognised at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG, the only format that becomes a layer.
    Png,
    /// JPEG.
    Jpeg,
    /// GIF.
    Gif,
    /// WebP.
    WebP,
    /// Anything else.
    Unknown,
}

/// Leading bytes of each recognised container. WebP is checked separately.
const SIGNATURES: &[(&[u8], ImageFormat)] = &[
    (b"\x89PNG\r\n\x1a\n", ImageFormat::Png),
    (b"\xFF\xD8\xFF", ImageFormat::Jpeg),
    (b"GIF87a", ImageFormat::Gif),
    (b"GIF89a", ImageFormat::Gif),
];

impl ImageFormat {
    /// Format implied by a file extension, case-insensitive.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "webp" => Self::WebP,
            _ => Self::Unknown,
        }
    }

    /// Format implied by a MIME type such as `image/png`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        mime.trim()
            .to_ascii_lowercase()
            .strip_prefix("image/")
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Format identified by the file signature.
    #[must_use]
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if let Some((_, format)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
            return *format;
        }
        if data.get(0..4) == Some(b"RIFF".as_slice()) && data.get(8..12) == Some(b"WEBP".as_slice()) {
            return Self::WebP;
        }
        Self::Unknown
    }

    /// Format of a named file. The signature wins; the extension is only
    /// consulted when the bytes are not recognised.
    #[must_use]
    pub fn detect(name: &str, data: &[u8]) -> Self {
        match Self::from_magic_bytes(data) {
            Self::Unknown => std::path::Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(Self::Unknown, Self::from_extension),
            format => format,
        }
    }
}

/// Whether a file is accepted as a layer source.
///
/// Only PNG is accepted. Content wins over the name, so a renamed JPEG is
/// still rejected.
#[must_use]
pub fn accepts_input(name: &str, data: &[u8]) -> bool {
    ImageFormat::detect(name, data) == ImageFormat::Png
}

/// Decode raw bytes into a raster.
///
/// # Errors
///
/// Returns an error if the image cannot be decoded.
pub fn decode_image(data: &[u8]) -> RenderResult<Raster> {
    let format = ImageFormat::from_magic_bytes(data);

    let img = image::load_from_memory(data).map_err(|e| RenderError::Decode(e.to_string()))?;

    Ok(Raster::new(img.to_rgba8(), format))
}

/// Read an image's dimensions from its header without decoding the pixels.
///
/// # Errors
///
/// Returns an error if the format is not recognised or the header is malformed.
pub fn probe_dimensions(data: &[u8]) -> RenderResult<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| RenderError::Decode(e.to_string()))
}

/// Decode an accepted input file.
///
/// # Errors
///
/// Returns [`RenderError::UnsupportedFormat`] for anything but PNG, or a
/// decode error if the PNG is malformed.
pub fn decode_input(name: &str, data: &[u8]) -> RenderResult<Raster> {
    if !accepts_input(name, data) {
        return Err(RenderError::UnsupportedFormat(name.to_string()));
    }
    decode_image(data)
}

/// Raw bytes and declared MIME type of a `data:` URI.
///
/// Both `;base64` and percent-encoded payloads are understood.
///
/// # Errors
///
/// Returns [`RenderError::Resource`] if the URI or its payload is malformed.
pub fn data_uri_bytes(uri: &str) -> RenderResult<(String, Vec<u8>)> {
    let malformed = |why: &str| RenderError::Resource(format!("Malformed data URI: {why}"));

    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(|| malformed("expected `data:<type>,<payload>`"))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default().to_string();
    let bytes = if params.any(|p| p.eq_ignore_ascii_case("base64")) {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| malformed(&e.to_string()))?
    } else {
        percent_decode(payload).ok_or_else(|| malformed("bad percent escape"))?
    };
    Ok((mime, bytes))
}

/// Decode a layer source given as a `data:` URI.
///
/// The payload goes through the same PNG filter as uploaded files.
///
/// # Errors
///
/// Returns an error if the URI is malformed, the payload is not PNG, or
/// decoding fails.
pub fn decode_data_uri(uri: &str) -> RenderResult<Raster> {
    let (mime, bytes) = data_uri_bytes(uri)?;
    if ImageFormat::from_magic_bytes(&bytes) != ImageFormat::Png {
        return Err(RenderError::UnsupportedFormat(mime));
    }
    decode_image(&bytes)
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut rest = input.as_bytes();
    while let Some((&first, tail)) = rest.split_first() {
        if first == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            out.push(first);
            rest = tail;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 PNG
    const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

    fn png_bytes() -> Vec<u8> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(PNG_BASE64)
            .expect("valid base64")
    }

    #[test]
    fn test_signatures() {
        assert_eq!(ImageFormat::from_magic_bytes(&png_bytes()), ImageFormat::Png);
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xDB]),
            ImageFormat::Jpeg
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a..."), ImageFormat::Gif);
        assert_eq!(
            ImageFormat::from_magic_bytes(b"RIFF\x10\x00\x00\x00WEBPVP8 "),
            ImageFormat::WebP
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"RIFF"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_magic_bytes(&[]), ImageFormat::Unknown);
    }

    #[test]
    fn test_names_and_mime_types() {
        assert_eq!(ImageFormat::from_extension("PnG"), ImageFormat::Png);
        assert_eq!(ImageFormat::from_extension("jpeg"), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_extension("tiff"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::from_mime(" IMAGE/PNG "), ImageFormat::Png);
        assert_eq!(ImageFormat::from_mime("image/gif"), ImageFormat::Gif);
        assert_eq!(ImageFormat::from_mime("text/png"), ImageFormat::Unknown);
        assert_eq!(ImageFormat::detect("layer.png", b"??"), ImageFormat::Png);
    }

    #[test]
    fn test_accepts_only_png() {
        assert!(accepts_input("a.png", &png_bytes()));
        assert!(accepts_input("renamed.bin", &png_bytes()));
        assert!(!accepts_input("photo.png", &[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
        assert!(!accepts_input("notes.txt", b"hello world"));
    }

    #[test]
    fn test_decode_input_rejects_other_formats() {
        let result = decode_input("notes.txt", b"hello world");
        assert!(matches!(result, Err(RenderError::UnsupportedFormat(_))));

        let raster = decode_input("dot.png", &png_bytes()).expect("decodes");
        assert_eq!((raster.width(), raster.height()), (1, 1));
        assert_eq!(raster.format, ImageFormat::Png);
    }

    #[test]
    fn test_dimensions_come_from_header_only() {
        assert_eq!(probe_dimensions(&png_bytes()).expect("probe"), (1, 1));
        assert!(probe_dimensions(b"hello world").is_err());
    }

    #[test]
    fn test_corrupt_png_is_a_decode_error() {
        let mut bytes = png_bytes();
        bytes.truncate(20);
        assert!(matches!(decode_image(&bytes), Err(RenderError::Decode(_))));
    }

    #[test]
    fn test_data_uri_sources() {
        let raster = decode_data_uri(&format!("data:image/png;base64,{PNG_BASE64}"))
            .expect("base64 PNG decodes");
        assert_eq!((raster.width(), raster.height()), (1, 1));

        let (mime, bytes) = data_uri_bytes("data:text/plain,a%20b%41").expect("parses");
        assert_eq!(mime, "text/plain");
        assert_eq!(bytes, b"a bA");

        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(RenderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_malformed_data_uris() {
        assert!(data_uri_bytes("image/png;base64,AAAA").is_err());
        assert!(data_uri_bytes("data:image/png").is_err());
        assert!(data_uri_bytes("data:,%zz").is_err());
        assert!(data_uri_bytes("data:,%4").is_err());
        assert!(data_uri_bytes("data:;base64,***").is_err());
    }

    #[test]
    fn test_solid_raster() {
        let raster = Raster::solid(2, 3, [255, 0, 0, 255]);
        assert_eq!((raster.width(), raster.height()), (2, 3));
        assert_eq!(raster.pixels.get_pixel(1, 2).0, [255, 0, 0, 255]);
    }
}
