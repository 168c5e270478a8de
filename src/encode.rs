//! Raster encoders for rendered pages.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use std::io::{Cursor, Write};

/// Raster codecs an image archive can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageCodec {
    Jpeg,
    Png,
}

impl ImageCodec {
    /// Parse a codec from a MIME type (`image/jpeg`) or a bare name (`jpg`).
    /// Matching ignores case, and `jpeg`/`jpg` are the same codec.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let name = name.strip_prefix("image/").unwrap_or(&name);
        match name {
            "jpeg" | "jpg" => Some(ImageCodec::Jpeg),
            "png" => Some(ImageCodec::Png),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "image/jpeg",
            ImageCodec::Png => "image/png",
        }
    }

    /// File extension for archive entries.
    ///
    /// The MIME subtype is `jpeg`, but `jpg` is what most tools expect on disk.
    pub fn extension(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "jpg",
            ImageCodec::Png => "png",
        }
    }
}

impl std::fmt::Display for ImageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Encode a page surface with `codec`. `quality` only affects JPEG.
pub fn encode_page(image: &RgbaImage, codec: ImageCodec, quality: u8) -> Result<Vec<u8>, String> {
    match codec {
        ImageCodec::Jpeg => encode_jpeg(image, quality),
        ImageCodec::Png => encode_png(image),
    }
}

/// JPEG has no alpha, so the page is composited onto black first. A blank
/// margin comes out black and the colour of transparent pixels never shows.
fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, String> {
    let rgb = flatten_onto_black(image);
    let (width, height) = rgb.dimensions();
    let (width, height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(format!("{}x{} is too large for JPEG", width, height)),
    };

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    if quality >= 90 {
        encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_4_4);
    } else {
        encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    }
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| format!("Failed to encode JPEG: {}", e))?;

    Ok(jpeg_bytes)
}

fn flatten_onto_black(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
        Rgb([scale(r), scale(g), scale(b)])
    })
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| format!("Failed to encode PNG: {}", e))?;
    Ok(png_bytes)
}

/// A page encoded losslessly for PDF embedding: zlib-compressed 8-bit RGB
/// samples plus, when the page has any transparency, a zlib-compressed
/// 8-bit alpha plane for the soft mask.
#[derive(Debug, Clone)]
pub struct LosslessImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Option<Vec<u8>>,
}

impl LosslessImage {
    pub fn encode(image: &RgbaImage) -> Result<Self, String> {
        let (width, height) = image.dimensions();
        let pixel_count = (width as usize) * (height as usize);

        let mut rgb_data = Vec::with_capacity(pixel_count * 3);
        let mut alpha_data = Vec::with_capacity(pixel_count);
        for chunk in image.as_raw().chunks(4) {
            rgb_data.extend_from_slice(&chunk[..3]);
            alpha_data.push(chunk[3]);
        }

        let alpha = if alpha_data.iter().any(|&a| a < 255) {
            Some(deflate(&alpha_data)?)
        } else {
            None
        };

        Ok(Self {
            width,
            height,
            rgb: deflate(&rgb_data)?,
            alpha,
        })
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| format!("Failed to compress image data: {}", e))?;
    encoder
        .finish()
        .map_err(|e| format!("Failed to finish compression: {}", e))
}
