//! Image loading keyed on the file extension.
//!
//! The extension alone picks the decode route: `.jpg`, `.jpeg` and `.png` go
//! through the generic raster decoder, `.heic` and `.heif` through libheif.
//! Anything else is rejected before the file is touched.

use std::fmt;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{
    DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage,
};
use tracing::debug;

/// Upper bound for the encoded image carried inline in a request.
pub const MAX_INLINE_BYTES: usize = 14_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("No such file: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to open image file: {0}")]
    Raster(String),

    #[error("Failed to process HEIC file: {0}")]
    Heif(String),

    #[error("Failed to encode image for upload: {0}")]
    Encode(String),
}

/// Decode route selected from a path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Heif,
}

impl ImageKind {
    /// Case-insensitive extension lookup. Performs no I/O.
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let ext = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        match ext.as_str() {
            ".jpg" | ".jpeg" => Ok(Self::Jpeg),
            ".png" => Ok(Self::Png),
            ".heic" | ".heif" => Ok(Self::Heif),
            _ => Err(ImageError::UnsupportedFormat(ext)),
        }
    }

    fn decode_error(self, message: String) -> ImageError {
        match self {
            Self::Jpeg | Self::Png => ImageError::Raster(message),
            Self::Heif => ImageError::Heif(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelMode {
    L,
    La,
    Rgb,
    Rgba,
}

impl PixelMode {
    pub fn channels(self) -> usize {
        match self {
            Self::L => 1,
            Self::La => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::La | Self::Rgba)
    }

    fn of(image: &DynamicImage) -> Self {
        let color = image.color();
        match (color.has_color(), color.has_alpha()) {
            (false, false) => Self::L,
            (false, true) => Self::La,
            (true, false) => Self::Rgb,
            (true, true) => Self::Rgba,
        }
    }
}

impl fmt::Display for PixelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L => "L",
            Self::La => "LA",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        };
        f.write_str(name)
    }
}

/// The two decode routes. Split out so callers can observe which one a path takes.
pub trait Decoder {
    fn decode_raster(&self, path: &Path) -> Result<DynamicImage, ImageError>;
    fn decode_heif(&self, path: &Path) -> Result<DynamicImage, ImageError>;
}

/// Decodes with the `image` crate, and with libheif when the `heic` feature is on.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDecoder;

impl Decoder for SystemDecoder {
    fn decode_raster(&self, path: &Path) -> Result<DynamicImage, ImageError> {
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| io_error(ImageKind::Png, path, e))?;

        reader.decode().map_err(|e| match e {
            image::ImageError::IoError(e) => io_error(ImageKind::Png, path, e),
            other => ImageError::Raster(other.to_string()),
        })
    }

    #[cfg(feature = "heic")]
    fn decode_heif(&self, path: &Path) -> Result<DynamicImage, ImageError> {
        use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

        let heif_err = |e: libheif_rs::HeifError| ImageError::Heif(e.to_string());

        let path_str = path
            .to_str()
            .ok_or_else(|| ImageError::Heif("path is not valid UTF-8".to_string()))?;
        let context = HeifContext::read_from_file(path_str).map_err(heif_err)?;
        let handle = context.primary_image_handle().map_err(heif_err)?;

        let (mode, chroma) = if handle.has_alpha_channel() {
            (PixelMode::Rgba, RgbChroma::Rgba)
        } else {
            (PixelMode::Rgb, RgbChroma::Rgb)
        };

        let lib_heif = LibHeif::new();
        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(heif_err)?;
        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| ImageError::Heif("decoded image has no interleaved plane".to_string()))?;

        bitmap_from_strided(mode, plane.width, plane.height, plane.data, plane.stride)
    }

    #[cfg(not(feature = "heic"))]
    fn decode_heif(&self, _path: &Path) -> Result<DynamicImage, ImageError> {
        Err(ImageError::Heif("HEIC support not compiled in".to_string()))
    }
}

fn io_error(kind: ImageKind, path: &Path, e: io::Error) -> ImageError {
    if e.kind() == io::ErrorKind::NotFound {
        ImageError::NotFound(path.to_path_buf())
    } else {
        kind.decode_error(e.to_string())
    }
}

/// Rebuilds a tightly packed bitmap from rows that may carry trailing padding.
pub fn bitmap_from_strided(
    mode: PixelMode,
    width: u32,
    height: u32,
    data: &[u8],
    stride: usize,
) -> Result<DynamicImage, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::Heif(format!("empty bitmap ({width}x{height})")));
    }

    let row_len = width as usize * mode.channels();
    if stride < row_len {
        return Err(ImageError::Heif(format!(
            "stride {stride} is shorter than a row of {row_len} bytes"
        )));
    }

    let needed = stride * (height as usize - 1) + row_len;
    if data.len() < needed {
        return Err(ImageError::Heif(format!(
            "pixel buffer holds {} bytes, expected at least {needed}",
            data.len()
        )));
    }

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    let image = match mode {
        PixelMode::L => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        PixelMode::La => {
            GrayAlphaImage::from_raw(width, height, pixels).map(DynamicImage::ImageLumaA8)
        }
        PixelMode::Rgb => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        PixelMode::Rgba => RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
    };

    image.ok_or_else(|| {
        ImageError::Heif(format!(
            "buffer does not fit a {width}x{height} {mode} image"
        ))
    })
}

/// An image held in memory for a single request.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: DynamicImage,
    kind: ImageKind,
}

/// Encoded bytes ready to be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl DecodedImage {
    pub fn new(pixels: DynamicImage, kind: ImageKind) -> Self {
        Self { pixels, kind }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn mode(&self) -> PixelMode {
        PixelMode::of(&self.pixels)
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Encodes as JPEG, or PNG when there is an alpha channel, shrinking by
    /// 10% steps until the bytes fit in `max_bytes`.
    pub fn encode_for_upload(&self, max_bytes: usize) -> Result<EncodedImage, ImageError> {
        let (format, mime_type) = if self.mode().has_alpha() {
            (ImageFormat::Png, "image/png")
        } else {
            (ImageFormat::Jpeg, "image/jpeg")
        };

        let mut data = encode(&self.pixels, format)?;
        let mut width = self.width();
        let mut height = self.height();

        while data.len() > max_bytes {
            if width <= 100 || height <= 100 {
                return Err(ImageError::Encode(format!(
                    "could not shrink image below {max_bytes} bytes"
                )));
            }

            width = (width as f32 * 0.9) as u32;
            height = (height as f32 * 0.9) as u32;

            let resized = self.pixels.resize(width, height, FilterType::Lanczos3);
            data = encode(&resized, format)?;
            debug!(width, height, bytes = data.len(), "downscaled upload");
        }

        debug!(mime_type, bytes = data.len(), "encoded upload");
        Ok(EncodedImage { mime_type, data })
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let converted = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    };

    let mut cursor = Cursor::new(Vec::new());
    converted
        .write_to(&mut cursor, format)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Loads `path` with the system decoders.
pub fn load(path: &Path) -> Result<DecodedImage, ImageError> {
    load_with(path, &SystemDecoder)
}

pub fn load_with<D: Decoder + ?Sized>(
    path: &Path,
    decoder: &D,
) -> Result<DecodedImage, ImageError> {
    let kind = ImageKind::from_path(path)?;

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ImageError::NotFound(path.to_path_buf())),
        Err(e) => return Err(io_error(kind, path, e)),
    }

    debug!(path = %path.display(), ?kind, "decoding image");
    let pixels = match kind {
        ImageKind::Jpeg | ImageKind::Png => decoder.decode_raster(path)?,
        ImageKind::Heif => decoder.decode_heif(path)?,
    };

    let image = DecodedImage::new(pixels, kind);
    debug!(
        width = image.width(),
        height = image.height(),
        mode = %image.mode(),
        "decoded image"
    );
    Ok(image)
}
