//! Encoded and decoded image values held by the cache.

use std::sync::Arc;

use bytes::Bytes;
use image::{ImageError, ImageFormat, RgbaImage};

/// Compressed image bytes as they came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    bytes: Bytes,
    format: ImageFormat,
}

impl EncodedImage {
    /// Sniff the container format of `bytes`.
    ///
    /// Fails when the bytes do not start like any supported image format.
    pub fn from_bytes(bytes: Bytes) -> Result<Self, ImageError> {
        let format = image::guess_format(&bytes)?;
        Ok(Self { bytes, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode into an RGBA bitmap. CPU bound.
    pub fn decompress(&self) -> Result<Bitmap, ImageError> {
        let decoded = image::load_from_memory_with_format(&self.bytes, self.format)?;
        Ok(Bitmap(Arc::new(decoded.to_rgba8())))
    }
}

/// Decoded RGBA image. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.0
    }

    /// Memory charged against the decoded tier: rows padded to 16 bytes.
    pub fn cost(&self) -> usize {
        decoded_cost(self.width(), self.height())
    }
}

/// Bytes a `width` x `height` RGBA bitmap occupies with 16-byte row alignment.
pub fn decoded_cost(width: u32, height: u32) -> usize {
    let row = (width as usize * 4).next_multiple_of(16);
    row * height as usize
}
