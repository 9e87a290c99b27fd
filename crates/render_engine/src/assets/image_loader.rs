//! Image decoding for texture data
//!
//! Any format the `image` crate understands is decoded and converted to RGBA8.

use std::path::Path;

use image::{DynamicImage, ImageError};

use crate::assets::AssetError;
use crate::render::commands::TextureDesc;

/// Decoded RGBA8 image, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading image from: {:?}", path);

        let image = image::open(path).map_err(decode_error)?;
        let data = Self::from_dynamic(image)?;

        log::info!("Loaded image {}x{} from {:?}", data.width, data.height, path);
        Ok(data)
    }

    /// Decode an image held in memory (embedded resources)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes).map_err(decode_error)?;
        let data = Self::from_dynamic(image)?;

        log::debug!("Loaded image {}x{} from memory", data.width, data.height);
        Ok(data)
    }

    /// Single-color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
        }
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    fn from_dynamic(image: DynamicImage) -> Result<Self, AssetError> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidDimensions { width, height });
        }
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }
}

fn decode_error(error: ImageError) -> AssetError {
    match error {
        ImageError::IoError(e) => AssetError::Io(e),
        other => AssetError::Decode(other.to_string()),
    }
}

impl TextureDesc {
    /// RGBA8 texture request from a decoded image
    ///
    /// Rows are flipped so the first row in memory is the bottom of the
    /// image, which is what texture coordinates with v up expect.
    ///
    /// # Errors
    /// [`AssetError::InvalidDimensions`] for an empty image and
    /// [`AssetError::Decode`] when the pixel data does not cover it.
    pub fn from_image(image: &ImageData) -> Result<Self, AssetError> {
        let (width, height) = (image.width, image.height);
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidDimensions { width, height });
        }
        let row = (width as usize)
            .checked_mul(4)
            .ok_or(AssetError::InvalidDimensions { width, height })?;
        let expected = row
            .checked_mul(height as usize)
            .ok_or(AssetError::InvalidDimensions { width, height })?;
        if image.data.len() != expected {
            return Err(AssetError::Decode(format!(
                "{}x{} image holds {} bytes of pixel data, expected {}",
                width,
                height,
                image.data.len(),
                expected
            )));
        }

        let pixels = image.data.chunks_exact(row).rev().flatten().copied().collect();
        Ok(Self::rgba8(width, height, pixels))
    }
}

impl TryFrom<ImageData> for TextureDesc {
    type Error = AssetError;

    fn try_from(image: ImageData) -> Result<Self, Self::Error> {
        Self::from_image(&image)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_png_from_bytes() {
        let mut source = RgbaImage::from_pixel(2, 3, Rgba([0, 0, 255, 255]));
        source.put_pixel(1, 0, Rgba([255, 255, 255, 128]));

        let img = ImageData::from_bytes(&png_bytes(&source)).unwrap();
        assert_eq!((img.width, img.height), (2, 3));
        assert_eq!(&img.data[4..8], &[255, 255, 255, 128]);
        assert_eq!(img.size_bytes(), 2 * 3 * 4);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = ImageData::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ImageData::from_file("/nonexistent/texture.png").unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("render_engine_image_{}.png", std::process::id()));
        std::fs::write(&path, png_bytes(&RgbaImage::from_pixel(4, 2, Rgba([9, 8, 7, 6])))).unwrap();

        let img = ImageData::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!((img.width, img.height), (4, 2));
        assert_eq!(&img.data[..4], &[9, 8, 7, 6]);
    }

    #[test]
    fn test_texture_desc_flips_rows() {
        let mut img = ImageData::solid_color(1, 2, [0, 0, 0, 255]);
        img.data[..4].copy_from_slice(&[255, 0, 0, 255]);

        let desc = TextureDesc::try_from(img).unwrap();
        assert!(desc.validate().is_ok());
        assert_eq!((desc.width, desc.height), (1, 2));
        assert_eq!(&desc.pixels[..4], &[0, 0, 0, 255]);
        assert_eq!(&desc.pixels[4..], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_empty_image_is_not_a_texture() {
        let empty = ImageData::solid_color(0, 4, [255, 255, 255, 255]);
        assert!(matches!(
            TextureDesc::from_image(&empty),
            Err(AssetError::InvalidDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_truncated_pixel_data_is_not_a_texture() {
        let mut img = ImageData::solid_color(2, 2, [1, 2, 3, 4]);
        img.data.truncate(12);
        assert!(matches!(TextureDesc::from_image(&img), Err(AssetError::Decode(_))));
    }
}
