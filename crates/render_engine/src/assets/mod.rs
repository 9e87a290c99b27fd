//! Asset loading
//!
//! Decodes image files into pixel data the renderer can turn into textures.

pub mod image_loader;

pub use image_loader::ImageData;

use thiserror::Error;

/// Asset loading errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Contents could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Decoded image has an unusable size
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
}
