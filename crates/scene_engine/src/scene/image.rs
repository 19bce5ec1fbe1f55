//! Image descriptors used as sampler sources and render targets

use crate::foundation::collections::ImageKey;
use crate::foundation::stamp::Versioned;

use super::library::{impl_entity, Edit, EntityKind};

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// 8-bit RGBA
    #[default]
    Rgba8,
    /// 8-bit RGB
    Rgb8,
    /// 8-bit single channel
    R8,
    /// 32-bit float RGBA
    Rgba32F,
    /// 24-bit depth
    Depth24,
}

/// An image; pixel storage belongs to the backend
#[derive(Debug)]
pub struct Image {
    id: String,
    versions: Versioned,
    width: u32,
    height: u32,
    format: ImageFormat,
}

impl Image {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            versions: Versioned::default(),
            width: 0,
            height: 0,
            format: ImageFormat::default(),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel format
    pub fn format(&self) -> ImageFormat {
        self.format
    }
}

impl_entity!(Image, ImageKey, EntityKind::Image, images);

impl Edit<'_, Image> {
    /// Resize the image
    pub fn set_size(&mut self, width: u32, height: u32) {
        if (self.width, self.height) == (width, height) {
            return;
        }
        let image = self.entity_mut();
        image.width = width;
        image.height = height;
        self.touch_structure();
    }

    /// Change the texel format
    pub fn set_format(&mut self, format: ImageFormat) {
        if self.format == format {
            return;
        }
        self.entity_mut().format = format;
        self.touch_structure();
    }
}
