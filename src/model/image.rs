//! Image references fetched from the exam server.

use serde::Serialize;

/// An image in the exam, positionally aligned with its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// Server-side image identifier
    pub id: u64,
    /// Absolute URL of the image asset
    pub url: String,
    /// Native width in pixels, known once the image has loaded
    pub pixel_width: Option<u32>,
    /// Native height in pixels, known once the image has loaded
    pub pixel_height: Option<u32>,
}

impl ImageRef {
    /// Create a reference whose dimensions are not yet known.
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            pixel_width: None,
            pixel_height: None,
        }
    }

    /// Set the native dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.pixel_width = Some(width);
        self.pixel_height = Some(height);
        self
    }

    /// Native dimensions, if the image has been loaded.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.pixel_width.zip(self.pixel_height)
    }
}
