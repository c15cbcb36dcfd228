pub mod tesseract;

pub use tesseract::*;

use crate::core::PlateResult;
use image::RgbImage;

/// Reads text from a cropped plate image. Blocking and potentially slow.
pub trait TextExtractor: Send + Sync {
    /// Recognized text with surrounding whitespace removed; empty when
    /// nothing was read.
    fn recognize(&self, region: &RgbImage) -> PlateResult<String>;
}
