pub mod cascade;

pub use cascade::*;

use crate::core::PlateResult;
use crate::video::Frame;

/// Sub-rectangle of a frame that likely contains a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlateRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PlateRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Intersects the region with a `width` x `height` frame. Returns `None`
    /// when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<PlateRegion> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let clipped = PlateRegion {
            x: self.x,
            y: self.y,
            width: self.right().min(width) - self.x,
            height: self.bottom().min(height) - self.y,
        };
        if clipped.width == 0 || clipped.height == 0 {
            None
        } else {
            Some(clipped)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Ratio between consecutive search scales, must be above 1
    pub scale_factor: f64,
    /// Overlapping hits a candidate needs to be kept
    pub min_neighbors: u32,
}

impl DetectParams {
    /// Tuning used for plate detection.
    pub const PLATE: DetectParams = DetectParams {
        scale_factor: 1.3,
        min_neighbors: 7,
    };
}

/// Proposes plate regions for a frame. Every returned region lies within the
/// frame; order is unspecified.
pub trait PlateDetector: Send + Sync {
    fn detect(&self, frame: &Frame, params: &DetectParams) -> PlateResult<Vec<PlateRegion>>;
}
