use crate::detect::PlateRegion;
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

pub const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// One decoded RGB frame and its position in the stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copies the region out of the frame. The region must already be
    /// clipped to the frame.
    pub fn crop(&self, region: &PlateRegion) -> RgbImage {
        imageops::crop_imm(&self.image, region.x, region.y, region.width, region.height).to_image()
    }

    /// Draws a 2 pixel marker along the inside of the region.
    pub fn draw_marker(&mut self, region: &PlateRegion) {
        let outer = Rect::at(region.x as i32, region.y as i32).of_size(region.width, region.height);
        draw_hollow_rect_mut(&mut self.image, outer, MARKER_COLOR);
        if region.width > 2 && region.height > 2 {
            let inner = Rect::at(region.x as i32 + 1, region.y as i32 + 1)
                .of_size(region.width - 2, region.height - 2);
            draw_hollow_rect_mut(&mut self.image, inner, MARKER_COLOR);
        }
    }
}
