// Plate detection through OpenCV's cascade classifier.
//
// Frames arrive as RGB; the classifier runs on a grayscale copy and its
// rectangles are clipped back to the frame before they leave this module.

use crate::core::{PlateError, PlateResult};
use crate::detect::{DetectParams, PlateDetector, PlateRegion};
use crate::video::Frame;
use image::RgbImage;
use opencv::{
    core::{self, Mat, Rect, Scalar, Size},
    imgproc, objdetect,
    prelude::*,
};
use std::path::Path;
use std::sync::Mutex;

/// Plate detector backed by a Haar cascade model file.
pub struct CascadeDetector {
    classifier: Mutex<objdetect::CascadeClassifier>,
}

impl CascadeDetector {
    pub fn load(path: impl AsRef<Path>) -> PlateResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PlateError::model_load(path, "file not found"));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| PlateError::model_load(path, "path is not valid UTF-8"))?;

        let classifier = objdetect::CascadeClassifier::new(path_str)
            .map_err(|e| PlateError::model_load(path, e))?;
        if classifier.empty().map_err(|e| PlateError::model_load(path, e))? {
            return Err(PlateError::model_load(path, "not a cascade classifier model"));
        }

        log::info!("Loaded cascade {}", path.display());
        Ok(Self {
            classifier: Mutex::new(classifier),
        })
    }
}

impl PlateDetector for CascadeDetector {
    fn detect(&self, frame: &Frame, params: &DetectParams) -> PlateResult<Vec<PlateRegion>> {
        if !(params.scale_factor > 1.0) {
            return Err(PlateError::Detection(format!(
                "scale factor must be above 1, got {}",
                params.scale_factor
            )));
        }

        let gray = gray_mat(&frame.image).map_err(detection_error)?;
        let mut rects = core::Vector::<Rect>::new();
        {
            let mut classifier = self
                .classifier
                .lock()
                .map_err(|_| PlateError::Detection("classifier lock poisoned".to_string()))?;
            classifier
                .detect_multi_scale(
                    &gray,
                    &mut rects,
                    params.scale_factor,
                    params.min_neighbors as i32,
                    0,
                    Size::default(),
                    Size::default(),
                )
                .map_err(detection_error)?;
        }

        let regions: Vec<PlateRegion> = rects
            .iter()
            .filter_map(|rect| region_from_rect(rect, frame.width(), frame.height()))
            .collect();
        log::debug!("Frame {}: {} plate candidate(s)", frame.index, regions.len());
        Ok(regions)
    }
}

fn detection_error(e: opencv::Error) -> PlateError {
    PlateError::Detection(e.to_string())
}

/// Copies an RGB image into an 8-bit single channel `Mat`.
fn gray_mat(image: &RgbImage) -> opencv::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());

    let mut gray = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut gray,
        imgproc::COLOR_RGB2GRAY,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(gray)
}

fn region_from_rect(rect: Rect, frame_width: u32, frame_height: u32) -> Option<PlateRegion> {
    let x = rect.x.max(0);
    let y = rect.y.max(0);
    let right = rect.x.saturating_add(rect.width);
    let bottom = rect.y.saturating_add(rect.height);
    if right <= x || bottom <= y {
        return None;
    }
    PlateRegion::new(x as u32, y as u32, (right - x) as u32, (bottom - y) as u32)
        .clip_to(frame_width, frame_height)
}
