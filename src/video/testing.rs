//! In-memory sources, detectors and extractors for driving the playback loop
//! without ffmpeg, cascade files or tesseract.

use crate::core::{HistoryLedger, PlateError, PlateResult};
use crate::detect::{DetectParams, PlateDetector, PlateRegion};
use crate::ocr::TextExtractor;
use crate::video::{Frame, FrameSource, PlaybackController, PlaybackEvent, SourceOpener, VideoSource};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub const FAKE_FRAME_WIDTH: u32 = 64;
pub const FAKE_FRAME_HEIGHT: u32 = 48;
const FAKE_FRAME_COLOR: Rgb<u8> = Rgb([90, 90, 90]);

pub fn temp_ledger_path() -> PathBuf {
    std::env::temp_dir().join(format!("plate-watch-ledger-{}.csv", uuid::Uuid::new_v4()))
}

#[derive(Default)]
struct OpenerState {
    held: AtomicBool,
    reads: AtomicU64,
    opens: AtomicU64,
}

/// Opens synthetic sources. Clones share counters so a test can keep one
/// handle while the controller owns another.
#[derive(Clone)]
pub struct FakeOpener {
    frame_limit: Option<u64>,
    available: bool,
    refused: Option<VideoSource>,
    endless: Option<VideoSource>,
    state: Arc<OpenerState>,
}

impl FakeOpener {
    pub fn finite(frames: u64) -> Self {
        Self {
            frame_limit: Some(frames),
            available: true,
            refused: None,
            endless: None,
            state: Arc::default(),
        }
    }

    /// Never runs out of frames, like a camera.
    pub fn endless() -> Self {
        Self {
            frame_limit: None,
            available: true,
            refused: None,
            endless: None,
            state: Arc::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            frame_limit: Some(0),
            available: false,
            refused: None,
            endless: None,
            state: Arc::default(),
        }
    }

    /// Refuses `source`; any other source opens normally.
    pub fn refusing(mut self, source: VideoSource) -> Self {
        self.refused = Some(source);
        self
    }

    /// Opening `source` gives an endless stream regardless of the frame limit.
    pub fn endless_for(mut self, source: VideoSource) -> Self {
        self.endless = Some(source);
        self
    }

    /// Whether an opened source has not been released yet.
    pub fn is_held(&self) -> bool {
        self.state.held.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.state.reads.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u64 {
        self.state.opens.load(Ordering::SeqCst)
    }
}

impl SourceOpener for FakeOpener {
    fn open(&self, source: &VideoSource) -> PlateResult<Box<dyn FrameSource>> {
        if !self.available || self.refused.as_ref() == Some(source) {
            return Err(PlateError::source_unavailable(source.to_string(), "fake source is offline"));
        }
        if self.state.held.swap(true, Ordering::SeqCst) {
            return Err(PlateError::source_unavailable(source.to_string(), "already in use"));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            remaining: if self.endless.as_ref() == Some(source) { None } else { self.frame_limit },
            next_index: 0,
            released: false,
            state: self.state.clone(),
        }))
    }
}

pub struct FakeSource {
    remaining: Option<u64>,
    next_index: u64,
    released: bool,
    state: Arc<OpenerState>,
}

impl FrameSource for FakeSource {
    fn read(&mut self) -> PlateResult<Option<Frame>> {
        if self.released {
            return Ok(None);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        let image = RgbImage::from_pixel(FAKE_FRAME_WIDTH, FAKE_FRAME_HEIGHT, FAKE_FRAME_COLOR);
        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state.held.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Returns the same regions for every frame.
pub struct FixedDetector {
    regions: Vec<PlateRegion>,
}

impl FixedDetector {
    pub fn new(regions: Vec<PlateRegion>) -> Self {
        Self { regions }
    }
}

impl PlateDetector for FixedDetector {
    fn detect(&self, _frame: &Frame, _params: &DetectParams) -> PlateResult<Vec<PlateRegion>> {
        Ok(self.regions.clone())
    }
}

pub struct FailingDetector;

impl PlateDetector for FailingDetector {
    fn detect(&self, _frame: &Frame, _params: &DetectParams) -> PlateResult<Vec<PlateRegion>> {
        Err(PlateError::Detection("fake detector failure".to_string()))
    }
}

type RecognizeFn = dyn Fn(&RgbImage) -> PlateResult<String> + Send + Sync;

pub struct FnExtractor {
    recognize: Box<RecognizeFn>,
}

impl FnExtractor {
    pub fn new(recognize: impl Fn(&RgbImage) -> PlateResult<String> + Send + Sync + 'static) -> Self {
        Self {
            recognize: Box::new(recognize),
        }
    }
}

impl TextExtractor for FnExtractor {
    fn recognize(&self, region: &RgbImage) -> PlateResult<String> {
        (self.recognize)(region)
    }
}

pub fn controller_with(
    opener: &FakeOpener,
    detector: impl PlateDetector + 'static,
    extractor: FnExtractor,
    ledger_path: &Path,
) -> (PlaybackController, Receiver<PlaybackEvent>) {
    let ledger = HistoryLedger::open(ledger_path).expect("temp ledger opens");
    PlaybackController::new(
        Arc::new(opener.clone()),
        Arc::new(detector),
        Arc::new(extractor),
        ledger,
    )
}
