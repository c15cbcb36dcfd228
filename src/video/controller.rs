// =============================================================================
// PLAYBACK CONTROLLER
// =============================================================================
//
// One worker thread per started source. The worker owns the frame source,
// runs detection and OCR on every frame, records plates in the ledger and
// posts typed events to the UI in submission order. The UI only touches the
// pause/stop flags and joins the worker on stop.
//
// =============================================================================

use crate::core::{HistoryLedger, PlateRecord, PlateResult};
use crate::detect::{DetectParams, PlateDetector, PlateRegion};
use crate::ocr::TextExtractor;
use crate::video::{Frame, FrameSource, SourceOpener, VideoSource};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Delay between loop iterations, also the pause polling period.
pub const POLL_INTERVAL: Duration = Duration::from_millis(30);

// =============================================================================
// EVENTS AND STATE
// =============================================================================

/// Updates posted from the worker to the UI thread
#[derive(Debug)]
pub enum PlaybackEvent {
    /// Processed frame, with markers drawn on recognized plates
    FrameReady(Frame),
    /// First non-empty plate text of a frame
    TextRecognized(String),
    /// A plate was added to the session history
    PlateRecorded(PlateRecord),
    /// The ledger file could not be written; the session entry is kept
    PersistenceFailed(String),
    /// The source ran out of frames or could not be read any more
    StreamEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
    Paused,
}

/// Flags shared between the controller and its worker.
#[derive(Debug, Default)]
struct PlaybackFlags {
    paused: AtomicBool,
    stop: AtomicBool,
    finished: AtomicBool,
}

type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct EventSink {
    sender: mpsc::Sender<PlaybackEvent>,
    waker: Option<Waker>,
}

impl EventSink {
    fn post(&self, event: PlaybackEvent) {
        if self.sender.send(event).is_ok() {
            if let Some(wake) = &self.waker {
                wake();
            }
        }
    }
}

/// Detection, recognition and recording shared by consecutive workers.
struct Pipeline {
    detector: Arc<dyn PlateDetector>,
    extractor: Arc<dyn TextExtractor>,
    ledger: Arc<Mutex<HistoryLedger>>,
}

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct PlaybackController {
    opener: Arc<dyn SourceOpener>,
    pipeline: Arc<Pipeline>,
    flags: Arc<PlaybackFlags>,
    frames_read: Arc<AtomicU64>,
    sink: EventSink,
    worker: Option<JoinHandle<()>>,
    current_source: Option<VideoSource>,
}

impl PlaybackController {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        detector: Arc<dyn PlateDetector>,
        extractor: Arc<dyn TextExtractor>,
        ledger: HistoryLedger,
    ) -> (Self, mpsc::Receiver<PlaybackEvent>) {
        let (sender, receiver) = mpsc::channel();
        let controller = Self {
            opener,
            pipeline: Arc::new(Pipeline {
                detector,
                extractor,
                ledger: Arc::new(Mutex::new(ledger)),
            }),
            flags: Arc::new(PlaybackFlags::default()),
            frames_read: Arc::new(AtomicU64::new(0)),
            sink: EventSink { sender, waker: None },
            worker: None,
            current_source: None,
        };
        (controller, receiver)
    }

    /// Called after every posted event, e.g. to request a UI repaint.
    /// Applies to workers started afterwards.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.sink.waker = Some(Arc::new(waker));
    }

    /// Stops any running worker, opens `source` and starts processing it.
    /// Open failures are returned and leave the controller stopped.
    pub fn start(&mut self, source: VideoSource) -> PlateResult<()> {
        self.stop();
        self.current_source = None;

        let frame_source = self.opener.open(&source)?;

        self.flags.paused.store(false, Ordering::SeqCst);
        self.flags.stop.store(false, Ordering::SeqCst);
        self.flags.finished.store(false, Ordering::SeqCst);
        self.frames_read.store(0, Ordering::SeqCst);

        let worker = PlaybackWorker {
            source: frame_source,
            pipeline: self.pipeline.clone(),
            flags: self.flags.clone(),
            frames_read: self.frames_read.clone(),
            sink: self.sink.clone(),
        };

        let handle = thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || worker.run())?;

        log::info!("Playback started for {}", source);
        self.worker = Some(handle);
        self.current_source = Some(source);
        Ok(())
    }

    /// Requests the worker to finish and waits for it. The source is released
    /// by the time this returns. Does nothing when already stopped.
    pub fn stop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.flags.stop.store(true, Ordering::SeqCst);
            if handle.join().is_err() {
                log::error!("Playback worker panicked");
            }
            log::info!("Playback stopped");
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
        log::debug!("Playback {}", if paused { "paused" } else { "resumed" });
    }

    /// Flips pause and returns the new value.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.flags.paused.load(Ordering::SeqCst);
        self.set_paused(paused);
        paused
    }

    pub fn state(&self) -> PlaybackState {
        match &self.worker {
            None => PlaybackState::Stopped,
            Some(handle) if handle.is_finished() || self.flags.finished.load(Ordering::SeqCst) => {
                PlaybackState::Stopped
            }
            Some(_) if self.flags.paused.load(Ordering::SeqCst) => PlaybackState::Paused,
            Some(_) => PlaybackState::Running,
        }
    }

    /// Frames pulled from the current source so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::SeqCst)
    }

    pub fn current_source(&self) -> Option<&VideoSource> {
        self.current_source.as_ref()
    }

    /// Plates recorded this session, across every source played.
    pub fn plates_recorded(&self) -> usize {
        match self.pipeline.ledger.lock() {
            Ok(ledger) => ledger.history().len(),
            Err(poisoned) => poisoned.into_inner().history().len(),
        }
    }

    /// Snapshot of the session history in detection order.
    #[cfg(test)]
    pub fn history(&self) -> Vec<PlateRecord> {
        match self.pipeline.ledger.lock() {
            Ok(ledger) => ledger.history().to_vec(),
            Err(poisoned) => poisoned.into_inner().history().to_vec(),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// WORKER
// =============================================================================

struct PlaybackWorker {
    source: Box<dyn FrameSource>,
    pipeline: Arc<Pipeline>,
    flags: Arc<PlaybackFlags>,
    frames_read: Arc<AtomicU64>,
    sink: EventSink,
}

impl PlaybackWorker {
    fn run(mut self) {
        let mut ended = false;

        while !self.flags.stop.load(Ordering::SeqCst) {
            if !self.flags.paused.load(Ordering::SeqCst) {
                match self.source.read() {
                    Ok(Some(frame)) => {
                        self.frames_read.fetch_add(1, Ordering::SeqCst);
                        self.process_frame(frame);
                    }
                    Ok(None) => {
                        log::info!("End of stream after {} frames", self.frames_read.load(Ordering::SeqCst));
                        ended = true;
                        break;
                    }
                    Err(e) => {
                        log::warn!("Frame read failed, ending playback: {}", e);
                        ended = true;
                        break;
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.source.release();
        self.flags.finished.store(true, Ordering::SeqCst);
        if ended {
            self.sink.post(PlaybackEvent::StreamEnded);
        }
    }

    fn process_frame(&self, mut frame: Frame) {
        let regions = match self.pipeline.detector.detect(&frame, &DetectParams::PLATE) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {}", frame.index, e);
                Vec::new()
            }
        };

        let mut current_text: Option<String> = None;
        let mut marked: Vec<PlateRegion> = Vec::new();

        for region in regions {
            let Some(region) = region.clip_to(frame.width(), frame.height()) else {
                continue;
            };

            let crop = frame.crop(&region);
            let text = match self.pipeline.extractor.recognize(&crop) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    log::warn!("Recognition failed on frame {} at {:?}: {}", frame.index, region, e);
                    String::new()
                }
            };
            if text.is_empty() {
                continue;
            }

            log::debug!("Frame {}: recognized '{}'", frame.index, text);
            let record = PlateRecord::now(text.clone());
            self.record(record.clone());
            self.sink.post(PlaybackEvent::PlateRecorded(record));
            marked.push(region);
            if current_text.is_none() {
                current_text = Some(text);
            }
        }

        for region in &marked {
            frame.draw_marker(region);
        }
        if let Some(text) = current_text {
            self.sink.post(PlaybackEvent::TextRecognized(text));
        }
        self.sink.post(PlaybackEvent::FrameReady(frame));
    }

    fn record(&self, record: PlateRecord) {
        let outcome = self
            .pipeline
            .ledger
            .lock()
            .map_err(|_| "ledger lock poisoned".to_string())
            .and_then(|mut ledger| ledger.record(record).map_err(|e| e.to_string()));

        if let Err(reason) = outcome {
            log::error!("{}", reason);
            self.sink.post(PlaybackEvent::PersistenceFailed(reason));
        }
    }
}
