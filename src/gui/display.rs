use crate::video::{Frame, PlaybackEvent};

/// What the window shows. Only changed on the UI thread through `apply`.
#[derive(Debug, Default)]
pub struct DisplayModel {
    /// Text of the "Detected Plate" label; kept until a newer plate is read
    pub current_text: Option<String>,
    /// Every recognized plate of the session, oldest first
    pub history: Vec<String>,
    /// Last frame shown on the canvas, also used for snapshots
    pub latest_frame: Option<Frame>,
    pub status: String,
    pub stream_ended: bool,
    frame_dirty: bool,
}

impl DisplayModel {
    pub fn apply(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::FrameReady(frame) => self.show_frame(frame),
            PlaybackEvent::TextRecognized(text) => self.show_text(&text),
            PlaybackEvent::PlateRecorded(record) => self.append_history_entry(&record.text),
            PlaybackEvent::PersistenceFailed(reason) => {
                self.status = format!("Could not save plate to ledger: {}", reason);
            }
            PlaybackEvent::StreamEnded => {
                self.stream_ended = true;
                self.status = "Video ended".to_string();
            }
        }
    }

    pub fn show_frame(&mut self, frame: Frame) {
        self.latest_frame = Some(frame);
        self.frame_dirty = true;
    }

    pub fn show_text(&mut self, text: &str) {
        self.current_text = Some(text.to_string());
    }

    pub fn append_history_entry(&mut self, text: &str) {
        self.history.push(text.to_string());
    }

    /// Clears per-stream state before another source starts. History stays.
    pub fn reset_for_new_source(&mut self) {
        self.stream_ended = false;
        self.status.clear();
    }

    /// True once per new frame, so the texture is uploaded only when needed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.frame_dirty)
    }
}
