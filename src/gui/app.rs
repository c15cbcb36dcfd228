use eframe::egui;
use crate::core::{AppConfig, HistoryLedger};
use crate::detect::{CascadeDetector, PlateDetector};
use crate::gui::DisplayModel;
use crate::ocr::{TesseractExtractor, TextExtractor};
use crate::video::{
    save_snapshot, FfmpegOpener, PlaybackController, PlaybackEvent, PlaybackState, SourceOpener, VideoSource,
};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Extensions offered by the Select Video dialog.
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "avi"];

pub struct PlateWatchApp {
    pub config: AppConfig,
    pub controller: PlaybackController,
    pub events: Receiver<PlaybackEvent>,
    pub display: DisplayModel,
    texture: Option<egui::TextureHandle>,
}

impl PlateWatchApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        let mut visuals = egui::Visuals::dark();
        visuals.override_text_color = Some(egui::Color32::WHITE);
        cc.egui_ctx.set_visuals(visuals);

        let config = AppConfig::load()?;

        let detector = CascadeDetector::load(&config.cascade_file)?;
        let extractor = TesseractExtractor::new(&config.tesseract_command, config.ocr_language.clone())?;
        let ledger = HistoryLedger::open(&config.ledger_file)?;
        log::info!("Recording plates to {}", config.ledger_file.display());
        let opener = FfmpegOpener::new(config.ffmpeg_command(), config.ffprobe_command());

        let mut app = Self::from_parts(config, Arc::new(opener), Arc::new(detector), Arc::new(extractor), ledger);

        let ctx = cc.egui_ctx.clone();
        app.controller.set_waker(move || ctx.request_repaint());

        let startup = VideoSource::parse(&app.config.default_video.to_string_lossy());
        app.open_source(startup);

        Ok(app)
    }

    pub fn from_parts(
        config: AppConfig,
        opener: Arc<dyn SourceOpener>,
        detector: Arc<dyn PlateDetector>,
        extractor: Arc<dyn TextExtractor>,
        ledger: HistoryLedger,
    ) -> Self {
        let (controller, events) = PlaybackController::new(opener, detector, extractor, ledger);
        Self {
            config,
            controller,
            events,
            display: DisplayModel::default(),
            texture: None,
        }
    }

    /// Switches playback to `source`. A source that cannot be opened leaves
    /// playback stopped and is reported in the status line.
    pub fn open_source(&mut self, source: VideoSource) -> bool {
        // Whatever the previous stream queued must be applied before the
        // display is reset, or its end would be shown for the new source.
        self.controller.stop();
        self.poll_events();
        self.display.reset_for_new_source();
        let description = source.to_string();
        match self.controller.start(source) {
            Ok(()) => {
                self.display.status = format!("Playing {}", description);
                true
            }
            Err(e) => {
                log::error!("Failed to open {}: {}", description, e);
                self.display.status = e.to_string();
                false
            }
        }
    }

    /// Applies every queued worker event. Returns how many were applied.
    pub fn poll_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.display.apply(event);
            applied += 1;
        }
        applied
    }

    pub fn save_snapshot_to(&mut self, path: &Path) {
        let Some(frame) = self.display.latest_frame.as_ref() else {
            self.display.status = "No frame to save yet".to_string();
            return;
        };

        self.display.status = match save_snapshot(frame, path) {
            Ok(saved) => format!("Saved snapshot to {}", saved.display()),
            Err(e) => {
                log::error!("{}", e);
                e.to_string()
            }
        };
    }

    fn select_video(&mut self) {
        let picked = rfd::FileDialog::new()
            .set_title("Select Video")
            .add_filter("Video", &VIDEO_EXTENSIONS)
            .pick_file();
        if let Some(path) = picked {
            self.open_source(VideoSource::File(path));
        }
    }

    fn snapshot(&mut self) {
        if self.display.latest_frame.is_none() {
            self.display.status = "No frame to save yet".to_string();
            return;
        }
        let target = rfd::FileDialog::new()
            .set_title("Save Snapshot")
            .add_filter("JPEG", &["jpg"])
            .set_file_name("snapshot.jpg")
            .save_file();
        if let Some(path) = target {
            self.save_snapshot_to(&path);
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        if !self.display.take_dirty() {
            return;
        }
        if let Some(frame) = &self.display.latest_frame {
            let color_image = egui::ColorImage::from_rgb(
                [frame.width() as usize, frame.height() as usize],
                frame.image.as_raw(),
            );
            self.texture = Some(ctx.load_texture("video_frame", color_image, egui::TextureOptions::LINEAR));
        }
    }
}

impl eframe::App for PlateWatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();
        self.upload_frame(ctx);

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("📁 Select Video").clicked() {
                    self.select_video();
                }

                let pause_label = match self.controller.state() {
                    PlaybackState::Paused => "▶ Resume",
                    _ => "⏸ Pause",
                };
                let playing = self.controller.state() != PlaybackState::Stopped;
                if ui.add_enabled(playing, egui::Button::new(pause_label)).clicked() {
                    self.controller.toggle_pause();
                }

                if ui.button("📷 Snapshot").clicked() {
                    self.snapshot();
                }

                if ui.button("Exit").clicked() {
                    self.controller.stop();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Status:");
                if self.display.status.is_empty() {
                    ui.label("Ready");
                } else {
                    ui.label(&self.display.status);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(format!(
                        "Plates: {} | Frames: {}",
                        self.controller.plates_recorded(),
                        self.controller.frames_read()
                    ));
                    if let Some(source) = self.controller.current_source() {
                        ui.label(format!("📹 {}", source));
                    }
                });
            });
        });

        egui::SidePanel::right("plate_history")
            .default_width(220.0)
            .min_width(160.0)
            .show(ctx, |ui| {
                ui.heading("Plate History");
                ui.separator();
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for plate in &self.display.history {
                            ui.label(plate);
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Detected Plate:");
                ui.strong(self.display.current_text.as_deref().unwrap_or("-"));
            });
            ui.separator();

            match &self.texture {
                Some(texture) => {
                    let size = ui.available_size();
                    ui.centered_and_justified(|ui| {
                        ui.add(egui::Image::new(texture).max_size(size));
                    });
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label("No video loaded");
                    });
                }
            }
        });
    }
}
