mod core;
mod detect;
mod gui;
mod ocr;
mod video;

use eframe::egui;
use gui::PlateWatchApp;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 720.0])
            .with_title("Plate Watch - License Plate Recognition"),
        ..Default::default()
    };

    eframe::run_native(
        "Plate Watch",
        options,
        Box::new(|cc| {
            match PlateWatchApp::new(cc) {
                Ok(app) => Ok(Box::new(app)),
                Err(e) => {
                    log::error!("Failed to initialize app: {:#}", e);
                    eprintln!("Failed to initialize app: {:#}", e);
                    std::process::exit(1);
                }
            }
        }),
    ).map_err(|e| anyhow::anyhow!("Failed to run app: {}", e))?;

    Ok(())
}
