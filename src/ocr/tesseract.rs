use crate::core::{PlateError, PlateResult};
use crate::ocr::TextExtractor;
use image::RgbImage;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Runs the tesseract executable on each crop.
pub struct TesseractExtractor {
    command: PathBuf,
    language: String,
    work_dir: PathBuf,
}

impl TesseractExtractor {
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> PlateResult<Self> {
        let work_dir = std::env::temp_dir().join("plate-watch").join("ocr");
        std::fs::create_dir_all(&work_dir)?;
        Ok(Self {
            command: command.into(),
            language: language.into(),
            work_dir,
        })
    }
}

impl TextExtractor for TesseractExtractor {
    fn recognize(&self, region: &RgbImage) -> PlateResult<String> {
        let crop_path = self.work_dir.join(format!("{}.png", uuid::Uuid::new_v4()));
        region
            .save(&crop_path)
            .map_err(|e| PlateError::Ocr(format!("failed to write crop {}: {}", crop_path.display(), e)))?;

        let output = Command::new(&self.command)
            .arg(&crop_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .stdin(Stdio::null())
            .output();

        if let Err(e) = std::fs::remove_file(&crop_path) {
            log::debug!("Could not remove crop {}: {}", crop_path.display(), e);
        }

        let output = output
            .map_err(|e| PlateError::Ocr(format!("failed to run {}: {}", self.command.display(), e)))?;
        if !output.status.success() {
            return Err(PlateError::Ocr(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(clean_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Strips the whitespace and trailing form feed tesseract prints.
pub fn clean_text(raw: &str) -> String {
    raw.trim().to_string()
}
