use crate::core::{PlateError, PlateResult};
use crate::video::Frame;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_EXTENSION: &str = "jpg";

/// Writes the frame as an image. A path without extension gets `.jpg`; the
/// format follows the extension otherwise.
pub fn save_snapshot(frame: &Frame, path: &Path) -> PlateResult<PathBuf> {
    let mut target = path.to_path_buf();
    if target.extension().is_none() {
        target.set_extension(SNAPSHOT_EXTENSION);
    }

    frame.image.save(&target).map_err(|e| PlateError::Snapshot {
        path: target.clone(),
        reason: e.to_string(),
    })?;

    log::info!("Saved snapshot of frame {} to {}", frame.index, target.display());
    Ok(target)
}
