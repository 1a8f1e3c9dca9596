use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ForensicsError, Result};

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tiff", "bmp"];

/// Returns if the given path has a supported image extension (any case)
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// A file path is taken as-is; a directory is walked recursively in file-name
/// order. A missing input is a configuration error for the whole run.
pub fn find_images<P: AsRef<Path>>(input: P) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();

    if !input.exists() {
        return Err(ForensicsError::InputNotFound(input.to_path_buf()));
    }

    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry under {}: {}", input.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && is_image_path(entry.path()) {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}
