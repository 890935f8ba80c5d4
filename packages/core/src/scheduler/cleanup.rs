use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Delete regular files in `dir` last modified more than `max_age` before
/// `now`. Returns how many were removed.
///
/// A missing directory counts as empty. Files that cannot be inspected or
/// removed are logged and left in place.
pub fn cleanup_temp_files(dir: &Path, max_age: Duration, now: SystemTime) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            tracing::warn!("Cannot read temp dir {}: {}", dir.display(), err);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!("Cannot stat {}: {}", path.display(), err);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                tracing::warn!("No modification time for {}: {}", path.display(), err);
                continue;
            }
        };

        // Files stamped in the future are younger than anything.
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed expired report file {}", path.display());
                removed += 1;
            }
            Err(err) => tracing::warn!("Failed to remove {}: {}", path.display(), err),
        }
    }

    removed
}
