//! File helpers for commands that write event logs.

use std::fs::{File, OpenOptions};
use std::path::Path;

/// Ensure parent directory exists for given path, creating if needed.
///
/// ```rust,no_run
/// use std::path::Path;
/// # use cardtable_cli::io_utils::ensure_parent_dir;
///
/// let path = Path::new("output/events/sim.jsonl");
/// ensure_parent_dir(path).unwrap();
/// ```
pub fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory {}: {}", parent.display(), e))?;
        }
    }
    Ok(())
}

/// Opens `path` for appending JSON lines, creating it and its directory.
pub fn open_jsonl(path: &Path) -> Result<File, String> {
    ensure_parent_dir(path)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))
}
