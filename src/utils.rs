use crate::errors::{GitumError, Result};
use std::fs;
use std::path::Path;

pub mod spinner;

/// Atomic file operations to prevent corruption during writes
pub mod atomic_file {
    use super::*;
    use serde::Serialize;

    /// Write JSON data to a file atomically using a temporary file + rename strategy
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| GitumError::config(format!("Failed to serialize data: {e}")))?;
        write_string(path, &content)
    }

    /// Write string content to a file atomically using a temporary file + rename strategy
    pub fn write_string(path: &Path, content: &str) -> Result<()> {
        // Create temporary file in the same directory as the target
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, content)
            .map_err(|e| GitumError::config(format!("Failed to write temporary file: {e}")))?;

        atomic_rename(&temp_path, path)
    }

    #[cfg(windows)]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        const MAX_RETRIES: u32 = 3;
        const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

        let mut last_error = None;
        for _ in 0..MAX_RETRIES {
            match fs::rename(temp_path, final_path) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = Some(e);
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }

        let _ = fs::remove_file(temp_path);
        Err(GitumError::config(format!(
            "Failed to finalize file write after {MAX_RETRIES} attempts on Windows: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    #[cfg(not(windows))]
    fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<()> {
        fs::rename(temp_path, final_path)
            .map_err(|e| GitumError::config(format!("Failed to finalize file write: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");

        atomic_file::write_string(&path, "first").unwrap();
        atomic_file::write_json(&path, &vec![1, 2, 3]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Vec<u32> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
        assert!(!path.with_extension("tmp").exists());
    }
}
