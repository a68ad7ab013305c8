//! Output path derivation for generated and edited images.

use crate::validation::OutputFilename;
use chrono::Local;
use std::path::{Path, PathBuf};

/// Filename prefix for text-to-image results.
pub const GENERATED_PREFIX: &str = "generated";

/// Filename prefix for edit results.
pub const EDITED_PREFIX: &str = "edited";

/// Local time with millisecond resolution, e.g. `20250101_120000_123`.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Where a new image should be written.
///
/// A supplied filename is joined onto `output_dir` as-is. Otherwise the name is
/// `{prefix}_{timestamp}.png`. Existing files are overwritten.
pub fn output_path(output_dir: &Path, filename: Option<&OutputFilename>, prefix: &str) -> PathBuf {
    match filename {
        Some(name) => output_dir.join(name.as_str()),
        None => output_dir.join(format!("{prefix}_{}.png", Local::now().format(TIMESTAMP_FORMAT))),
    }
}

/// Create `output_dir` and any missing parents.
pub async fn ensure_output_dir(output_dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(output_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_output_filename;

    #[test]
    fn supplied_filename_is_joined() {
        let name = validate_output_filename("cat").unwrap();
        let path = output_path(Path::new("/srv/images"), Some(&name), GENERATED_PREFIX);
        assert_eq!(path, PathBuf::from("/srv/images/cat.png"));
    }

    #[test]
    fn generated_name_has_prefix_and_timestamp() {
        let path = output_path(Path::new("out"), None, EDITED_PREFIX);
        let file_name = path.file_name().unwrap().to_str().unwrap();

        assert!(path.starts_with("out"));
        assert!(file_name.starts_with("edited_"));
        assert!(file_name.ends_with(".png"));

        // edited_YYYYMMDD_HHMMSS_mmm.png
        let stamp = file_name.trim_start_matches("edited_").trim_end_matches(".png");
        let parts: Vec<&str> = stamp.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 3);
        assert!(parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
    }

    #[tokio::test]
    async fn ensure_output_dir_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");

        ensure_output_dir(&nested).await.unwrap();
        assert!(nested.is_dir());

        // Idempotent.
        ensure_output_dir(&nested).await.unwrap();
    }
}
