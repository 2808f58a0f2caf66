//! Exact-match file editing with pre-write backup and atomic replace.

use std::path::{Path, PathBuf};

use crate::error::ExecError;

/// Apply an exact-match replacement to the file at `path` (already resolved
/// and guard-approved).
///
/// The old text must occur exactly once; zero or multiple occurrences fail
/// without touching the file. Before writing, the pre-edit content is copied
/// to a timestamped backup, then the new content replaces the original
/// atomically (temp file + rename) so a crash never leaves a half-written
/// target.
pub fn apply_edit(path: &Path, old_text: &str, new_text: &str) -> Result<String, ExecError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path)?;

    let occurrences = content.matches(old_text).count();
    match occurrences {
        0 => {
            return Err(ExecError::OldTextMissing {
                path: display,
            });
        }
        1 => {}
        count => {
            return Err(ExecError::OldTextAmbiguous {
                path: display,
                count,
            });
        }
    }

    let backup = backup_path(path);
    std::fs::write(&backup, &content)?;

    let updated = content.replacen(old_text, new_text, 1);
    write_atomic(path, &updated)?;

    tracing::info!(path = %path.display(), backup = %backup.display(), "applied file edit");
    Ok(format!(
        "Updated {display} (backup: {})",
        backup.display()
    ))
}

/// Timestamped sibling of `path`; falls back to microsecond precision when
/// two edits land within the same second.
fn backup_path(path: &Path) -> PathBuf {
    let now = chrono::Local::now();
    let candidate = sibling(path, &now.format("%Y%m%d_%H%M%S").to_string());
    if candidate.exists() {
        sibling(path, &now.format("%Y%m%d_%H%M%S%.6f").to_string())
    } else {
        candidate
    }
}

fn sibling(path: &Path, timestamp: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".backup_{timestamp}"));
    PathBuf::from(name)
}

/// Write via a temporary file in the same directory, then rename over the
/// target. Rename within one filesystem is atomic.
fn write_atomic(path: &Path, content: &str) -> Result<(), ExecError> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp{}", std::process::id()));
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, content)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(ExecError::Io(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn setup(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().contains(".backup_"))
            .collect()
    }

    #[test]
    fn unique_match_is_replaced_and_backed_up() {
        let original = "replicas: 1\nenable_task_role: false\n";
        let (dir, path) = setup(original);

        let message =
            apply_edit(&path, "enable_task_role: false", "enable_task_role: true").unwrap();
        assert!(message.contains("Updated"));

        let updated = std::fs::read_to_string(&path).unwrap();
        assert_eq!(updated, "replicas: 1\nenable_task_role: true\n");

        // Backup holds the pre-edit content.
        let backups = backups_in(dir.path());
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(&backups[0]).unwrap(), original);
    }

    #[test]
    fn absent_old_text_fails_without_modifying() {
        let original = "replicas: 1\n";
        let (dir, path) = setup(original);

        let err = apply_edit(&path, "replicas: 2", "replicas: 3").unwrap_err();
        assert!(matches!(err, ExecError::OldTextMissing { .. }), "{err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(backups_in(dir.path()).is_empty());
    }

    #[test]
    fn ambiguous_old_text_fails_without_modifying() {
        let original = "port: 80\nport: 80\n";
        let (dir, path) = setup(original);

        let err = apply_edit(&path, "port: 80", "port: 8080").unwrap_err();
        match err {
            ExecError::OldTextAmbiguous { count, .. } => assert_eq!(count, 2),
            other => panic!("expected ambiguity error, got {other}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
        assert!(backups_in(dir.path()).is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = apply_edit(&dir.path().join("nope.yaml"), "a", "b").unwrap_err();
        assert!(matches!(err, ExecError::Io(_)));
    }

    #[test]
    fn no_leftover_temp_file_after_edit() {
        let (dir, path) = setup("key: old\n");
        apply_edit(&path, "old", "new").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().contains(".tmp"))
                    .unwrap_or(false)
            })
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }
}
