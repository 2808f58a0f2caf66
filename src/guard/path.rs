//! Path confinement and size validation for file edits.
//!
//! Resolution works on the canonicalized absolute path, not the literal
//! string, so `..` chains, redundant separators, and symlinks cannot smuggle
//! a target outside the working root.

use std::path::{Component, Path, PathBuf};

use crate::guard::{DenyReason, Verdict};

/// Files larger than this are never read or overwritten (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Locations that are off limits even when the working root contains them,
/// e.g. a run confined to a home directory must still not touch key material.
const SENSITIVE_SYSTEM_PREFIXES: &[&str] = &[
    "/etc",
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/var",
    "/sys",
    "/proc",
];

const SENSITIVE_HOME_SUBDIRS: &[&str] = &[".ssh", ".aws", ".gnupg"];

/// Resolve `candidate` against `root` and confirm the result stays inside.
///
/// Returns the canonicalized absolute path on success. Any escape, whether
/// through `..` segments, an absolute path, or a symlink, yields
/// [`DenyReason::PathEscape`] carrying the original candidate string.
pub fn resolve_within(root: &Path, candidate: &str) -> Result<PathBuf, DenyReason> {
    let escape = || DenyReason::PathEscape {
        path: candidate.to_string(),
    };

    let canonical_root = canonicalize_partial(root).map_err(|_| escape())?;

    let joined = {
        let candidate_path = Path::new(candidate);
        if candidate_path.is_absolute() {
            candidate_path.to_path_buf()
        } else {
            canonical_root.join(candidate_path)
        }
    };

    let cleaned = lexical_clean(&joined).ok_or_else(escape)?;
    let resolved = canonicalize_partial(&cleaned).map_err(|_| escape())?;

    if !resolved.starts_with(&canonical_root) {
        return Err(escape());
    }
    if is_sensitive(&resolved) {
        return Err(escape());
    }

    Ok(resolved)
}

/// Size ceiling check. Non-existent targets (new file creation) pass.
pub fn check_size(path: &Path) -> Verdict {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_FILE_SIZE => Verdict::Denied(DenyReason::SizeExceeded {
            size: meta.len(),
            limit: MAX_FILE_SIZE,
        }),
        Ok(_) => Verdict::Allowed,
        // Missing file is fine; other stat errors surface at execution time.
        Err(_) => Verdict::Allowed,
    }
}

/// Remove `.` and resolve `..` lexically. Returns `None` when `..` would
/// climb past the filesystem root.
fn lexical_clean(path: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => cleaned.push(p.as_os_str()),
            Component::RootDir => cleaned.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    return None;
                }
            }
            Component::Normal(part) => cleaned.push(part),
        }
    }
    Some(cleaned)
}

/// Canonicalize the deepest existing ancestor and re-attach the remainder,
/// so targets that do not exist yet still resolve through real directories.
fn canonicalize_partial(path: &Path) -> std::io::Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }

    let mut missing = Vec::new();
    let mut current = path.to_path_buf();
    loop {
        match current.parent() {
            Some(parent) => {
                if let Some(name) = current.file_name() {
                    missing.push(name.to_os_string());
                }
                if let Ok(canonical) = parent.canonicalize() {
                    let mut resolved = canonical;
                    for part in missing.iter().rev() {
                        resolved.push(part);
                    }
                    return Ok(resolved);
                }
                current = parent.to_path_buf();
            }
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no existing ancestor to canonicalize",
                ));
            }
        }
    }
}

fn is_sensitive(path: &Path) -> bool {
    for prefix in SENSITIVE_SYSTEM_PREFIXES {
        if path.starts_with(prefix) {
            return true;
        }
    }
    if let Some(home) = dirs::home_dir() {
        for subdir in SENSITIVE_HOME_SUBDIRS {
            if path.starts_with(home.join(subdir)) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> tempfile::TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    #[test]
    fn relative_path_inside_root_is_allowed() {
        let root = temp_root();
        std::fs::write(root.path().join("dev.yaml"), "a: 1\n").unwrap();

        let resolved = resolve_within(root.path(), "dev.yaml").unwrap();
        assert!(resolved.ends_with("dev.yaml"));
        assert!(resolved.starts_with(root.path().canonicalize().unwrap()));
    }

    #[test]
    fn new_file_in_existing_subdir_is_allowed() {
        let root = temp_root();
        std::fs::create_dir_all(root.path().join("env/dev")).unwrap();

        let resolved = resolve_within(root.path(), "env/dev/override.tf").unwrap();
        assert!(resolved.ends_with("env/dev/override.tf"));
    }

    #[test]
    fn parent_traversal_escapes_are_denied() {
        let root = temp_root();
        for candidate in [
            "../outside.txt",
            "env/../../outside.txt",
            "env/dev/../../../etc/passwd",
        ] {
            let err = resolve_within(root.path(), candidate).unwrap_err();
            assert!(
                matches!(err, DenyReason::PathEscape { .. }),
                "{candidate}: {err:?}"
            );
        }
    }

    #[test]
    fn absolute_paths_outside_root_are_denied() {
        let root = temp_root();
        for candidate in ["/etc/passwd", "/etc/shadow", "/usr/bin/sudo", "/proc/self/environ"] {
            let err = resolve_within(root.path(), candidate).unwrap_err();
            assert!(matches!(err, DenyReason::PathEscape { .. }), "{candidate}");
        }
    }

    #[test]
    fn absolute_path_inside_root_is_allowed() {
        let root = temp_root();
        std::fs::write(root.path().join("main.tf"), "x").unwrap();
        let inside = root.path().join("main.tf");

        let resolved = resolve_within(root.path(), inside.to_str().unwrap()).unwrap();
        assert!(resolved.ends_with("main.tf"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_denied() {
        let root = temp_root();
        let link = root.path().join("sneaky");
        std::os::unix::fs::symlink("/etc", &link).unwrap();

        let err = resolve_within(root.path(), "sneaky/passwd").unwrap_err();
        assert!(matches!(err, DenyReason::PathEscape { .. }));
    }

    #[test]
    fn size_ceiling_allows_small_and_missing_files() {
        let root = temp_root();
        let small = root.path().join("small.yaml");
        std::fs::write(&small, "key: value\n").unwrap();

        assert!(check_size(&small).is_allowed());
        assert!(check_size(&root.path().join("does-not-exist.yaml")).is_allowed());
    }

    #[test]
    fn size_ceiling_denies_oversized_files() {
        let root = temp_root();
        let big = root.path().join("big.bin");
        let file = std::fs::File::create(&big).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();

        match check_size(&big) {
            Verdict::Denied(DenyReason::SizeExceeded { size, limit }) => {
                assert_eq!(size, MAX_FILE_SIZE + 1);
                assert_eq!(limit, MAX_FILE_SIZE);
            }
            other => panic!("expected size denial, got {other:?}"),
        }
    }

    #[test]
    fn file_at_the_ceiling_is_allowed() {
        let root = temp_root();
        let exact = root.path().join("exact.bin");
        let file = std::fs::File::create(&exact).unwrap();
        file.set_len(MAX_FILE_SIZE).unwrap();

        assert!(check_size(&exact).is_allowed());
    }
}
