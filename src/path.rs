//! File name validation for the store root and the download directory.
//!
//! Names on the wire are flat: the store only lists regular files directly
//! under its root, so anything with more than one path component is refused.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validate that `name` is a single plain file name.
pub fn validate_file_name(name: &str) -> Result<&Path> {
    let invalid = |reason| Error::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    // Both separators, whatever the host platform uses.
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("path separators not allowed"));
    }
    if name.contains('\0') {
        return Err(invalid("NUL byte not allowed"));
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        (Some(Component::ParentDir), _) => Err(invalid("parent directory not allowed")),
        (Some(Component::CurDir), _) => Err(invalid("current directory not allowed")),
        (Some(Component::RootDir), _) => Err(invalid("absolute paths not allowed")),
        (Some(Component::Prefix(_)), _) => Err(invalid("path prefixes not allowed")),
        _ => Err(invalid("must be a single file name")),
    }
}

/// Join a validated name onto `root`.
pub fn resolve(root: &Path, name: &str) -> Result<PathBuf> {
    Ok(root.join(validate_file_name(name)?))
}

/// Expand tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if path_str == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        }
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_accepted() {
        for name in ["report.txt", "a", ".hidden", "with space.bin", "..dots"] {
            assert!(validate_file_name(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn test_traversal_rejected() {
        for name in [
            "",
            ".",
            "..",
            "../secret",
            "a/../../b",
            "/etc/passwd",
            "sub/file.txt",
            "..\\win.ini",
            "nul\0byte",
        ] {
            assert!(validate_file_name(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let root = Path::new("/srv/files");
        assert_eq!(
            resolve(root, "x.bin").unwrap(),
            PathBuf::from("/srv/files/x.bin")
        );
        assert!(resolve(root, "../x.bin").is_err());
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        assert_eq!(
            expand_tilde(Path::new("server_files")),
            PathBuf::from("server_files")
        );
    }
}
