//! Folder path validation and sanitization

use crate::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn dangerous_chars() -> &'static Regex {
    static DANGEROUS: OnceLock<Regex> = OnceLock::new();
    DANGEROUS.get_or_init(|| Regex::new(r"[;&|$`<>]").expect("valid pattern"))
}

/// Ensure the path is non-empty, free of shell metacharacters, and exists
pub fn validate_folder_path(folder_path: &str) -> Result<()> {
    if folder_path.is_empty() {
        return Err(Error::InvalidPath("folder path cannot be empty".to_string()));
    }

    if dangerous_chars().is_match(folder_path) {
        return Err(Error::InvalidPath(
            "folder path contains invalid characters".to_string(),
        ));
    }

    let abs = absolutize(Path::new(folder_path));
    if !abs.exists() {
        return Err(Error::InvalidPath(format!(
            "folder does not exist: {}",
            abs.display()
        )));
    }

    Ok(())
}

/// Strip NUL bytes and normalize to an absolute path
pub fn sanitize_path(path: &str) -> PathBuf {
    let cleaned = path.replace('\0', "");
    absolutize(Path::new(&cleaned))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
