use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a proof image reference was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Proof image name cannot be empty")]
    Empty,
    #[error("Invalid proof image name: path separators are not allowed")]
    ContainsPathSeparator,
    #[error("Invalid proof image name: '..' is not allowed")]
    PathTraversal,
    #[error("Invalid proof image name: null bytes are not allowed")]
    NullByte,
    #[error("Invalid proof image name: hidden files (starting with '.') are not allowed")]
    Hidden,
    #[error("Invalid proof image name: control characters are not allowed")]
    ControlCharacter,
    #[error("Proof image '{0}' does not exist")]
    Missing(String),
}

/// Validates a flat filename (no directory components allowed).
pub fn validate_flat_filename(filename: &str) -> Result<&str, MediaError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(MediaError::Empty);
    }

    if trimmed.contains('\0') {
        return Err(MediaError::NullByte);
    }

    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(MediaError::ControlCharacter);
    }

    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(MediaError::ContainsPathSeparator);
    }

    if trimmed == ".." {
        return Err(MediaError::PathTraversal);
    }

    if trimmed.starts_with('.') {
        return Err(MediaError::Hidden);
    }

    Ok(trimmed)
}

/// Resolve a proof image reference to a file under `media_root`.
///
/// Uploads are handled elsewhere; the file must already be there.
pub fn resolve_proof(media_root: &Path, name: &str) -> Result<PathBuf, MediaError> {
    let name = validate_flat_filename(name)?;
    let path = media_root.join(name);
    if !path.is_file() {
        return Err(MediaError::Missing(name.to_string()));
    }
    Ok(path)
}
