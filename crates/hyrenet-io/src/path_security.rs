//! Path checks for everything read below the data root.
//!
//! Source names arriving from configuration are never joined onto the data
//! root blindly. A name must be a single plain file name with an allowed
//! extension, and the resolved (symlink-followed) path must still lie
//! inside the canonical data root.
//!
//! ```no_run
//! use std::path::Path;
//! use hyrenet_io::path_security::PathGuard;
//!
//! let guard = PathGuard::new("data").max_file_size(16 * 1024 * 1024);
//! guard.check_name("buses.csv").unwrap();
//! let secure = guard.resolve(Path::new("components/buses.csv")).unwrap();
//! let text = secure.read_to_string().unwrap();
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Default maximum file size (64 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Extensions a configuration tree may contain
pub const DATA_EXTENSIONS: &[&str] = &["csv", "txt", "md"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathSecurityError {
    /// Not a single plain file name (separators, `..`, NUL, encoded traversal)
    #[error("'{0}' is not a plain file name")]
    InvalidName(String),

    #[error("extension '{extension}' not allowed (permitted: {allowed:?})")]
    DisallowedExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("'{}' resolves outside data root '{}'", .path.display(), .root.display())]
    EscapedDataRoot { path: PathBuf, root: PathBuf },

    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),
}

/// A path that passed every check, together with its root-relative form.
#[derive(Debug, Clone)]
pub struct SecurePath {
    canonical: PathBuf,
    relative: PathBuf,
    size: u64,
}

impl SecurePath {
    pub fn path(&self) -> &Path {
        &self.canonical
    }

    /// The path relative to the data root, as requested
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.canonical)
    }

    pub fn read_to_string(&self) -> std::io::Result<String> {
        fs::read_to_string(&self.canonical)
    }
}

/// Validates names and resolves paths below one data root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    allowed_extensions: BTreeSet<String>,
    max_file_size: Option<u64>,
}

impl PathGuard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            allowed_extensions: DATA_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_file_size: Some(DEFAULT_MAX_FILE_SIZE),
        }
    }

    /// Replace the extension allow-list
    pub fn allow_extensions(mut self, extensions: &[&str]) -> Self {
        self.allowed_extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = Some(max);
        self
    }

    pub fn no_size_limit(mut self) -> Self {
        self.max_file_size = None;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Accept only a single normal path component with an allowed extension.
    pub fn check_name(&self, name: &str) -> Result<(), PathSecurityError> {
        check_plain_name(name)?;
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(PathSecurityError::DisallowedExtension {
                extension,
                allowed: self.allowed_extensions.iter().cloned().collect(),
            });
        }
        Ok(())
    }

    /// Resolve a root-relative file path, following symlinks, and confirm it stays inside the root.
    pub fn resolve(&self, relative: &Path) -> Result<SecurePath, PathSecurityError> {
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(PathSecurityError::InvalidName(
                relative.display().to_string(),
            ));
        }

        let root = canonicalize(&self.root)?;
        let canonical = canonicalize(&self.root.join(relative))?;
        if !canonical.starts_with(&root) {
            return Err(PathSecurityError::EscapedDataRoot {
                path: relative.to_path_buf(),
                root: self.root.clone(),
            });
        }

        let metadata = fs::metadata(&canonical).map_err(|e| {
            PathSecurityError::Io(format!(
                "reading metadata for '{}': {}",
                canonical.display(),
                e
            ))
        })?;
        if !metadata.is_file() {
            return Err(PathSecurityError::NotAFile(relative.to_path_buf()));
        }
        if let Some(max) = self.max_file_size {
            if metadata.len() > max {
                return Err(PathSecurityError::FileTooLarge {
                    size: metadata.len(),
                    max,
                });
            }
        }

        Ok(SecurePath {
            canonical,
            relative: relative.to_path_buf(),
            size: metadata.len(),
        })
    }
}

/// A name is plain when it is exactly one normal path component.
pub fn check_plain_name(name: &str) -> Result<(), PathSecurityError> {
    let invalid = || PathSecurityError::InvalidName(name.to_string());
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("%2e") || lowered.contains("%2f") || lowered.contains("%5c") {
        return Err(invalid());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PathSecurityError::NotFound(path.to_path_buf())
        } else {
            PathSecurityError::Io(format!("resolving '{}': {}", path.display(), e))
        }
    })
}
