//! Small capability-scoped file helpers built on `cap-std`.
//!
//! Each helper opens the parent directory with ambient authority and then
//! works relative to it, so callers only ever deal in UTF-8 paths.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while touching local files.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FileError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a path has no final component.
    #[error("path {path} is missing a filename")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

fn parent_of(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

fn file_name_of(path: &Utf8Path) -> Result<&str, FileError> {
    path.file_name().ok_or_else(|| FileError::MissingFileName {
        path: path.to_path_buf(),
    })
}

fn io_error(path: &Utf8Path, err: &io::Error) -> FileError {
    FileError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn open_parent(path: &Utf8Path) -> Result<Dir, FileError> {
    let parent = parent_of(path);
    Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| io_error(parent, &err))
}

/// Returns `true` when `path` exists. A missing parent directory counts as
/// "does not exist".
///
/// # Errors
///
/// Returns [`FileError`] when the parent directory cannot be inspected.
pub fn path_exists(path: &Utf8Path) -> Result<bool, FileError> {
    let parent = parent_of(path);
    let file_name = file_name_of(path)?;

    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir
            .try_exists(file_name)
            .map_err(|err| io_error(path, &err)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error(parent, &err)),
    }
}

/// Reads a UTF-8 file to a string.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be opened or read.
pub fn read_to_string(path: &Utf8Path) -> Result<String, FileError> {
    let file_name = file_name_of(path)?;
    open_parent(path)?
        .read_to_string(file_name)
        .map_err(|err| io_error(path, &err))
}

/// Writes `contents` to `path`, creating parent directories first.
///
/// # Errors
///
/// Returns [`FileError`] when a directory or the file cannot be written.
pub fn write(path: &Utf8Path, contents: &str) -> Result<(), FileError> {
    let file_name = file_name_of(path)?;
    create_dir_all(parent_of(path))?;
    open_parent(path)?
        .write(file_name, contents)
        .map_err(|err| io_error(path, &err))
}

/// Removes the file at `path`.
///
/// # Errors
///
/// Returns [`FileError`] when the file cannot be removed.
pub fn remove(path: &Utf8Path) -> Result<(), FileError> {
    let file_name = file_name_of(path)?;
    open_parent(path)?
        .remove_file(file_name)
        .map_err(|err| io_error(path, &err))
}

/// Creates `dir` and all missing ancestors.
///
/// # Errors
///
/// Returns [`FileError`] when the directories cannot be created.
pub fn create_dir_all(dir: &Utf8Path) -> Result<(), FileError> {
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| io_error(dir, &err))
}
