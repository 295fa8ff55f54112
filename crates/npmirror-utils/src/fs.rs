use std::{fs, path::Path};

use crate::error::{FileSystemError, FileSystemResult};

/// Creates `path` and its parents if missing.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| FileSystemError::Directory {
            path: path.to_path_buf(),
            action: "create",
            source: err,
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Removes a file or directory tree. Missing paths are not an error.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "remove",
        source: err,
    })
}

/// Writes `contents` to `path` through a sibling `.part` file and a rename,
/// so readers never observe a partially written file.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = Path::new(&part);

    fs::write(part, contents).map_err(|err| FileSystemError::File {
        path: part.to_path_buf(),
        action: "write",
        source: err,
    })?;
    fs::rename(part, path).map_err(|err| FileSystemError::File {
        path: path.to_path_buf(),
        action: "rename",
        source: err,
    })
}
