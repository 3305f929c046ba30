use std::path::Path;

/// Returns true if `path` exists and is not a directory.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| !meta.is_dir())
}

/// Returns true if `path` exists and is a directory.
pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| meta.is_dir())
}
