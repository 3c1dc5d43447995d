// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket files shared by every process of one user

use std::io;
use std::path::{Path, PathBuf};

/// Extension of API server sockets
pub const API_SOCKET_EXT: &str = "api";

/// Extension of event listener sockets
pub const LISTENER_SOCKET_EXT: &str = "listener";

/// Fresh socket path in `dir`, creating the directory if needed
pub fn unique_socket_path(dir: &Path, extension: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name = uuid::Uuid::new_v4().simple().to_string();
    Ok(dir.join(name).with_extension(extension))
}

/// Socket files with the given extension, sorted. A missing directory has none.
pub fn socket_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Remove a socket file, ignoring one that is already gone
pub(crate) fn remove_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(socket = %path.display(), error = %e, "failed to remove socket"),
    }
}
