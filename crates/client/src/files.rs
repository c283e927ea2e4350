// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Moving build inputs and outputs between disk and the wire.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use rmake_core::File;

use crate::ClientError;

fn relative(root: &Path, path: &str) -> Result<PathBuf, ClientError> {
    let rel = Path::new(path);
    let valid = !path.is_empty()
        && rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !valid {
        return Err(ClientError::InvalidPath(path.to_string()));
    }
    Ok(root.join(rel))
}

/// Read source files under `root`, keyed by their relative path, ready to
/// ship in a `ManagerRequest`.
pub async fn load_sources<S: AsRef<str>>(
    root: &Path,
    paths: &[S],
) -> Result<HashMap<String, File>, ClientError> {
    let mut files = HashMap::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let src = relative(root, path)?;
        let contents = tokio::fs::read(&src)
            .await
            .map_err(|source| ClientError::Io { op: "read", path: src.clone(), source })?;
        let file = File::new(path, contents).with_mode(mode_of(&src).await?);
        files.insert(path.to_string(), file);
    }
    Ok(files)
}

/// Write returned artifacts under `dir`, keeping their modes.
pub async fn write_results(dir: &Path, results: &[File]) -> Result<Vec<PathBuf>, ClientError> {
    let mut written = Vec::with_capacity(results.len());
    for file in results {
        let dest = relative(dir, &file.path)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ClientError::Io { op: "create", path: parent.to_path_buf(), source })?;
        }
        tokio::fs::write(&dest, &file.contents)
            .await
            .map_err(|source| ClientError::Io { op: "write", path: dest.clone(), source })?;
        set_mode(&dest, file.mode).await?;
        written.push(dest);
    }
    Ok(written)
}

#[cfg(unix)]
async fn mode_of(path: &Path) -> Result<u32, ClientError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|source| ClientError::Io { op: "stat", path: path.to_path_buf(), source })?;
    Ok(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
async fn mode_of(_path: &Path) -> Result<u32, ClientError> {
    Ok(0o644)
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), ClientError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777))
        .await
        .map_err(|source| ClientError::Io { op: "chmod", path: path.to_path_buf(), source })
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), ClientError> {
    Ok(())
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
