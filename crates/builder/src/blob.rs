// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session artifact storage on the local filesystem.

use std::path::{Component, Path, PathBuf};

use rmake_core::{File, SessionToken};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("path '{0}' escapes the session directory")]
    InvalidPath(String),

    #[error("{op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Artifacts live at `<root>/<session>/<path>`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory for a session's jobs.
    pub fn session_dir(&self, session: &SessionToken) -> PathBuf {
        self.root.join(session.as_str())
    }

    /// Create the session directory if needed.
    pub async fn prepare(&self, session: &SessionToken) -> Result<PathBuf, BlobError> {
        let dir = self.session_dir(session);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| BlobError::Io { op: "create", path: dir.clone(), source })?;
        Ok(dir)
    }

    fn resolve(&self, session: &SessionToken, path: &str) -> Result<PathBuf, BlobError> {
        let rel = Path::new(path);
        let valid = !path.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.session_dir(session).join(rel))
    }

    pub async fn save(&self, session: &SessionToken, file: &File) -> Result<PathBuf, BlobError> {
        let dest = self.resolve(session, &file.path)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| BlobError::Io { op: "create", path: parent.to_path_buf(), source })?;
        }
        tokio::fs::write(&dest, &file.contents)
            .await
            .map_err(|source| BlobError::Io { op: "write", path: dest.clone(), source })?;
        set_mode(&dest, file.mode).await?;
        Ok(dest)
    }

    pub async fn load(&self, session: &SessionToken, path: &str) -> Result<File, BlobError> {
        let src = self.resolve(session, path)?;
        let contents = tokio::fs::read(&src)
            .await
            .map_err(|source| BlobError::Io { op: "read", path: src.clone(), source })?;
        let mode = get_mode(&src).await?;
        Ok(File::new(path, contents).with_mode(mode))
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), BlobError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o777))
        .await
        .map_err(|source| BlobError::Io { op: "chmod", path: path.to_path_buf(), source })
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), BlobError> {
    Ok(())
}

#[cfg(unix)]
async fn get_mode(path: &Path) -> Result<u32, BlobError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|source| BlobError::Io { op: "stat", path: path.to_path_buf(), source })?;
    Ok(meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
async fn get_mode(_path: &Path) -> Result<u32, BlobError> {
    Ok(rmake_core::file::DEFAULT_MODE)
}

#[cfg(test)]
#[path = "blob_tests.rs"]
mod tests;
