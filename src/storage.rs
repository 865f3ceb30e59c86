//! Flat upload directory: name sanitizing, streamed writes, listing and removal.

use axum::body::Bytes;
use chrono::{DateTime, Local, Months};
use futures_util::stream::{Stream, StreamExt};
use std::fmt::Display;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::atomic::AtomicFile;

/// Failures of the file store, mapped to HTTP statuses by `ApiError`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no filename")]
    EmptyName,
    #[error("invalid filename `{0}`")]
    InvalidName(String),
    #[error("file `{0}` not found")]
    NotFound(String),
    #[error("failed to read upload body: {0}")]
    Body(String),
    #[error("failed to remove `{name}`: {source}")]
    Remove { name: String, source: io::Error },
    #[error("failed to list directory: {source}")]
    Listing { partial: String, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A file written by [`Storage::store`].
#[derive(Debug)]
pub struct StoredFile {
    pub name: String,
    pub bytes: u64,
}

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Store rooted at `root`; nothing is touched on disk until
    /// [`Storage::ensure_root`] or the first write.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Creates the root and any missing parents (`0750` on unix).
    pub async fn ensure_root(&self) -> io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o750);
        builder.create(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// Maps a client-supplied name onto a path directly under the root.
    fn resolve(&self, client_name: &str) -> Result<(String, PathBuf), StoreError> {
        let name = base_name(client_name)
            .ok_or_else(|| StoreError::InvalidName(client_name.to_string()))?;
        let path = self.root.join(name);
        Ok((name.to_string(), path))
    }

    /// Streams `body` into a file named after the base of `client_name`,
    /// replacing any existing file only once the whole body was written.
    pub async fn store<S, E>(&self, client_name: &str, body: S) -> Result<StoredFile, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let (name, target) = self.resolve(client_name)?;
        let mut atomic = AtomicFile::new(&target).await?;
        let mut body = std::pin::pin!(body);

        let write_result: Result<u64, StoreError> = async {
            let mut written: u64 = 0;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(|err| StoreError::Body(err.to_string()))?;
                if chunk.is_empty() {
                    continue;
                }
                atomic.file_mut().write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            Ok(written)
        }
        .await;

        let bytes = match write_result {
            Ok(bytes) => bytes,
            Err(err) => {
                atomic.cleanup().await;
                return Err(err);
            }
        };
        atomic.finalize().await?;
        Ok(StoredFile { name, bytes })
    }

    /// Long-format listing reduced to size, modification time and name,
    /// headed by a `total` line so an empty directory still has output.
    pub async fn listing(&self) -> Result<String, StoreError> {
        let now = Local::now();
        let mut total: u64 = 0;
        let mut rows: Vec<(String, String)> = Vec::new();
        let result: io::Result<()> = async {
            let mut dir = fs::read_dir(&self.root).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let metadata = entry.metadata().await?;
                let modified = metadata.modified().map(DateTime::<Local>::from)?;
                total += metadata.len();
                let line = format!(
                    "{} {} {}",
                    human_size(metadata.len()),
                    format_modified(modified, now),
                    name
                );
                rows.push((name, line));
            }
            Ok(())
        }
        .await;

        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let mut output = String::new();
        for (_, line) in rows {
            output.push_str(&line);
            output.push('\n');
        }
        match result {
            Ok(()) => Ok(format!("total {}\n{output}", human_size(total))),
            Err(source) => Err(StoreError::Listing {
                partial: output,
                source,
            }),
        }
    }

    /// Removes one stored file, returning its resolved base name.
    pub async fn delete(&self, client_name: &str) -> Result<String, StoreError> {
        if client_name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let (name, target) = self
            .resolve(client_name)
            .map_err(|_| StoreError::NotFound(client_name.to_string()))?;
        match fs::symlink_metadata(&target).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(name)),
            Err(err) => return Err(StoreError::Io(err)),
        }
        fs::remove_file(&target)
            .await
            .map_err(|source| StoreError::Remove {
                name: name.clone(),
                source,
            })?;
        Ok(name)
    }
}

/// Final path component of a client-supplied name, with both `/` and `\`
/// treated as separators. Returns `None` for empty, `.` and `..`.
pub fn base_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return None;
    }
    Some(name)
}

/// Size column in the style of `ls -h`.
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["K", "M", "G", "T", "P", "E"];
    if bytes < 1024 {
        return bytes.to_string();
    }
    // Values are rounded up, so 1023.1K already prints as the next unit.
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value.ceil() >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    let tenths = (value * 10.0).ceil() / 10.0;
    if tenths < 10.0 {
        format!("{tenths:.1}{}", UNITS[unit])
    } else {
        format!("{}{}", value.ceil() as u64, UNITS[unit])
    }
}

/// Month, day and either time of day (recent files) or year.
fn format_modified(modified: DateTime<Local>, now: DateTime<Local>) -> String {
    let recent_cutoff = now.checked_sub_months(Months::new(6)).unwrap_or(now);
    if modified > recent_cutoff && modified <= now {
        modified.format("%b %-d %H:%M").to_string()
    } else {
        modified.format("%b %-d %Y").to_string()
    }
}
