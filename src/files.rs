use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{PictError, Result};

const TEMP_PREFIX: &str = "line";
const TEMP_SUFFIX: &str = ".bin";

fn unix_now() -> std::time::Duration {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
}

/// `line-<unix seconds>.bin`, used as the default OBS object name.
///
/// Not unique; files on disk come from [`create_temp_file`].
pub fn temp_file_name() -> String {
    format!("{TEMP_PREFIX}-{}{TEMP_SUFFIX}", unix_now().as_secs())
}

/// Reserves a fresh file in the system temp dir and returns its path.
///
/// The file outlives this call; whoever consumes it is responsible for
/// calling [`delete_file`].
pub fn create_temp_file() -> Result<PathBuf> {
    let prefix = format!("{TEMP_PREFIX}-{}-", unix_now().as_secs());
    let path = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(TEMP_SUFFIX)
        .rand_bytes(4)
        .tempfile()?
        .into_temp_path()
        .keep()
        .map_err(|e| e.error)?;
    Ok(path)
}

/// Writes every chunk of `stream` to `path`, truncating whatever was there.
///
/// If the stream or the write fails, the partial file is removed before the
/// error is returned.
pub async fn save_stream<S, E>(path: &Path, stream: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    PictError: From<E>,
{
    let written = write_stream(path, stream).await;
    if written.is_err() {
        if let Err(e) = delete_file(path) {
            warn!("Failed to remove partial download {}: {}", path.display(), e);
        }
    }
    written
}

async fn write_stream<S, E>(path: &Path, stream: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    PictError: From<E>,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    futures::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}

/// Removes `path` and reports whether anything was deleted.
///
/// A missing file is not an error.
pub fn delete_file(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
