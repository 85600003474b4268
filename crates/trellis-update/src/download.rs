use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use crate::error::{Result, UpdateError};
use crate::service::UpdateService;

const CHUNK_SIZE: usize = 64 * 1024;

/// A fully downloaded update archive.
#[derive(Debug)]
pub struct Download {
    /// Removed when dropped.
    pub file: NamedTempFile,
    pub bytes: u64,
    /// Hex-encoded SHA-256 of the archive.
    pub sha256: String,
}

/// Stream `url` into a temporary file.
///
/// Fails unless the byte count matches the length the server declared.
pub async fn download(service: &dyn UpdateService, url: &str) -> Result<Download> {
    let mut payload = service.fetch(url).await?;
    let expected = payload
        .declared_len
        .ok_or_else(|| UpdateError::MissingLength(url.to_string()))?;

    let file = tempfile::Builder::new()
        .prefix("update-")
        .suffix(".zip")
        .tempfile()?;
    let mut out = tokio::fs::File::from_std(file.as_file().try_clone()?);

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = payload.body.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
        written += n as u64;
    }
    out.flush().await?;

    if written != expected {
        return Err(UpdateError::IntegrityMismatch {
            expected,
            actual: written,
        });
    }

    let sha256 = format!("{:x}", hasher.finalize());
    info!(url, bytes = written, %sha256, "Update downloaded");
    Ok(Download {
        file,
        bytes: written,
        sha256,
    })
}
