//! HTTP(S) source download.
//!
//! Remote sources are fetched into the user cache directory before the
//! regular file loaders take over. Progress is reported through the load
//! context's callback; the cancellation predicate is checked every
//! `CANCEL_CHECK_CHUNKS` chunks, and a positive check removes the partial
//! artifact before aborting.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config;
use crate::errors::{Error, Result};
use crate::io::loader::LoadContext;

const CHUNK_SIZE: usize = 64 * 1024;
const CANCEL_CHECK_CHUNKS: usize = 16;

fn download_error(url: &str, message: impl Into<String>) -> Error {
    Error::Download {
        url: url.to_string(),
        message: message.into(),
    }
}

/// File name for a URL's cache entry: last path segment, or a fallback.
fn cache_file_name(url: &str) -> String {
    url.split('?')
        .next()
        .and_then(|base| base.rsplit('/').next())
        .filter(|name| !name.is_empty() && name.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| "download.dat".to_string())
}

/// In-progress path for `dest`, with `.part` appended to the full file name
/// so `sales.csv` and `sales.parquet` never share a partial artifact.
fn partial_path(dest: &std::path::Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download `url` into the cache directory, returning the local path.
pub fn fetch_to_cache(url: &str, ctx: &LoadContext) -> Result<PathBuf> {
    ctx.check_cancelled()?;
    ctx.report(0.0, &format!("Connecting to {url}"));

    let cache = config::cache_dir();
    fs::create_dir_all(&cache)?;
    let dest = cache.join(cache_file_name(url));
    let part = partial_path(&dest);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(ctx.settings.download_timeout_secs))
        .build()
        .map_err(|e| download_error(url, e.to_string()))?;
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| download_error(url, e.to_string()))?;
    if !response.status().is_success() {
        return Err(download_error(url, format!("HTTP {}", response.status())));
    }
    let total = response.content_length();

    let mut out = File::create(&part)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let mut chunks: usize = 0;
    loop {
        if chunks % CANCEL_CHECK_CHUNKS == 0
            && ctx.is_cancelled()
        {
            drop(out);
            let _ = fs::remove_file(&part);
            return Err(Error::Cancelled);
        }
        let n = response
            .read(&mut buffer)
            .map_err(|e| download_error(url, e.to_string()))?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        written += n as u64;
        chunks += 1;
        if chunks % CANCEL_CHECK_CHUNKS == 0 {
            let fraction = total
                .map(|t| (written as f64 / t as f64).min(1.0))
                .unwrap_or(0.0);
            ctx.report(fraction, &format!("Downloaded {written} bytes"));
        }
    }
    out.flush()?;
    drop(out);
    fs::rename(&part, &dest)?;

    info!(%url, dest = %dest.display(), written, "download complete");
    ctx.report(1.0, "Download complete");
    Ok(dest)
}
