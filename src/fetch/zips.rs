// src/fetch/zips.rs
use reqwest::Client;
use std::{
    future::Future,
    io::Cursor,
    path::Path,
    time::{Duration, Instant},
};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

use crate::config::HttpConfig;
use crate::error::AcquisitionError;

/// Source of raw archive bytes. The resolver only talks to the network
/// through this seam.
pub trait ArchiveFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, AcquisitionError>> + Send;
}

/// reqwest-backed fetcher with a request timeout and exponential backoff on
/// transient failures.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &HttpConfig) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|source| AcquisitionError::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
        })
    }

    async fn get_bytes_core(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let net_err = |source| AcquisitionError::Network {
            url: url.to_string(),
            source,
        };
        let resp = self.client.get(url).send().await.map_err(net_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AcquisitionError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(net_err)?;
        Ok(bytes.to_vec())
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let mut attempts = 0;
        loop {
            let start = Instant::now();
            match self.get_bytes_core(url).await {
                Ok(bytes) => {
                    info!(%url, size = bytes.len(), elapsed = ?start.elapsed(), "downloaded");
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempts < self.max_retries => {
                    attempts += 1;
                    let backoff = backoff_delay(self.initial_backoff, attempts);
                    warn!(%url, attempt = attempts, delay_ms = backoff.as_millis() as u64, error = %e, "Retrying");
                    sleep(backoff).await;
                }
                Err(e) => {
                    error!(%url, attempts = attempts + 1, error = %e, "download failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
/// saturating instead of overflowing.
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Extract every member of the zip in `bytes` under `dest`, keeping the
/// archive's own directory nesting.
pub fn extract_archive(bytes: &[u8], origin: &str, dest: &Path) -> Result<usize, AcquisitionError> {
    std::fs::create_dir_all(dest).map_err(|source| AcquisitionError::Io {
        path: dest.to_path_buf(),
        source,
    })?;
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|source| AcquisitionError::Archive {
            origin: origin.to_string(),
            source,
        })?;
    let members = archive.len();
    archive
        .extract(dest)
        .map_err(|source| AcquisitionError::Archive {
            origin: origin.to_string(),
            source,
        })?;
    debug!(origin, members, dest = %dest.display(), "extracted archive");
    Ok(members)
}
