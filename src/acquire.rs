use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::AcquireError;
use crate::settings::Settings;
use crate::utils::temp_file_beside;

/// Source of image bytes. The HTTP client in production, fakes in tests.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquireError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpFetcher { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquireError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AcquireError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    AlreadyPresent,
    Downloaded,
    Unavailable,
}

pub struct Acquirer {
    fetcher: Box<dyn ImageFetcher>,
    max_retries: u32,
    backoff: Duration,
}

impl Acquirer {
    pub fn new(fetcher: Box<dyn ImageFetcher>, max_retries: u32, backoff: Duration) -> Self {
        Acquirer {
            fetcher,
            max_retries,
            backoff,
        }
    }

    pub fn from_settings(fetcher: Box<dyn ImageFetcher>, settings: &Settings) -> Self {
        Self::new(fetcher, settings.max_retries, settings.retry_backoff())
    }

    /// Download only when `dest` is missing. Failures are logged, never returned.
    pub fn ensure(&self, url: &str, dest: &Path) -> AcquireOutcome {
        if dest.exists() {
            debug!(image = ?dest, "Image already exists, skip downloading");
            return AcquireOutcome::AlreadyPresent;
        }
        match self.acquire(url, dest) {
            Ok(()) => {
                info!(image = ?dest, "Downloaded");
                AcquireOutcome::Downloaded
            }
            Err(e) => {
                warn!(image = ?dest, url, error = %e, "Failed to download");
                AcquireOutcome::Unavailable
            }
        }
    }

    /// Fetch `url` and write the body to `dest` through a temp file in the same directory.
    pub fn acquire(&self, url: &str, dest: &Path) -> Result<(), AcquireError> {
        if url.trim().is_empty() {
            return Err(AcquireError::EmptyUrl);
        }
        let bytes = self.fetch_with_retry(url)?;
        write_atomic(dest, &bytes)
    }

    fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, AcquireError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(url) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        url,
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "Transient fetch failure, backing off {:.1}s",
                        backoff.as_secs_f64()
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), AcquireError> {
    let io_err = |source| AcquireError::Io {
        path: dest.to_path_buf(),
        source,
    };
    let mut tmp = temp_file_beside(dest).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(dest).map_err(|e| io_err(e.error))?;
    Ok(())
}
