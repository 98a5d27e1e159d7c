//! Blocking HTTP access with explicit timeouts and bounded retries.
//!
//! Every request carries a deadline so a hung repository cannot hang the
//! whole operation. Transient failures (connect errors, 5xx) are retried a
//! bounded number of times; client errors are surfaced immediately.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use reqwest::blocking::{Client, Response};

/// Per-request deadline.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Maximum attempts for one request.
pub const MAX_RETRIES: usize = 3;
/// Delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

enum RequestError {
    Fatal(anyhow::Error),
    Transient(anyhow::Error),
}

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    /// GET a URL and return the response body as text.
    #[tracing::instrument(skip(self))]
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        self.with_retry(url, |resp| {
            resp.text().context("failed to read response body")
        })
    }

    /// GET a URL and stream the body into a fresh writer, returning the
    /// writer on success. The writer is re-created per attempt so a retried
    /// download never appends to a partial body.
    #[tracing::instrument(skip(self, create_writer))]
    pub fn download<W, F>(&self, url: &str, create_writer: F) -> Result<W>
    where
        W: Write,
        F: Fn() -> Result<W>,
    {
        self.with_retry(url, |mut resp| {
            let mut writer = create_writer()?;
            resp.copy_to(&mut writer)
                .context("failed to download response body")?;
            Ok(writer)
        })
    }

    fn with_retry<T, F>(&self, url: &str, mut body: F) -> Result<T>
    where
        F: FnMut(Response) -> Result<T>,
    {
        let mut last_err = None;
        for attempt in 1..=MAX_RETRIES {
            match self.try_once(url, &mut body) {
                Ok(value) => return Ok(value),
                Err(RequestError::Fatal(err)) => return Err(err),
                Err(RequestError::Transient(err)) => {
                    if attempt < MAX_RETRIES {
                        warn!("request attempt {attempt}/{MAX_RETRIES} failed ({err}), retrying");
                        std::thread::sleep(RETRY_DELAY);
                    }
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("request failed after {MAX_RETRIES} attempts")))
    }

    fn try_once<T, F>(&self, url: &str, body: &mut F) -> Result<T, RequestError>
    where
        F: FnMut(Response) -> Result<T>,
    {
        debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| RequestError::Transient(err.into()))?;
        let resp = resp.error_for_status().map_err(|err| {
            if is_retryable(&err) {
                RequestError::Transient(err.into())
            } else {
                RequestError::Fatal(err.into())
            }
        })?;
        body(resp).map_err(RequestError::Transient)
    }
}

/// Client errors will not succeed on retry; server errors and connection
/// failures may.
fn is_retryable(error: &reqwest::Error) -> bool {
    match error.status() {
        Some(status) => status.is_server_error(),
        None => true,
    }
}
