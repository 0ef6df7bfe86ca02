use reqwest::blocking::Client;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::warn;

/// HTTP Range reader for remote ZIP files.
///
/// Presents a remote archive as a seekable read-only stream: `Seek` moves a
/// logical position, `Read` fetches the requested window with a Range
/// request. Writing is refused, so a remote archive can only back a
/// read-mode engine.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    pos: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader.
    ///
    /// Sends a HEAD request to verify Range support and learn the file size.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // Probe capabilities before committing to this source
        let resp = client.head(&url).send()?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        Ok(Self {
            client,
            url,
            size,
            pos: 0,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Total size of the remote file.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get total bytes transferred from the network.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    fn read_range(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let expected_size = (end - offset + 1) as usize;

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={current_start}-{end}");

            let result = self.client.get(&self.url).header("Range", &range).send();

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes()?;
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    warn!(
                        retry = retry_count,
                        max = self.max_retry,
                        error = %e,
                        "connection error, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(received)
    }
}

impl Read for HttpRangeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .read_range(self.pos, buf)
            .map_err(io::Error::other)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for HttpRangeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
            SeekFrom::End(d) => self.size.checked_add_signed(d),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of remote file",
            )),
        }
    }
}

impl Write for HttpRangeReader {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "remote archives are read-only",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
