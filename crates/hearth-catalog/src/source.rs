//! Where catalog documents come from.
//!
//! A [`CatalogSource`] performs one uncached round-trip. Caching and
//! resolution live in [`crate::CatalogClient`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::{CatalogEntry, HearthError, HearthResult};
use tracing::debug;

use crate::parse::parse_catalog;

/// Largest catalog document accepted (8 MiB).
pub const MAX_CATALOG_SIZE: u64 = 8 * 1024 * 1024;

/// Default request timeout for remote catalogs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every catalog request.
const USER_AGENT: &str = concat!("hearth-catalog/", env!("CARGO_PKG_VERSION"));

/// One uncached fetch of the full catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync + fmt::Debug {
    /// Human-readable location for logs and errors.
    fn location(&self) -> &str;

    /// Fetch every entry, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::CatalogUnavailable`] on transport failure or
    /// an invalid document.
    async fn fetch(&self) -> HearthResult<Vec<CatalogEntry>>;
}

/// Catalog served over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    url: url::Url,
    location: String,
    client: reqwest::Client,
}

impl HttpCatalogSource {
    /// Create a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Config`] if the URL is malformed or not
    /// `http`/`https`, or the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> HearthResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| HearthError::Config(format!("invalid catalog URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HearthError::Config(format!(
                "catalog URL '{url}' must use http or https"
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .build()
            .map_err(|e| HearthError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            location: parsed.to_string(),
            url: parsed,
            client,
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self) -> HearthResult<Vec<CatalogEntry>> {
        debug!(url = %self.url, "Fetching catalog");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| HearthError::CatalogUnavailable(format!("{}: {e}", self.location)))?;

        if !response.status().is_success() {
            return Err(HearthError::CatalogUnavailable(format!(
                "{} returned {}",
                self.location,
                response.status()
            )));
        }

        if let Some(len) = response.content_length()
            && len > MAX_CATALOG_SIZE
        {
            return Err(too_large(&self.location, len));
        }

        let body = download_with_limit(response, &self.location).await?;
        parse_catalog(&body, &self.location)
    }
}

/// Read a response body, failing once it exceeds [`MAX_CATALOG_SIZE`].
async fn download_with_limit(response: reqwest::Response, location: &str) -> HearthResult<Vec<u8>> {
    let capacity =
        usize::try_from(response.content_length().unwrap_or(0).min(MAX_CATALOG_SIZE)).unwrap_or(0);
    let mut bytes = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| HearthError::CatalogUnavailable(format!("{location}: {e}")))?;
        bytes.extend_from_slice(&chunk);
        let current = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if current > MAX_CATALOG_SIZE {
            return Err(too_large(location, current));
        }
    }

    Ok(bytes)
}

fn too_large(location: &str, size: u64) -> HearthError {
    HearthError::CatalogUnavailable(format!(
        "{location}: catalog is {size} bytes, exceeding the {MAX_CATALOG_SIZE} byte limit"
    ))
}

/// Catalog read from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
    location: String,
}

impl FileCatalogSource {
    /// Create a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            location: path.display().to_string(),
            path,
        }
    }

    /// The file being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self) -> HearthResult<Vec<CatalogEntry>> {
        debug!(path = %self.path.display(), "Reading local catalog");

        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| HearthError::CatalogUnavailable(format!("{}: {e}", self.location)))?;
        let len = u64::try_from(body.len()).unwrap_or(u64::MAX);
        if len > MAX_CATALOG_SIZE {
            return Err(too_large(&self.location, len));
        }
        parse_catalog(&body, &self.location)
    }
}

/// Pick a source for a configured catalog location.
///
/// `http://` and `https://` URLs are fetched remotely; `file://` URLs and
/// absolute paths are read from disk.
///
/// # Errors
///
/// Returns [`HearthError::Config`] for any other location.
pub fn source_for_location(location: &str, timeout: Duration) -> HearthResult<Arc<dyn CatalogSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(Arc::new(HttpCatalogSource::new(location, timeout)?));
    }

    if location.starts_with("file://") {
        let path = url::Url::parse(location)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| HearthError::Config(format!("invalid file URL '{location}'")))?;
        return Ok(Arc::new(FileCatalogSource::new(path)));
    }

    let path = Path::new(location);
    if path.is_absolute() {
        return Ok(Arc::new(FileCatalogSource::new(path)));
    }

    Err(HearthError::Config(format!(
        "unsupported catalog location '{location}'"
    )))
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve exactly one canned HTTP response on a loopback port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}/catalog.json")
    }

    #[tokio::test]
    async fn http_source_parses_array() {
        let url = serve_once(
            "200 OK",
            r#"[{"name":"french-skill","version":"1.2.0","kind":"ability","sourceRef":"git://x/french"}]"#,
        )
        .await;
        let source = HttpCatalogSource::new(&url, DEFAULT_TIMEOUT).unwrap();
        let entries = source.fetch().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, "1.2.0");
    }

    #[tokio::test]
    async fn http_error_status_is_unavailable() {
        let url = serve_once("503 Service Unavailable", "[]").await;
        let source = HttpCatalogSource::new(&url, DEFAULT_TIMEOUT).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, HearthError::CatalogUnavailable(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn http_non_array_is_unavailable() {
        let url = serve_once("200 OK", r#"{"error":"nope"}"#).await;
        let source = HttpCatalogSource::new(&url, DEFAULT_TIMEOUT).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(HearthError::CatalogUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let source =
            HttpCatalogSource::new(&format!("http://{addr}/c.json"), DEFAULT_TIMEOUT).unwrap();
        assert!(matches!(
            source.fetch().await,
            Err(HearthError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn http_source_rejects_bad_urls() {
        assert!(matches!(
            HttpCatalogSource::new("not a url", DEFAULT_TIMEOUT),
            Err(HearthError::Config(_))
        ));
        assert!(matches!(
            HttpCatalogSource::new("ftp://host/c.json", DEFAULT_TIMEOUT),
            Err(HearthError::Config(_))
        ));
    }

    #[tokio::test]
    async fn file_source_reads_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"name":"clock","version":"0.1.0","kind":"app","sourceRef":"/srv/clock"}]"#,
        )
        .unwrap();

        let source = FileCatalogSource::new(&path);
        let entries = source.fetch().await.unwrap();
        assert_eq!(entries[0].name.as_str(), "clock");
    }

    #[tokio::test]
    async fn missing_file_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let source = FileCatalogSource::new(tmp.path().join("absent.json"));
        assert!(matches!(
            source.fetch().await,
            Err(HearthError::CatalogUnavailable(_))
        ));
    }

    #[test]
    fn location_dispatch() {
        let http = source_for_location("https://catalog.example/c.json", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(http.location(), "https://catalog.example/c.json");

        let file = source_for_location("file:///srv/catalog.json", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(file.location(), "/srv/catalog.json");

        let plain = source_for_location("/srv/catalog.json", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(plain.location(), "/srv/catalog.json");

        assert!(matches!(
            source_for_location("catalog.json", DEFAULT_TIMEOUT),
            Err(HearthError::Config(_))
        ));
    }
}
