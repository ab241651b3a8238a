//! HTTP transports for direct document downloads.
//!
//! Two strategies share the [`Transport`] trait so the orchestrator can chain
//! them, each under its own retry policy:
//!
//! - [`StreamingTransport`] (primary): pooled client, body streamed to disk
//!   chunk by chunk
//! - [`BufferedTransport`] (fallback): HTTP/1.1 client without connection
//!   reuse, whole body buffered then written
//!
//! Both send a desktop browser User-Agent and may skip TLS verification,
//! which some mirrors of the origin need.

use crate::config::RetrievalConfig;
use crate::error::{PipelineError, TransportError};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use url::Url;

/// One way of fetching a URL into a file.
pub trait Transport {
    fn name(&self) -> &'static str;

    /// Fetch `url` into `target`, returning the number of bytes written.
    ///
    /// On failure `target` does not exist afterwards.
    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, TransportError>;
}

/// Client settings shared by both transports.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub verify_tls: bool,
    pub user_agent: String,
}

impl HttpSettings {
    pub fn from_config(retrieval: &RetrievalConfig) -> Self {
        Self {
            timeout: Duration::from_secs(retrieval.http_timeout_secs),
            verify_tls: retrieval.verify_tls,
            user_agent: retrieval.user_agent.clone(),
        }
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(!self.verify_tls)
    }
}

fn parse_url(url: &str) -> Result<Url, TransportError> {
    Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })
}

async fn discard_partial(target: &Path) {
    if fs::try_exists(target).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(target).await {
            warn!(path = %target.display(), error = %e, "Could not remove partial download");
        }
    }
}

async fn checked_send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }
    Ok(response)
}

/// Primary transport: streams the body to disk.
#[derive(Debug, Clone)]
pub struct StreamingTransport {
    client: reqwest::Client,
}

impl StreamingTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, PipelineError> {
        let client = settings
            .builder()
            .build()
            .map_err(|e| PipelineError::Init(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    async fn stream_to(&self, url: &str, target: &Path) -> Result<u64, TransportError> {
        let parsed = parse_url(url)?;
        let response = checked_send(self.client.get(parsed)).await?;

        let mut file = fs::File::create(target).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

impl Transport for StreamingTransport {
    fn name(&self) -> &'static str {
        "streaming"
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, TransportError> {
        let result = self.stream_to(url, target).await;
        match &result {
            Ok(bytes) => debug!(bytes, "Streamed download"),
            Err(_) => discard_partial(target).await,
        }
        result
    }
}

/// Fallback transport: fresh HTTP/1.1 connection per request, buffered body.
#[derive(Debug, Clone)]
pub struct BufferedTransport {
    client: reqwest::Client,
}

impl BufferedTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self, PipelineError> {
        let client = settings
            .builder()
            .http1_only()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| PipelineError::Init(format!("fallback http client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for BufferedTransport {
    fn name(&self) -> &'static str {
        "buffered"
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_to(&self, url: &str, target: &Path) -> Result<u64, TransportError> {
        let parsed = parse_url(url)?;
        let response = checked_send(self.client.get(parsed)).await?;
        let body = response.bytes().await?;
        if let Err(e) = fs::write(target, &body).await {
            discard_partial(target).await;
            return Err(e.into());
        }
        debug!(bytes = body.len(), "Buffered download");
        Ok(body.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> HttpSettings {
        HttpSettings::from_config(&RetrievalConfig::default())
    }

    #[tokio::test]
    async fn test_streaming_writes_body_verbatim() {
        let server = MockServer::start().await;
        let body = b"%PDF-1.7 fake document".to_vec();
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "application/pdf"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("doc.pdf");
        let transport = StreamingTransport::new(&settings()).unwrap();
        let written = transport
            .fetch_to(&format!("{}/doc.pdf", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&target).unwrap(), body);
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.pdf"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.pdf");
        let url = format!("{}/missing.pdf", server.uri());

        let err = StreamingTransport::new(&settings())
            .unwrap()
            .fetch_to(&url, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status(503)));
        assert!(!target.exists());

        let err = BufferedTransport::new(&settings())
            .unwrap()
            .fetch_to(&url, &target)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status(503)));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_buffered_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/b.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"buffered".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("b.pdf");
        let written = BufferedTransport::new(&settings())
            .unwrap()
            .fetch_to(&format!("{}/b.pdf", server.uri()), &target)
            .await
            .unwrap();
        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&target).unwrap(), b"buffered");
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let err = StreamingTransport::new(&settings())
            .unwrap()
            .fetch_to("not a url", &dir.path().join("x.pdf"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
