//! Artifact sources
//!
//! [`ArtifactSource`] is the seam between the fetcher and the outside world.
//! [`HttpSource`] is the production implementation.

use crate::error::FetchError;
use accrete_capability::Url;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Something that can produce the bytes behind an artifact URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactSource: Send + Sync + std::fmt::Debug {
    /// Retrieve the full content at `url`
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError>;
}

/// HTTP(S) source backed by `reqwest`, also serving `file://` URLs
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Create source with request timeout and user agent
    ///
    /// # Errors
    /// Returns [`FetchError::Client`] if the TLS backend cannot initialise
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn download_file(url: &Url) -> Result<Bytes, FetchError> {
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::network(url, "file URL has no local path"))?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| FetchError::network(url, e))
    }

    async fn download_http(&self, url: &Url) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.clone(),
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::network(url, e))
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        tracing::debug!(%url, "downloading artifact");
        match url.scheme() {
            "file" => Self::download_file(url).await,
            _ => self.download_http(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    #[tokio::test]
    async fn file_urls_are_read_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("module.py");
        std::fs::write(&path, b"class SuperRulesSet: pass\n").unwrap();

        let source = HttpSource::new(Duration::from_secs(5), "accrete-test").unwrap();
        let url = Url::from_file_path(&path).unwrap();
        let bytes = source.download(&url).await.unwrap();

        assert_eq!(&bytes[..], b"class SuperRulesSet: pass\n");
    }

    #[tokio::test]
    async fn missing_file_url_is_network_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.py")).unwrap();

        let source = HttpSource::new(Duration::from_secs(5), "accrete-test").unwrap();
        let err = source.download(&url).await.unwrap_err();

        assert_eq!(err.kind(), FetchErrorKind::Network);
    }
}
