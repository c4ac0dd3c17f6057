//! HTTP client abstraction for fetching original assets.
//!
//! The render handler runs next to the serving platform, not next to the
//! build output, so originals are fetched over HTTP from the deployed
//! static tree. The trait seam allows mock clients in tests.

mod download;

pub use download::FileFetcher;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};

/// Request timeout for original asset downloads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from HTTP fetches.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request could not be performed (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered outside the 2xx range.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Asynchronous HTTP GET, returning the full response body.
pub trait AsyncHttpClient: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default download timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!(url = url, "HTTP GET starting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => Err(FetchError::Request(format!("failed to read response: {e}"))),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock client serving a scripted sequence of responses.
    ///
    /// The final entry repeats once the script is exhausted, so a single
    /// response doubles as a steady-state mock.
    pub struct MockHttpClient {
        responses: Mutex<Vec<Result<Vec<u8>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl MockHttpClient {
        pub fn new(responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            assert!(!responses.is_empty());
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn always(response: Result<Vec<u8>, FetchError>) -> Self {
            Self::new(vec![response])
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }
    }

    #[tokio::test]
    async fn test_mock_client_scripted_responses() {
        let mock = MockHttpClient::new(vec![
            Err(FetchError::Status {
                status: 503,
                url: "http://example.com/a".to_string(),
            }),
            Ok(vec![1, 2, 3]),
        ]);

        assert!(mock.get("http://example.com/a").await.is_err());
        assert_eq!(mock.get("http://example.com/a").await.unwrap(), vec![1, 2, 3]);
        // Steady state repeats the final response.
        assert_eq!(mock.get("http://example.com/a").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(mock.calls(), 3);
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 404,
            url: "http://example.com/x.jpg".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 404 from http://example.com/x.jpg");
    }
}
