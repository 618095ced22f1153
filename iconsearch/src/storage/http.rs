//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use super::StorageError;

/// Trait for async HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Returns
    ///
    /// The response body as bytes, or an error for transport failures and
    /// non-success statuses.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, StorageError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates a new ReqwestClient with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(format!("Request failed: {}", e)))?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| StorageError::Transport(format!("Failed to read response: {}", e)))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Mock HTTP client for testing.
    ///
    /// Responses are scripted per URL. Each request pops the next scripted
    /// response; the last one repeats. Unknown URLs answer 404.
    #[derive(Default)]
    pub struct MockAsyncHttpClient {
        routes: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, StorageError>>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockAsyncHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, url: &str, response: Result<Vec<u8>, StorageError>) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(response);
            self
        }

        pub fn respond_json(self, url: &str, body: &str) -> Self {
            self.respond(url, Ok(body.as_bytes().to_vec()))
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, url: &str) -> Result<Vec<u8>, StorageError> {
            self.requests.lock().unwrap().push(url.to_string());

            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => Err(StorageError::Http {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockAsyncHttpClient::new().respond("http://example.com", Ok(vec![1, 2, 3, 4]));

        let result = mock.get("http://example.com").await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.requests(), vec!["http://example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_client_sequence_then_repeat() {
        let mock = MockAsyncHttpClient::new()
            .respond("http://a", Err(StorageError::Transport("reset".into())))
            .respond("http://a", Ok(vec![7]));

        assert!(mock.get("http://a").await.is_err());
        assert_eq!(mock.get("http://a").await.unwrap(), vec![7]);
        assert_eq!(mock.get("http://a").await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_mock_client_unknown_url() {
        let mock = MockAsyncHttpClient::new();
        let result = mock.get("http://missing").await;
        assert!(matches!(result, Err(StorageError::Http { status: 404, .. })));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(Duration::from_secs(5)).is_ok());
    }
}
