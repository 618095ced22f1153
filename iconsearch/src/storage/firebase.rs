//! Firebase Storage backend.
//!
//! Talks to the Firebase Storage REST API (`/v0/b/{bucket}/o`).
//!
//! # API Endpoints
//!
//! - List: `GET {endpoint}/v0/b/{bucket}/o?prefix={folder}&delimiter=/`,
//!   paginated through `nextPageToken`
//! - Metadata: `GET {endpoint}/v0/b/{bucket}/o/{url-encoded object path}`
//!
//! The download address of an object is its metadata URL with
//! `alt=media&token={downloadToken}` appended. Objects without a download
//! token cannot be fetched anonymously and fail to resolve.

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use super::http::AsyncHttpClient;
use super::retry::{RetryPolicy, DEFAULT_DOWNLOAD_RETRY, DEFAULT_OPERATION_RETRY};
use super::{BoxFuture, Handle, ObjectStore, ResolvedAddress, StorageError};

/// Public Firebase Storage endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

/// Safety stop for runaway pagination.
const MAX_LIST_PAGES: usize = 1000;

/// Configuration for the Firebase backend.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// API base URL.
    pub endpoint: String,
    /// Bucket name, e.g. `my-app.appspot.com`.
    pub bucket: String,
    /// Retry budget for listing.
    pub operation_retry: RetryPolicy,
    /// Retry budget for address resolution.
    pub download_retry: RetryPolicy,
}

impl FirebaseConfig {
    /// Create a config for the given bucket with default endpoint and budgets.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket: bucket.into(),
            operation_retry: RetryPolicy::new(DEFAULT_OPERATION_RETRY),
            download_retry: RetryPolicy::new(DEFAULT_DOWNLOAD_RETRY),
        }
    }

    /// Set the API base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the listing retry budget.
    pub fn with_operation_retry(mut self, policy: RetryPolicy) -> Self {
        self.operation_retry = policy;
        self
    }

    /// Set the resolution retry budget.
    pub fn with_download_retry(mut self, policy: RetryPolicy) -> Self {
        self.download_retry = policy;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectMetadata {
    #[serde(default, rename = "downloadTokens")]
    download_tokens: Option<String>,
}

impl ObjectMetadata {
    fn first_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()?
            .split(',')
            .map(str::trim)
            .find(|t| !t.is_empty())
    }
}

/// Object store backed by Firebase Storage.
pub struct FirebaseStorage<C: AsyncHttpClient> {
    http_client: C,
    config: FirebaseConfig,
}

impl<C: AsyncHttpClient> FirebaseStorage<C> {
    /// Create a backend using the given HTTP client.
    pub fn new(http_client: C, config: FirebaseConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    /// `{endpoint}/v0/b/{bucket}/o`
    fn objects_url(&self) -> Result<Url, StorageError> {
        let invalid = || StorageError::InvalidEndpoint(self.config.endpoint.clone());
        let mut url = Url::parse(&self.config.endpoint).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v0", "b", self.config.bucket.as_str(), "o"]);
        Ok(url)
    }

    /// Listing URL for one page under `prefix`.
    fn list_url(&self, prefix: &str, page_token: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.objects_url()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            query.append_pair("delimiter", "/");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// Metadata URL of one object. The whole path is a single, encoded segment.
    fn object_url(&self, full_path: &str) -> Result<Url, StorageError> {
        let mut url = self.objects_url()?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidEndpoint(self.config.endpoint.clone()))?
            .push(full_path);
        Ok(url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &Url,
        policy: &RetryPolicy,
        label: &str,
    ) -> Result<T, StorageError> {
        let body = policy
            .run(label, || self.http_client.get(url.as_str()))
            .await?;

        serde_json::from_slice(&body).map_err(|e| StorageError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list_pages(&self, path: &str) -> Result<Vec<Handle>, StorageError> {
        let prefix = normalize_prefix(path);
        let mut handles = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_LIST_PAGES {
            let url = self.list_url(&prefix, page_token.as_deref())?;
            let response: ListResponse = self
                .get_json(&url, &self.config.operation_retry, "list")
                .await?;

            debug!(page, items = response.items.len(), "Listed storage page");
            handles.extend(response.items.into_iter().map(|item| Handle::new(item.name)));

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => {
                    info!(
                        bucket = %self.config.bucket,
                        prefix = %prefix,
                        count = handles.len(),
                        "Storage listing complete"
                    );
                    return Ok(handles);
                }
            }
        }

        Err(StorageError::InvalidResponse {
            url: self.list_url(&prefix, None)?.to_string(),
            reason: format!("listing did not finish after {} pages", MAX_LIST_PAGES),
        })
    }

    async fn resolve_address(&self, handle: &Handle) -> Result<ResolvedAddress, StorageError> {
        let url = self.object_url(handle.full_path())?;
        let metadata: ObjectMetadata = self
            .get_json(&url, &self.config.download_retry, "resolve")
            .await?;

        let token = metadata
            .first_token()
            .ok_or_else(|| StorageError::MissingToken(handle.full_path().to_string()))?;

        let mut address = url;
        address
            .query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(ResolvedAddress::new(address.to_string()))
    }
}

impl<C: AsyncHttpClient> ObjectStore for FirebaseStorage<C> {
    fn list_all<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<Handle>, StorageError>> {
        Box::pin(self.list_pages(path))
    }

    fn resolve<'a>(
        &'a self,
        handle: &'a Handle,
    ) -> BoxFuture<'a, Result<ResolvedAddress, StorageError>> {
        Box::pin(self.resolve_address(handle))
    }

    fn name(&self) -> &str {
        "Firebase Storage"
    }
}

/// Folder prefixes always end in a slash so the delimiter lists direct
/// children only. The bucket root is the empty prefix.
fn normalize_prefix(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockAsyncHttpClient;
    use std::time::Duration;

    const BUCKET: &str = "icons.appspot.com";
    const LIST_URL: &str = "https://firebasestorage.googleapis.com/v0/b/icons.appspot.com/o?prefix=google_icons%2Fdrawable-hdpi%2F&delimiter=%2F";
    const HOME_URL: &str = "https://firebasestorage.googleapis.com/v0/b/icons.appspot.com/o/google_icons%2Fdrawable-hdpi%2Fhome_hdpi.png";

    fn storage(mock: MockAsyncHttpClient) -> FirebaseStorage<MockAsyncHttpClient> {
        let fast = RetryPolicy::new(Duration::from_millis(200))
            .with_initial_backoff(Duration::from_millis(5));
        FirebaseStorage::new(
            mock,
            FirebaseConfig::new(BUCKET)
                .with_operation_retry(fast)
                .with_download_retry(fast),
        )
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("google_icons/drawable-hdpi"), "google_icons/drawable-hdpi/");
        assert_eq!(normalize_prefix("/google_icons/drawable-hdpi/"), "google_icons/drawable-hdpi/");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn test_url_construction() {
        let store = storage(MockAsyncHttpClient::new());
        assert_eq!(
            store.list_url("google_icons/drawable-hdpi/", None).unwrap().as_str(),
            LIST_URL
        );
        assert_eq!(
            store
                .object_url("google_icons/drawable-hdpi/home_hdpi.png")
                .unwrap()
                .as_str(),
            HOME_URL
        );
    }

    #[test]
    fn test_custom_endpoint_with_trailing_slash() {
        let store = FirebaseStorage::new(
            MockAsyncHttpClient::new(),
            FirebaseConfig::new(BUCKET).with_endpoint("http://127.0.0.1:9199/"),
        );
        assert_eq!(
            store.objects_url().unwrap().as_str(),
            "http://127.0.0.1:9199/v0/b/icons.appspot.com/o"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let store = FirebaseStorage::new(
            MockAsyncHttpClient::new(),
            FirebaseConfig::new(BUCKET).with_endpoint("not a url"),
        );
        assert!(matches!(
            store.objects_url(),
            Err(StorageError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_list_all_follows_pages() {
        let page_two = format!("{}&pageToken=next-1", LIST_URL);
        let mock = MockAsyncHttpClient::new()
            .respond_json(
                LIST_URL,
                r#"{"prefixes":[],"items":[
                    {"name":"google_icons/drawable-hdpi/home_hdpi.png","bucket":"icons.appspot.com"},
                    {"name":"google_icons/drawable-hdpi/search_hdpi.png","bucket":"icons.appspot.com"}
                ],"nextPageToken":"next-1"}"#,
            )
            .respond_json(
                &page_two,
                r#"{"items":[{"name":"google_icons/drawable-hdpi/back.png","bucket":"icons.appspot.com"}]}"#,
            );
        let store = storage(mock);

        let handles = store.list_all("google_icons/drawable-hdpi/").await.unwrap();
        let names: Vec<_> = handles.iter().map(Handle::name).collect();
        assert_eq!(names, vec!["home_hdpi.png", "search_hdpi.png", "back.png"]);
    }

    #[tokio::test]
    async fn test_list_all_empty_folder() {
        let mock = MockAsyncHttpClient::new().respond_json(LIST_URL, r#"{"prefixes":[]}"#);
        let store = storage(mock);

        let handles = store.list_all("google_icons/drawable-hdpi").await.unwrap();
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_retries_server_errors() {
        let mock = MockAsyncHttpClient::new()
            .respond(
                LIST_URL,
                Err(StorageError::Http {
                    status: 503,
                    url: LIST_URL.to_string(),
                }),
            )
            .respond_json(
                LIST_URL,
                r#"{"items":[{"name":"google_icons/drawable-hdpi/home_hdpi.png"}]}"#,
            );
        let store = storage(mock);

        let handles = store.list_all("google_icons/drawable-hdpi/").await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(store.http_client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_list_all_invalid_json() {
        let mock = MockAsyncHttpClient::new().respond_json(LIST_URL, "<html>");
        let store = storage(mock);

        let result = store.list_all("google_icons/drawable-hdpi/").await;
        assert!(matches!(result, Err(StorageError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_resolve_builds_download_address() {
        let mock = MockAsyncHttpClient::new().respond_json(
            HOME_URL,
            r#"{"name":"google_icons/drawable-hdpi/home_hdpi.png","downloadTokens":"tok-1,tok-2"}"#,
        );
        let store = storage(mock);
        let handle = Handle::new("google_icons/drawable-hdpi/home_hdpi.png");

        let address = store.resolve(&handle).await.unwrap();
        assert_eq!(address.as_str(), format!("{}?alt=media&token=tok-1", HOME_URL));
    }

    #[tokio::test]
    async fn test_resolve_without_token_fails() {
        let mock = MockAsyncHttpClient::new()
            .respond_json(HOME_URL, r#"{"name":"google_icons/drawable-hdpi/home_hdpi.png"}"#);
        let store = storage(mock);
        let handle = Handle::new("google_icons/drawable-hdpi/home_hdpi.png");

        let result = store.resolve(&handle).await;
        assert_eq!(
            result,
            Err(StorageError::MissingToken(
                "google_icons/drawable-hdpi/home_hdpi.png".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_resolve_not_found_is_not_retried() {
        let store = storage(MockAsyncHttpClient::new());
        let handle = Handle::new("google_icons/drawable-hdpi/home_hdpi.png");

        let result = store.resolve(&handle).await;
        assert!(matches!(result, Err(StorageError::Http { status: 404, .. })));
        assert_eq!(store.http_client.requests().len(), 1);
    }
}
