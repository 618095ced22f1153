//! Remote object storage abstraction.
//!
//! This module provides the [`ObjectStore`] trait used by the index and the
//! search coordinator, the value types that flow through it, and two
//! backends:
//!
//! - [`FirebaseStorage`]: the Firebase Storage REST API over an
//!   [`AsyncHttpClient`]
//! - [`MemoryStore`]: an in-memory, scriptable backend
//!
//! # Example
//!
//! ```ignore
//! use iconsearch::storage::{FirebaseConfig, FirebaseStorage, ObjectStore, ReqwestClient};
//!
//! let http = ReqwestClient::new()?;
//! let store = FirebaseStorage::new(http, FirebaseConfig::new("my-app.appspot.com"));
//! let handles = store.list_all("google_icons/drawable-hdpi/").await?;
//! let address = store.resolve(&handles[0]).await?;
//! ```

mod firebase;
mod http;
mod memory;
mod retry;

pub use firebase::{FirebaseConfig, FirebaseStorage, DEFAULT_ENDPOINT};
pub use http::{AsyncHttpClient, ReqwestClient};
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, DEFAULT_DOWNLOAD_RETRY, DEFAULT_OPERATION_RETRY};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The request never produced a response (DNS, connect, timeout, ...).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The response body could not be understood.
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    /// The object exists but carries no download token.
    #[error("no download token for {0}")]
    MissingToken(String),

    /// The configured endpoint is not a usable base URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transport(_) => true,
            StorageError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Reference to one remote object.
///
/// The name is the last path segment (the filename with extension) and is
/// what searches match against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle {
    name: String,
    full_path: String,
}

impl Handle {
    /// Create a handle from the object's full path inside the bucket.
    pub fn new(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let name = full_path
            .rsplit('/')
            .next()
            .unwrap_or(full_path.as_str())
            .to_string();
        Self { name, full_path }
    }

    /// Filename of the object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the object inside the bucket.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

/// Fetchable address of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedAddress(String);

impl ResolvedAddress {
    /// Wrap an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing and address resolution against a bucket.
///
/// Implementations own their retry behavior: callers issue one request and
/// get one final answer.
///
/// # Dyn Compatibility
///
/// Methods return [`BoxFuture`] so the trait can be used as
/// `Arc<dyn ObjectStore>`.
pub trait ObjectStore: Send + Sync {
    /// List every object directly under `path`, in backend order.
    fn list_all<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<Handle>, StorageError>>;

    /// Turn a handle into a fetchable address.
    fn resolve<'a>(
        &'a self,
        handle: &'a Handle,
    ) -> BoxFuture<'a, Result<ResolvedAddress, StorageError>>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_name_is_last_segment() {
        let handle = Handle::new("google_icons/drawable-hdpi/home_hdpi.png");
        assert_eq!(handle.name(), "home_hdpi.png");
        assert_eq!(handle.full_path(), "google_icons/drawable-hdpi/home_hdpi.png");
    }

    #[test]
    fn test_handle_without_folder() {
        let handle = Handle::new("back.png");
        assert_eq!(handle.name(), "back.png");
        assert_eq!(handle.to_string(), "back.png");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(StorageError::Transport("reset".into()).is_retryable());
        assert!(StorageError::Http {
            status: 503,
            url: "u".into()
        }
        .is_retryable());
        assert!(StorageError::Http {
            status: 429,
            url: "u".into()
        }
        .is_retryable());
        assert!(!StorageError::Http {
            status: 404,
            url: "u".into()
        }
        .is_retryable());
        assert!(!StorageError::MissingToken("a.png".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::Http {
            status: 403,
            url: "https://example.com/o".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 403 from https://example.com/o");
    }
}
