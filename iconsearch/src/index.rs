//! Remote folder index.
//!
//! Lists every object of one density folder once and keeps the result as
//! a [`HandleSet`]. Searches only ever see a set that finished loading:
//! [`RemoteFolderIndex::handles`] refuses to hand anything out before that.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::storage::{Handle, ObjectStore, StorageError};

/// Errors from loading or reading the index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// No tracked transport is active.
    #[error("no network connection")]
    NetworkUnavailable,

    /// The listing request failed.
    #[error("failed to list {path}: {source}")]
    ListingFailed { path: String, source: StorageError },

    /// Another load is already running.
    #[error("index load already in progress")]
    LoadInProgress,

    /// The handle set has not finished loading.
    #[error("index is not ready")]
    NotReady,

    /// `refresh` was called before any `load`.
    #[error("index was never loaded")]
    NeverLoaded,
}

/// Ordered handles of one folder, as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleSet {
    handles: Vec<Handle>,
}

impl HandleSet {
    /// Wrap a listing result.
    pub fn new(handles: Vec<Handle>) -> Self {
        Self { handles }
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the folder was empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles in listing order.
    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.handles.iter()
    }

    /// Handles as a slice.
    pub fn as_slice(&self) -> &[Handle] {
        &self.handles
    }
}

impl FromIterator<Handle> for HandleSet {
    fn from_iter<I: IntoIterator<Item = Handle>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Load state of the index.
#[derive(Debug, Clone)]
pub enum IndexState {
    /// `load` was never called.
    NotLoaded,
    /// A listing is running.
    Loading,
    /// The set is complete and may be searched.
    Ready(Arc<HandleSet>),
    /// The last listing failed.
    Failed(String),
}

impl IndexState {
    /// Short label for logs and status lines.
    pub fn label(&self) -> &'static str {
        match self {
            IndexState::NotLoaded => "not loaded",
            IndexState::Loading => "loading",
            IndexState::Ready(_) => "ready",
            IndexState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
struct IndexInner {
    state: IndexState,
    path: Option<String>,
}

/// Index of one remote folder.
pub struct RemoteFolderIndex {
    store: Arc<dyn ObjectStore>,
    monitor: Arc<dyn ConnectivityMonitor>,
    inner: Mutex<IndexInner>,
}

impl RemoteFolderIndex {
    /// Create an index that lists through `store`, gated by `monitor`.
    pub fn new(store: Arc<dyn ObjectStore>, monitor: Arc<dyn ConnectivityMonitor>) -> Self {
        Self {
            store,
            monitor,
            inner: Mutex::new(IndexInner {
                state: IndexState::NotLoaded,
                path: None,
            }),
        }
    }

    /// Current load state.
    pub fn state(&self) -> IndexState {
        self.inner.lock().state.clone()
    }

    /// Whether a complete set is available.
    pub fn is_ready(&self) -> bool {
        matches!(self.inner.lock().state, IndexState::Ready(_))
    }

    /// Folder of the last load, if any.
    pub fn path(&self) -> Option<String> {
        self.inner.lock().path.clone()
    }

    /// The loaded set, or [`IndexError::NotReady`].
    pub fn handles(&self) -> Result<Arc<HandleSet>, IndexError> {
        match &self.inner.lock().state {
            IndexState::Ready(set) => Ok(Arc::clone(set)),
            _ => Err(IndexError::NotReady),
        }
    }

    /// List `path` and make the result the current set.
    ///
    /// Refused while offline or while another load runs. A failed load
    /// leaves the index in [`IndexState::Failed`]; the previous set is not
    /// kept, so searching stays disabled until a load succeeds.
    pub async fn load(&self, path: &str) -> Result<Arc<HandleSet>, IndexError> {
        if !self.monitor.is_connected() {
            warn!(path, "Index load skipped: no network");
            return Err(IndexError::NetworkUnavailable);
        }

        {
            let mut inner = self.inner.lock();
            if matches!(inner.state, IndexState::Loading) {
                return Err(IndexError::LoadInProgress);
            }
            inner.state = IndexState::Loading;
            inner.path = Some(path.to_string());
        }

        info!(path, backend = self.store.name(), "Loading folder index");
        let result = self.store.list_all(path).await;

        let mut inner = self.inner.lock();
        match result {
            Ok(handles) => {
                let set = Arc::new(HandleSet::new(handles));
                info!(path, count = set.len(), "Folder index ready");
                inner.state = IndexState::Ready(Arc::clone(&set));
                Ok(set)
            }
            Err(e) => {
                warn!(path, error = %e, "Folder listing failed");
                inner.state = IndexState::Failed(e.to_string());
                Err(IndexError::ListingFailed {
                    path: path.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Load the folder of the previous `load` again.
    pub async fn refresh(&self) -> Result<Arc<HandleSet>, IndexError> {
        let path = self.path().ok_or(IndexError::NeverLoaded)?;
        self.load(&path).await
    }
}
