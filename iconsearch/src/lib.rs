//! Icon Search - find icons in a remote object-storage bucket
//!
//! This library provides the core functionality for searching a bucket of
//! icon files, organized by display density folders, by filename substring
//! and resolving every match to a downloadable address.
//!
//! # Architecture
//!
//! ```text
//! ConnectivityMonitor ──gates──► RemoteFolderIndex ──HandleSet──► SearchCoordinator
//!                                        │                               │
//!                                   ObjectStore ◄────── resolve ─────────┤
//!                                                                        ▼
//!                                                                ResultPresenter
//! ```
//!
//! [`session::SearchSession`] wires the pieces together the way a single
//! search screen would.

pub mod config;
pub mod connectivity;
pub mod density;
pub mod index;
pub mod logging;
pub mod presenter;
pub mod search;
pub mod session;
pub mod storage;

/// Library version, shared with the CLI banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
