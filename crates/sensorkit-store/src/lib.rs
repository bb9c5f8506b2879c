//! SQLite persistence for sensorkit query checkpoints.
//!
//! [`Store`] implements [`CheckpointBackend`](sensorkit_types::CheckpointBackend),
//! so anchored fetches survive process restarts.
//!
//! # Features
//!
//! - One row per checkpoint key, written atomically
//! - Nanosecond timestamps; the distant past is stored as `NULL`
//! - Literal prefix deletes for resetting a sensor or everything
//! - Query by key prefix and write time, with pagination
//!
//! # Example
//!
//! ```no_run
//! use sensorkit_store::{AnchorQuery, Store};
//!
//! let store = Store::open_default()?;
//!
//! for anchor in store.query_anchors(&AnchorQuery::new().prefix("sensorkit.anchor."))? {
//!     println!("{}: {}", anchor.key, anchor.checkpoint);
//! }
//! # Ok::<(), sensorkit_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::StoredAnchor;
pub use queries::AnchorQuery;
pub use schema::SCHEMA_VERSION;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/sensorkit/anchors.db`
/// - macOS: `~/Library/Application Support/sensorkit/anchors.db`
/// - Windows: `C:\Users\<user>\AppData\Local\sensorkit\anchors.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("sensorkit")
        .join("anchors.db")
}
