//! Query builder for stored checkpoints.
//!
//! # Example
//!
//! ```
//! use sensorkit_store::{AnchorQuery, Store};
//!
//! let store = Store::open_in_memory()?;
//!
//! // The ten most recently written heart-rate anchors.
//! let query = AnchorQuery::new()
//!     .prefix("sensorkit.anchor.heartRate.")
//!     .recently_updated_first()
//!     .limit(10);
//! let anchors = store.query_anchors(&query)?;
//! assert!(anchors.is_empty());
//! # Ok::<(), sensorkit_store::Error>(())
//! ```

use time::OffsetDateTime;

/// Fluent query builder for [`Store::query_anchors`](crate::Store::query_anchors).
///
/// By default, results are ordered by key.
#[derive(Debug, Default, Clone)]
pub struct AnchorQuery {
    /// Only keys starting with this prefix.
    pub prefix: Option<String>,
    /// Only rows written at or after this time.
    pub updated_since: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by `updated_at` descending instead of by key.
    pub recently_updated_first: bool,
}

impl AnchorQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by key prefix.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn updated_since(mut self, time: OffsetDateTime) -> Self {
        self.updated_since = Some(time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn recently_updated_first(mut self) -> Self {
        self.recently_updated_first = true;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref prefix) = self.prefix {
            // substr avoids LIKE's wildcard escaping.
            conditions.push("substr(key, 1, length(?)) = ?");
            params.push(Box::new(prefix.clone()));
            params.push(Box::new(prefix.clone()));
        }

        if let Some(since) = self.updated_since {
            conditions.push("updated_at >= ?");
            params.push(Box::new(since.unix_timestamp()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.recently_updated_first {
            "updated_at DESC, key ASC"
        } else {
            "key ASC"
        };

        let mut sql = format!(
            "SELECT key, timestamp_ns, updated_at FROM anchors {} ORDER BY {}",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        } else if self.offset.is_some() {
            // SQLite requires a LIMIT before OFFSET.
            sql.push_str(" LIMIT -1");
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        sql
    }
}
