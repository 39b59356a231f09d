//! Driven port for the external row store holding all tenant data.
//!
//! The store exposes tables (named by convention, see
//! [`crate::domain::parse_table_name`]) and schemaless rows inside them.
//! Adapters translate transport failures into [`RemoteStoreError`] and never
//! retry; retry policy belongs to callers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::define_port_error;
use crate::domain::{Row, RowFields, RowId, TableId};

/// Table metadata returned by the store's table listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTable {
    /// Store-assigned table identifier.
    pub id: TableId,
    /// Human-entered table name, e.g. `clients_welcome_TT001`.
    pub name: String,
    /// Identifier of the database that owns the table.
    #[serde(rename = "database_id")]
    pub database_id: i64,
}

/// Opaque query parameters forwarded verbatim to the store.
///
/// Keys and values are not interpreted locally; ordering is stable so the
/// generated query string is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilters(BTreeMap<String, String>);

impl RowFilters {
    /// Create an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one query parameter.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::ports::RowFilters;
    ///
    /// let filters = RowFilters::new().with("filter__status__equal", "paid");
    /// assert_eq!(filters.get("filter__status__equal"), Some("paid"));
    /// ```
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    /// Look up one parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Return `true` when `key` has been set.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Return `true` when no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

define_port_error! {
    /// Errors raised by remote store adapters.
    pub enum RemoteStoreError {
        /// The store answered with a non-success HTTP status.
        Status {
            /// HTTP status code returned by the store.
            status: u16,
            /// Compact description including a body preview.
            message: String,
        } => "remote store returned status {status}: {message}",
        /// The request could not be delivered or the response not read.
        Transport {
            /// Underlying transport failure.
            message: String,
        } => "remote store transport failed: {message}",
        /// The request exceeded its deadline.
        Timeout {
            /// Underlying timeout description.
            message: String,
        } => "remote store request timed out: {message}",
        /// The response body did not match the expected shape.
        Decode {
            /// Decoder failure description.
            message: String,
        } => "remote store response could not be decoded: {message}",
    }
}

impl RemoteStoreError {
    /// Remote HTTP status code when the failure came from a response.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::ports::RemoteStoreError;
    ///
    /// assert_eq!(RemoteStoreError::status(404_u16, "missing").status_code(), Some(404));
    /// assert_eq!(RemoteStoreError::timeout("30s").status_code(), None);
    /// ```
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Timeout { .. } | Self::Decode { .. } => None,
        }
    }
}

/// Port for reading table metadata and reading or writing rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List every table visible to the configured credentials, in the
    /// store's enumeration order.
    async fn list_tables(&self) -> Result<Vec<RemoteTable>, RemoteStoreError>;

    /// List all rows of a table, passing `filters` through as query
    /// parameters.
    async fn list_rows(
        &self,
        table_id: TableId,
        filters: &RowFilters,
    ) -> Result<Vec<Row>, RemoteStoreError>;

    /// Create a row from a field bag and return the stored row.
    async fn create_row(
        &self,
        table_id: TableId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError>;

    /// Apply a partial field bag to an existing row and return the result.
    async fn update_row(
        &self,
        table_id: TableId,
        row_id: RowId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError>;

    /// Fetch a single row.
    async fn get_row(&self, table_id: TableId, row_id: RowId) -> Result<Row, RemoteStoreError>;
}
