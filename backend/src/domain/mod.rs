//! Domain primitives, table resolution and dashboard services.
//!
//! Purpose: resolve a tenant's logical tables to remote table ids, read and
//! write their schemaless rows through the [`ports::RemoteStore`] port, and
//! reduce those rows into overview KPIs. Nothing here knows about HTTP; the
//! only adapter lives in [`crate::outbound`].
//!
//! Public surface:
//! - [`parse_table_name`] / [`ParsedTableName`] — naming convention parser.
//! - [`TableKind`] — the closed set of dashboard tables and their prefixes.
//! - [`TableRegistry`] / [`TableMapping`] — TTL-cached, single-flight
//!   `(prefix, tenant) → table id` resolution.
//! - [`Row`] / [`FieldValue`] — schemaless rows with explicit coercions.
//! - [`KpiService`] / [`aggregate`] / [`KpiSnapshot`] — overview metrics.
//! - [`TenantRecordsService`] — appointment, client and email-log operations.
//! - [`Error`] / [`ErrorCode`] — transport-agnostic failure payload.

pub mod ports;

mod error;
mod ids;
mod kpi;
mod row;
mod table_kind;
mod table_name;
mod table_registry;
mod tenant_records;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{RowId, TableId};
pub use self::kpi::{KpiService, KpiSnapshot, aggregate};
pub use self::row::{FieldValue, Row, RowFields};
pub use self::table_kind::TableKind;
pub use self::table_name::{ParsedTableName, parse_table_name};
pub use self::table_registry::{
    DEFAULT_REGISTRY_TTL, GLOBAL_TENANT_KEY, TableMapping, TableRegistry, TableRegistryError,
};
pub use self::tenant_records::{AppointmentQuery, EmailChannel, TenantRecordsService};

/// Convenient result alias for record operations.
///
/// # Examples
/// ```
/// use backend::domain::{DomainResult, Error};
///
/// fn reject() -> DomainResult<()> {
///     Err(Error::invalid_request("email subject must not be empty"))
/// }
/// assert!(reject().is_err());
/// ```
pub type DomainResult<T> = Result<T, Error>;
