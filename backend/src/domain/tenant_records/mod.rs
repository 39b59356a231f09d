//! Tenant-scoped record operations behind the dashboard screens.
//!
//! Each operation resolves the tenant's table through the shared
//! [`TableRegistry`], talks to the [`RemoteStore`], and applies the small
//! amount of business logic the screens need: appointment filtering and
//! ordering, follow-up and retargeting flags, and email log rows.
//!
//! Failures map onto the domain [`Error`]:
//! - an unprovisioned table is [`ErrorCode::NotFound`](super::ErrorCode::NotFound)
//!   with `TABLE_NOT_FOUND` details;
//! - a remote 404 is `NotFound`, naming the row for row-addressed calls and
//!   the table (again `TABLE_NOT_FOUND`) for table-wide ones;
//! - every other store or registry failure is `ServiceUnavailable`.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};

use super::ports::{RemoteStore, RemoteStoreError, RowFilters};
use super::{
    DomainResult, Error, FieldValue, Row, RowFields, RowId, TableId, TableKind, TableRegistry,
};

const RETARGETING_ATTENTION_DAYS: i64 = 30;
const DEFAULT_APPOINTMENT_STATUS: &str = "scheduled";
const SENT_EMAIL_STATUS: &str = "sent";
const NOT_FOUND_STATUS: u16 = 404;

/// Local filters applied to a tenant's appointments.
///
/// A criterion only excludes rows that carry the field it inspects; rows
/// with a missing or unparseable field pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentQuery {
    /// Keep appointments starting at or after this instant.
    pub start: Option<DateTime<Utc>>,
    /// Keep appointments starting at or before this instant.
    pub end: Option<DateTime<Utc>>,
    /// Keep appointments whose status matches, ignoring case.
    pub status: Option<String>,
}

impl AppointmentQuery {
    fn matches(&self, row: &Row) -> bool {
        let starts_at = row.timestamp("starts_at");
        let after_start = match (self.start, starts_at) {
            (Some(start), Some(at)) => at >= start,
            _ => true,
        };
        let before_end = match (self.end, starts_at) {
            (Some(end), Some(at)) => at <= end,
            _ => true,
        };
        let status_matches = match (self.status.as_deref(), row.text("status")) {
            (Some(wanted), Some(actual)) => wanted.to_lowercase() == actual.to_lowercase(),
            _ => true,
        };
        after_start && before_end && status_matches
    }
}

/// Campaign whose email log receives a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailChannel {
    /// Re-engagement emails to lapsed clients.
    Retargeting,
    /// Reminder emails to clients awaiting a follow-up.
    Followup,
}

impl EmailChannel {
    /// Table the channel's log rows are written to.
    pub const fn log_table(self) -> TableKind {
        match self {
            Self::Retargeting => TableKind::RetargetingEmailLogs,
            Self::Followup => TableKind::FollowupEmailLogs,
        }
    }
}

/// Record operations for one tenant's dashboard tables.
#[derive(Clone)]
pub struct TenantRecordsService {
    registry: Arc<TableRegistry>,
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl TenantRecordsService {
    /// Create a service sharing the process-wide registry.
    pub fn new(
        registry: Arc<TableRegistry>,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
        }
    }

    /// List appointments matching `query`, ordered by `starts_at` with
    /// undated rows last.
    pub async fn list_appointments(
        &self,
        tenant_code: &str,
        query: &AppointmentQuery,
    ) -> DomainResult<Vec<Row>> {
        let rows = self.list_rows(tenant_code, TableKind::Appointments).await?;
        let mut matching: Vec<Row> = rows.into_iter().filter(|row| query.matches(row)).collect();
        sort_by_timestamp(&mut matching, "starts_at");
        Ok(matching)
    }

    /// Create an appointment, defaulting `status` to `scheduled` and `value`
    /// to zero when absent.
    pub async fn create_appointment(
        &self,
        tenant_code: &str,
        mut fields: RowFields,
    ) -> DomainResult<Row> {
        fill_default(&mut fields, "status", DEFAULT_APPOINTMENT_STATUS.into());
        fill_default(&mut fields, "value", 0_i64.into());
        self.create(tenant_code, TableKind::Appointments, &fields).await
    }

    /// Apply a partial update to an appointment.
    pub async fn update_appointment(
        &self,
        tenant_code: &str,
        row_id: RowId,
        fields: &RowFields,
    ) -> DomainResult<Row> {
        self.update(tenant_code, TableKind::Appointments, row_id, fields)
            .await
    }

    /// Fetch one appointment.
    pub async fn get_appointment(&self, tenant_code: &str, row_id: RowId) -> DomainResult<Row> {
        let table_id = self.table_for(TableKind::Appointments, tenant_code).await?;
        self.store
            .get_row(table_id, row_id)
            .await
            .map_err(|err| map_store_error(TableKind::Appointments, tenant_code, Some(row_id), &err))
    }

    /// List every welcome client.
    pub async fn list_welcome_clients(&self, tenant_code: &str) -> DomainResult<Vec<Row>> {
        self.list_rows(tenant_code, TableKind::WelcomeClients).await
    }

    /// Create a welcome client stamped with the current time as
    /// `created_at`.
    pub async fn create_welcome_client(
        &self,
        tenant_code: &str,
        mut fields: RowFields,
    ) -> DomainResult<Row> {
        fields.insert("created_at".to_owned(), self.clock.utc().into());
        self.create(tenant_code, TableKind::WelcomeClients, &fields)
            .await
    }

    /// Apply a partial update to a welcome client.
    pub async fn update_welcome_client(
        &self,
        tenant_code: &str,
        row_id: RowId,
        fields: &RowFields,
    ) -> DomainResult<Row> {
        self.update(tenant_code, TableKind::WelcomeClients, row_id, fields)
            .await
    }

    /// List retargeting clients, flagging with `needs_attention` those not
    /// seen for 30 days or with no `last_visit_date` at all. A date that is
    /// set but unparseable is not flagged.
    pub async fn list_retargeting_clients(&self, tenant_code: &str) -> DomainResult<Vec<Row>> {
        let rows = self
            .list_rows(tenant_code, TableKind::RetargetingClients)
            .await?;
        let cutoff = self.clock.utc() - TimeDelta::days(RETARGETING_ATTENTION_DAYS);
        Ok(rows
            .into_iter()
            .map(|mut row| {
                let needs_attention = match row.get("last_visit_date") {
                    None | Some(FieldValue::Null) => true,
                    Some(FieldValue::Text(text)) if text.is_empty() => true,
                    Some(value) => value.to_timestamp().is_some_and(|visited| visited < cutoff),
                };
                row.insert("needs_attention", needs_attention);
                row
            })
            .collect())
    }

    /// List follow-up clients ordered by `due_date`, flagging past-due rows
    /// with `is_overdue`.
    pub async fn list_followup_clients(&self, tenant_code: &str) -> DomainResult<Vec<Row>> {
        let rows = self
            .list_rows(tenant_code, TableKind::FollowupClients)
            .await?;
        let now = self.clock.utc();
        let mut flagged: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                let is_overdue = row.timestamp("due_date").is_some_and(|due| due < now);
                row.insert("is_overdue", is_overdue);
                row
            })
            .collect();
        sort_by_timestamp(&mut flagged, "due_date");
        Ok(flagged)
    }

    /// Apply a partial update to a follow-up client.
    pub async fn update_followup_client(
        &self,
        tenant_code: &str,
        row_id: RowId,
        fields: &RowFields,
    ) -> DomainResult<Row> {
        self.update(tenant_code, TableKind::FollowupClients, row_id, fields)
            .await
    }

    /// Record a sent email in the channel's log table.
    ///
    /// # Errors
    /// Returns [`ErrorCode::InvalidRequest`](super::ErrorCode::InvalidRequest)
    /// when `subject` is blank.
    pub async fn log_email(
        &self,
        tenant_code: &str,
        channel: EmailChannel,
        client_id: RowId,
        subject: &str,
        content: Option<&str>,
    ) -> DomainResult<Row> {
        if subject.trim().is_empty() {
            return Err(Error::invalid_request("email subject must not be empty")
                .with_details(json!({ "field": "subject" })));
        }
        let fields = RowFields::from([
            ("client_id".to_owned(), FieldValue::from(client_id.get())),
            ("subject".to_owned(), FieldValue::from(subject)),
            ("content".to_owned(), FieldValue::from(content.unwrap_or_default())),
            ("sent_at".to_owned(), FieldValue::from(self.clock.utc())),
            ("status".to_owned(), FieldValue::from(SENT_EMAIL_STATUS)),
        ]);
        let row = self
            .create(tenant_code, channel.log_table(), &fields)
            .await?;
        info!(tenant = tenant_code, ?channel, client = %client_id, "logged sent email");
        Ok(row)
    }

    /// List every row of a tenant table without local processing.
    pub async fn list_rows(&self, tenant_code: &str, kind: TableKind) -> DomainResult<Vec<Row>> {
        let table_id = self.table_for(kind, tenant_code).await?;
        self.store
            .list_rows(table_id, &RowFilters::new())
            .await
            .map_err(|err| map_store_error(kind, tenant_code, None, &err))
    }

    async fn create(
        &self,
        tenant_code: &str,
        kind: TableKind,
        fields: &RowFields,
    ) -> DomainResult<Row> {
        let table_id = self.table_for(kind, tenant_code).await?;
        self.store
            .create_row(table_id, fields)
            .await
            .map_err(|err| map_store_error(kind, tenant_code, None, &err))
    }

    async fn update(
        &self,
        tenant_code: &str,
        kind: TableKind,
        row_id: RowId,
        fields: &RowFields,
    ) -> DomainResult<Row> {
        let table_id = self.table_for(kind, tenant_code).await?;
        self.store
            .update_row(table_id, row_id, fields)
            .await
            .map_err(|err| map_store_error(kind, tenant_code, Some(row_id), &err))
    }

    async fn table_for(&self, kind: TableKind, tenant_code: &str) -> DomainResult<TableId> {
        match self.registry.resolve_kind(kind, tenant_code).await {
            Ok(Some(table_id)) => Ok(table_id),
            Ok(None) => Err(table_not_found(kind, tenant_code)),
            Err(err) => {
                warn!(tenant = tenant_code, table = %kind, error = %err, "table resolution failed");
                Err(Error::service_unavailable("remote store unavailable"))
            }
        }
    }
}

fn fill_default(fields: &mut RowFields, key: &str, value: FieldValue) {
    let slot = fields.entry(key.to_owned()).or_insert(FieldValue::Null);
    if *slot == FieldValue::Null {
        *slot = value;
    }
}

/// Stable ascending sort on a timestamp field; rows without one go last.
fn sort_by_timestamp(rows: &mut [Row], key: &str) {
    rows.sort_by_cached_key(|row| {
        let at = row.timestamp(key);
        (at.is_none(), at)
    });
}

fn table_not_found(kind: TableKind, tenant_code: &str) -> Error {
    Error::not_found(format!("{} table not found", kind.label())).with_details(json!({
        "code": "TABLE_NOT_FOUND",
        "table": kind.prefix(),
        "tenant": tenant_code,
    }))
}

/// A remote 404 on a row-addressed call means the row is gone; on a
/// table-wide call it means the table was deleted after it was cached.
fn map_store_error(
    kind: TableKind,
    tenant_code: &str,
    row_id: Option<RowId>,
    err: &RemoteStoreError,
) -> Error {
    if err.status_code() == Some(NOT_FOUND_STATUS) {
        return match row_id {
            Some(id) => Error::not_found(format!("{} row not found", kind.label()))
                .with_details(json!({ "row": id.get() })),
            None => table_not_found(kind, tenant_code),
        };
    }
    warn!(tenant = tenant_code, table = %kind, error = %err, "remote store call failed");
    let error = Error::service_unavailable("remote store unavailable");
    match err.status_code() {
        Some(status) => error.with_details(json!({ "status": status })),
        None => error,
    }
}
