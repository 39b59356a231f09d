//! Overview KPIs reduced from a tenant's appointment and client rows.
//!
//! [`aggregate`] is a pure reduction over rows already fetched;
//! [`KpiService`] resolves the tenant's tables, fetches their rows and
//! aggregates them. The service never fails: any resolution or store error
//! is logged and reported as an all-zero [`KpiSnapshot`].
//!
//! `bookings_today` compares UTC calendar dates. Every other metric uses a
//! rolling window with an inclusive lower bound.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::ports::{RemoteStore, RemoteStoreError, RowFilters};
use super::{Row, TableKind, TableRegistry, TableRegistryError};

const REVENUE_WINDOW_DAYS: i64 = 30;
const RECENT_WINDOW_DAYS: i64 = 7;
const REVENUE_STATUSES: [&str; 2] = ["completed", "paid"];
const NO_SHOW_STATUSES: [&str; 2] = ["no_show", "no-show"];

/// Fixed set of dashboard overview metrics.
///
/// # Examples
/// ```
/// use backend::domain::KpiSnapshot;
/// use serde_json::json;
///
/// let value = serde_json::to_value(KpiSnapshot::default()).expect("snapshot encodes");
/// assert_eq!(
///     value,
///     json!({ "bookingsToday": 0, "revenue30d": 0.0, "newClients7d": 0, "noShows7d": 0 })
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    /// Appointments starting on the current UTC calendar day.
    pub bookings_today: u64,
    /// Completed or paid appointment value over the last 30 days.
    #[serde(rename = "revenue30d", with = "rust_decimal::serde::float")]
    pub revenue_30d: Decimal,
    /// Welcome clients created over the last 7 days.
    #[serde(rename = "newClients7d")]
    pub new_clients_7d: u64,
    /// No-show appointments over the last 7 days.
    #[serde(rename = "noShows7d")]
    pub no_shows_7d: u64,
}

impl KpiSnapshot {
    /// The snapshot reported when nothing could be computed.
    pub const ZERO: Self = Self {
        bookings_today: 0,
        revenue_30d: Decimal::ZERO,
        new_clients_7d: 0,
        no_shows_7d: 0,
    };
}

/// Reduce appointment and welcome-client rows into a [`KpiSnapshot`].
///
/// Appointments without a parseable `starts_at` and clients without a
/// parseable `created_at` are ignored. A status matches only when it is
/// text; a missing or non-numeric `value` contributes zero revenue.
pub fn aggregate(appointments: &[Row], welcome_clients: &[Row], now: DateTime<Utc>) -> KpiSnapshot {
    let today = now.date_naive();
    let revenue_since = now - TimeDelta::days(REVENUE_WINDOW_DAYS);
    let recent_since = now - TimeDelta::days(RECENT_WINDOW_DAYS);

    let mut snapshot = KpiSnapshot::ZERO;
    for row in appointments {
        let Some(starts_at) = row.timestamp("starts_at") else {
            continue;
        };

        if starts_at.date_naive() == today {
            snapshot.bookings_today += 1;
        }
        if starts_at >= revenue_since && status_matches(row, &REVENUE_STATUSES) {
            snapshot.revenue_30d += row.decimal("value").unwrap_or(Decimal::ZERO);
        }
        if starts_at >= recent_since && status_matches(row, &NO_SHOW_STATUSES) {
            snapshot.no_shows_7d += 1;
        }
    }

    snapshot.new_clients_7d = welcome_clients
        .iter()
        .filter_map(|row| row.timestamp("created_at"))
        .filter(|created_at| *created_at >= recent_since)
        .fold(0, |count, _| count + 1);

    snapshot
}

fn status_matches(row: &Row, accepted: &[&str]) -> bool {
    row.text("status").is_some_and(|status| {
        accepted
            .iter()
            .any(|candidate| status.eq_ignore_ascii_case(candidate))
    })
}

#[derive(Debug, Error)]
enum KpiFetchError {
    #[error(transparent)]
    Registry(#[from] TableRegistryError),
    #[error("listing {kind} rows failed: {source}")]
    Rows {
        kind: TableKind,
        #[source]
        source: RemoteStoreError,
    },
}

/// Computes overview KPIs for a tenant.
#[derive(Clone)]
pub struct KpiService {
    registry: Arc<TableRegistry>,
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl KpiService {
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

    /// KPIs for `tenant_code` as of the injected clock's current time.
    pub async fn current_kpis(&self, tenant_code: &str) -> KpiSnapshot {
        self.compute_kpis(tenant_code, self.clock.utc()).await
    }

    /// KPIs for `tenant_code` as of `now`.
    ///
    /// Unresolved tables contribute zero. Any other failure is logged and
    /// yields [`KpiSnapshot::ZERO`].
    pub async fn compute_kpis(&self, tenant_code: &str, now: DateTime<Utc>) -> KpiSnapshot {
        match self.fetch_rows(tenant_code).await {
            Ok((appointments, welcome_clients)) => {
                let snapshot = aggregate(&appointments, &welcome_clients, now);
                debug!(
                    tenant = tenant_code,
                    appointments = appointments.len(),
                    welcome_clients = welcome_clients.len(),
                    "computed overview KPIs"
                );
                snapshot
            }
            Err(error) => {
                warn!(tenant = tenant_code, error = %error, "KPI computation failed; reporting zeros");
                KpiSnapshot::ZERO
            }
        }
    }

    async fn fetch_rows(&self, tenant_code: &str) -> Result<(Vec<Row>, Vec<Row>), KpiFetchError> {
        let appointments = self.rows_for(TableKind::Appointments, tenant_code).await?;
        let welcome_clients = self.rows_for(TableKind::WelcomeClients, tenant_code).await?;
        Ok((appointments, welcome_clients))
    }

    async fn rows_for(&self, kind: TableKind, tenant_code: &str) -> Result<Vec<Row>, KpiFetchError> {
        let Some(table_id) = self.registry.resolve_kind(kind, tenant_code).await? else {
            debug!(tenant = tenant_code, table = %kind, "table not provisioned; contributes zero");
            return Ok(Vec::new());
        };
        self.store
            .list_rows(table_id, &RowFilters::new())
            .await
            .map_err(|source| KpiFetchError::Rows { kind, source })
    }
}
