//! Tenant-aware table resolution backed by a time-bounded cache.
//!
//! The registry owns the only copy of the `(prefix, tenant) → table id`
//! mapping. It is rebuilt from the store's table listing whenever it is
//! older than the TTL, always as a whole-snapshot replacement. A failed
//! refresh keeps the previous snapshot and leaves it stale so the next call
//! retries.
//!
//! Refreshes are single-flight: concurrent callers that observe a stale
//! cache queue on an async gate, and whoever acquires it after a successful
//! refresh reuses the new snapshot instead of calling the store again.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use super::ports::{RemoteStore, RemoteStoreError, RemoteTable};
use super::{TableId, TableKind, parse_table_name};

/// Tenant key used for tables without a tenant suffix.
pub const GLOBAL_TENANT_KEY: &str = "GLOBAL";

/// Default lifetime of a table mapping snapshot.
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors surfaced while resolving table identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableRegistryError {
    /// Listing tables from the store failed; the previous snapshot is kept.
    #[error("table registry refresh failed: {source}")]
    Refresh {
        /// Store failure that aborted the refresh.
        #[source]
        source: RemoteStoreError,
    },
}

/// Immutable `prefix → tenant → table id` index built from one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMapping {
    groups: BTreeMap<String, BTreeMap<String, TableId>>,
}

impl TableMapping {
    /// Build a mapping from tables in the store's enumeration order.
    ///
    /// When two names parse to the same `(prefix, tenant)` pair the later
    /// table wins and a warning names both identifiers.
    pub fn from_tables(tables: &[RemoteTable]) -> Self {
        let mut groups: BTreeMap<String, BTreeMap<String, TableId>> = BTreeMap::new();
        for table in tables {
            let parsed = parse_table_name(&table.name);
            let tenant_key = parsed
                .tenant_code
                .unwrap_or_else(|| GLOBAL_TENANT_KEY.to_owned());
            let group = groups.entry(parsed.prefix.clone()).or_default();
            if let Some(replaced) = group.insert(tenant_key.clone(), table.id) {
                warn!(
                    prefix = %parsed.prefix,
                    tenant = %tenant_key,
                    kept = %table.id,
                    replaced = %replaced,
                    "duplicate table name in listing; later table wins"
                );
            }
        }
        Self { groups }
    }

    /// Look up a table id. A missing or empty tenant code selects the
    /// global entry; any other code must match exactly.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{TableId, TableMapping};
    /// use backend::domain::ports::RemoteTable;
    ///
    /// let mapping = TableMapping::from_tables(&[
    ///     RemoteTable { id: TableId::new(1), name: "users".into(), database_id: 9 },
    ///     RemoteTable { id: TableId::new(2), name: "clients_welcome_TT001".into(), database_id: 9 },
    /// ]);
    /// assert_eq!(mapping.lookup("users", None), Some(TableId::new(1)));
    /// assert_eq!(mapping.lookup("clients_welcome", Some("TT001")), Some(TableId::new(2)));
    /// assert_eq!(mapping.lookup("clients_welcome", Some("TT002")), None);
    /// ```
    pub fn lookup(&self, prefix: &str, tenant_code: Option<&str>) -> Option<TableId> {
        let tenant_key = tenant_code
            .filter(|code| !code.is_empty())
            .unwrap_or(GLOBAL_TENANT_KEY);
        self.groups.get(prefix)?.get(tenant_key).copied()
    }

    /// Number of distinct prefixes.
    pub fn prefix_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of distinct `(prefix, tenant)` entries.
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Iterate prefixes in sorted order.
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct RegistrySnapshot {
    mapping: Arc<TableMapping>,
    refreshed_at: DateTime<Utc>,
}

/// Resolves logical tables to remote table ids for a tenant.
///
/// Construct one per process and share it behind an [`Arc`].
pub struct TableRegistry {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
    snapshot: RwLock<Option<RegistrySnapshot>>,
    refresh_gate: AsyncMutex<()>,
}

impl TableRegistry {
    /// Build a registry with the default five-minute TTL.
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(store, clock, DEFAULT_REGISTRY_TTL)
    }

    /// Build a registry with an explicit TTL.
    pub fn with_ttl(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            snapshot: RwLock::new(None),
            refresh_gate: AsyncMutex::new(()),
        }
    }

    /// Resolve `prefix` for `tenant_code`, refreshing first when stale.
    ///
    /// Returns `Ok(None)` for unknown prefixes or tenants and `Err` only
    /// when a required refresh fails.
    pub async fn resolve(
        &self,
        prefix: &str,
        tenant_code: Option<&str>,
    ) -> Result<Option<TableId>, TableRegistryError> {
        let mapping = self.fresh_mapping().await?;
        let resolved = mapping.lookup(prefix, tenant_code);
        if resolved.is_none() {
            debug!(prefix, tenant = tenant_code.unwrap_or(GLOBAL_TENANT_KEY), "table not found");
        }
        Ok(resolved)
    }

    /// Resolve a [`TableKind`]. Global kinds ignore `tenant_code`.
    pub async fn resolve_kind(
        &self,
        kind: TableKind,
        tenant_code: &str,
    ) -> Result<Option<TableId>, TableRegistryError> {
        let tenant = kind.is_tenant_scoped().then_some(tenant_code);
        self.resolve(kind.prefix(), tenant).await
    }

    /// Rebuild the mapping now, regardless of TTL.
    pub async fn refresh(&self) -> Result<Arc<TableMapping>, TableRegistryError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// The cached mapping, without refreshing.
    pub fn cached_mapping(&self) -> Option<Arc<TableMapping>> {
        self.read_snapshot()
            .as_ref()
            .map(|snapshot| Arc::clone(&snapshot.mapping))
    }

    /// Time since the last successful refresh, if there was one.
    pub fn snapshot_age(&self) -> Option<TimeDelta> {
        let now = self.clock.utc();
        self.read_snapshot()
            .as_ref()
            .map(|snapshot| now - snapshot.refreshed_at)
    }

    /// Whether the next resolution will call the store.
    pub fn is_stale(&self) -> bool {
        self.fresh_snapshot(self.clock.utc()).is_none()
    }

    async fn fresh_mapping(&self) -> Result<Arc<TableMapping>, TableRegistryError> {
        if let Some(mapping) = self.fresh_snapshot(self.clock.utc()) {
            return Ok(mapping);
        }

        let _gate = self.refresh_gate.lock().await;
        // Another caller may have refreshed while this one waited.
        if let Some(mapping) = self.fresh_snapshot(self.clock.utc()) {
            return Ok(mapping);
        }
        self.refresh_locked().await
    }

    /// Callers must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Result<Arc<TableMapping>, TableRegistryError> {
        let started_at = self.clock.utc();
        let tables = self.store.list_tables().await.map_err(|source| {
            warn!(error = %source, "table registry refresh failed; keeping previous snapshot");
            TableRegistryError::Refresh { source }
        })?;

        let mapping = Arc::new(TableMapping::from_tables(&tables));
        info!(
            tables = tables.len(),
            prefixes = mapping.prefix_count(),
            entries = mapping.entry_count(),
            "table registry refreshed"
        );
        *self.write_snapshot() = Some(RegistrySnapshot {
            mapping: Arc::clone(&mapping),
            refreshed_at: started_at,
        });
        Ok(mapping)
    }

    fn fresh_snapshot(&self, now: DateTime<Utc>) -> Option<Arc<TableMapping>> {
        self.read_snapshot()
            .as_ref()
            .filter(|snapshot| now - snapshot.refreshed_at < self.ttl)
            .map(|snapshot| Arc::clone(&snapshot.mapping))
    }

    // Snapshots are replaced whole, so a poisoned lock still guards a
    // consistent value.
    fn read_snapshot(&self) -> RwLockReadGuard<'_, Option<RegistrySnapshot>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_snapshot(&self) -> RwLockWriteGuard<'_, Option<RegistrySnapshot>> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}
