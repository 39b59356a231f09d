//! Shared test doubles for registry, KPI and records tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use tokio::sync::{Notify, mpsc};

use crate::domain::ports::{RemoteStore, RemoteStoreError, RemoteTable, RowFilters};
use crate::domain::{Row, RowFields, RowId, TableId};

/// The instant most tests treat as "now".
pub fn fixed_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 10, 15, 14, 30, 0).single() {
        Some(now) => now,
        None => panic!("fixed test instant must be valid"),
    }
}

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

pub fn table(id: i64, name: &str) -> RemoteTable {
    RemoteTable {
        id: TableId::new(id),
        name: name.to_owned(),
        database_id: 1,
    }
}

type ListTablesResult = Result<Vec<RemoteTable>, RemoteStoreError>;

#[derive(Clone)]
struct Gate {
    entered: mpsc::UnboundedSender<usize>,
    release: Arc<Notify>,
}

/// In-memory store with scripted table listings and per-table rows.
///
/// Table listings are consumed in order; once the script is exhausted the
/// last successful listing repeats. Row writes are recorded for assertions.
#[derive(Default)]
pub struct ScriptedStore {
    listings: Mutex<VecDeque<ListTablesResult>>,
    last_listing: Mutex<Vec<RemoteTable>>,
    rows: Mutex<Vec<(TableId, Row)>>,
    failing_tables: Mutex<Vec<(TableId, u16)>>,
    created: Mutex<Vec<(TableId, RowFields)>>,
    updated: Mutex<Vec<(TableId, RowId, RowFields)>>,
    list_table_calls: AtomicUsize,
    list_row_calls: AtomicUsize,
    gate: Mutex<Option<Gate>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("scripted store mutex"),
    }
}

impl ScriptedStore {
    pub fn with_tables(tables: Vec<RemoteTable>) -> Self {
        let store = Self::default();
        store.push_listing(Ok(tables));
        store
    }

    pub fn push_listing(&self, listing: ListTablesResult) {
        lock(&self.listings).push_back(listing);
    }

    pub fn add_row(&self, table_id: i64, row: Row) {
        lock(&self.rows).push((TableId::new(table_id), row));
    }

    pub fn fail_rows_for(&self, table_id: i64) {
        self.fail_rows_with(table_id, 500);
    }

    /// Answer every row call on `table_id` with `status`.
    pub fn fail_rows_with(&self, table_id: i64, status: u16) {
        lock(&self.failing_tables).push((TableId::new(table_id), status));
    }

    fn scripted_failure(&self, table_id: TableId) -> Result<(), RemoteStoreError> {
        let failing = lock(&self.failing_tables);
        match failing.iter().find(|(id, _)| *id == table_id) {
            Some((_, status)) => Err(RemoteStoreError::status(*status, "scripted row failure")),
            None => Ok(()),
        }
    }

    pub fn list_table_calls(&self) -> usize {
        self.list_table_calls.load(Ordering::SeqCst)
    }

    pub fn list_row_calls(&self) -> usize {
        self.list_row_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<(TableId, RowFields)> {
        lock(&self.created).clone()
    }

    pub fn updated(&self) -> Vec<(TableId, RowId, RowFields)> {
        lock(&self.updated).clone()
    }

    /// Make the next table listings block until released.
    pub fn enable_blocking(&self) -> (mpsc::UnboundedReceiver<usize>, Arc<Notify>) {
        let (entered, entered_rx) = mpsc::unbounded_channel();
        let release = Arc::new(Notify::new());
        *lock(&self.gate) = Some(Gate {
            entered,
            release: Arc::clone(&release),
        });
        (entered_rx, release)
    }

    fn rows_for(&self, table_id: TableId) -> Result<Vec<Row>, RemoteStoreError> {
        self.scripted_failure(table_id)?;
        Ok(lock(&self.rows)
            .iter()
            .filter(|(id, _)| *id == table_id)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn list_tables(&self) -> Result<Vec<RemoteTable>, RemoteStoreError> {
        let call = self.list_table_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            if gate.entered.send(call).is_err() {
                panic!("blocking listener dropped");
            }
            gate.release.notified().await;
        }

        let next = lock(&self.listings).pop_front();
        match next {
            Some(Ok(tables)) => {
                lock(&self.last_listing).clone_from(&tables);
                Ok(tables)
            }
            Some(Err(error)) => Err(error),
            None => Ok(lock(&self.last_listing).clone()),
        }
    }

    async fn list_rows(
        &self,
        table_id: TableId,
        _filters: &RowFilters,
    ) -> Result<Vec<Row>, RemoteStoreError> {
        self.list_row_calls.fetch_add(1, Ordering::SeqCst);
        self.rows_for(table_id)
    }

    async fn create_row(
        &self,
        table_id: TableId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError> {
        self.scripted_failure(table_id)?;
        lock(&self.created).push((table_id, fields.clone()));
        let mut row = Row::from(fields.clone());
        row.insert("id", 1_i64);
        Ok(row)
    }

    async fn update_row(
        &self,
        table_id: TableId,
        row_id: RowId,
        fields: &RowFields,
    ) -> Result<Row, RemoteStoreError> {
        lock(&self.updated).push((table_id, row_id, fields.clone()));
        let mut row = Row::from(fields.clone());
        row.insert("id", row_id.get());
        Ok(row)
    }

    async fn get_row(&self, table_id: TableId, row_id: RowId) -> Result<Row, RemoteStoreError> {
        self.rows_for(table_id)?
            .into_iter()
            .find(|row| row.id() == Some(row_id))
            .ok_or_else(|| RemoteStoreError::status(404_u16, "row not found"))
    }
}
