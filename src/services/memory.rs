//! In-memory data service used for development and as a test double.
//!
//! Supports failure injection per table and pinned or null counts, and counts every call
//! so tests can assert how many round trips an operation made.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::ServiceError;
use crate::models::record::{ChangeEvent, ChangeKind, Filter, Record};
use crate::services::remote::{
    RemoteDataService, Subscription, SubscriptionHandle, SubscriptionId,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Number of calls made to each operation so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub query: usize,
    pub count: usize,
    pub query_ordered: usize,
    pub subscribe: usize,
    pub unsubscribe: usize,
}

impl CallCounts {
    /// Composite dashboard reads issued, judged by the recent-posts leg.
    pub fn refreshes(&self) -> usize {
        self.query_ordered
    }
}

#[derive(Debug, Default)]
struct Counters {
    query: AtomicUsize,
    count: AtomicUsize,
    query_ordered: AtomicUsize,
    subscribe: AtomicUsize,
    unsubscribe: AtomicUsize,
}

#[derive(Debug)]
struct Subscriber {
    table: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Debug, Default)]
pub struct MemoryDataService {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    failing: Mutex<HashSet<String>>,
    count_overrides: Mutex<HashMap<String, Option<i64>>>,
    unreachable: AtomicBool,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    counters: Counters,
}

impl MemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with rows without emitting change events.
    pub fn with_rows(self, table: &str, rows: impl IntoIterator<Item = Value>) -> Self {
        {
            let mut tables = lock(&self.tables);
            let entry = tables.entry(table.to_string()).or_default();
            entry.extend(rows.into_iter().filter_map(|v| v.as_object().cloned()));
        }
        self
    }

    /// Append a row and notify subscribers of `table`.
    pub fn insert(&self, table: &str, row: Value) {
        if let Some(record) = row.as_object().cloned() {
            lock(&self.tables)
                .entry(table.to_string())
                .or_default()
                .push(record);
        }
        self.notify(table, ChangeKind::Insert);
    }

    /// Remove rows matching `filter` and notify subscribers of `table`.
    pub fn delete_where(&self, table: &str, filter: &Filter) -> usize {
        let removed = {
            let mut tables = lock(&self.tables);
            let rows = tables.entry(table.to_string()).or_default();
            let before = rows.len();
            rows.retain(|r| !filter.matches(r));
            before - rows.len()
        };
        self.notify(table, ChangeKind::Delete);
        removed
    }

    /// Deliver a change event to every live subscriber of `table`.
    pub fn notify(&self, table: &str, kind: ChangeKind) {
        let subscribers = lock(&self.subscribers);
        for subscriber in subscribers.values().filter(|s| s.table == table) {
            // Receiver may already be gone; the entry is removed on unsubscribe.
            let _ = subscriber.tx.send(ChangeEvent::new(table, kind));
        }
    }

    /// Make every operation fail as if the store were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make reads of one table fail.
    pub fn fail_table(&self, table: &str) {
        lock(&self.failing).insert(table.to_string());
    }

    /// Report `count` for `table` regardless of its rows; `None` reports a null count.
    pub fn override_count(&self, table: &str, count: Option<i64>) {
        lock(&self.count_overrides).insert(table.to_string(), count);
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            query: c.query.load(Ordering::SeqCst),
            count: c.count.load(Ordering::SeqCst),
            query_ordered: c.query_ordered.load(Ordering::SeqCst),
            subscribe: c.subscribe.load(Ordering::SeqCst),
            unsubscribe: c.unsubscribe.load(Ordering::SeqCst),
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscribers).len()
    }

    fn check(&self, table: &str) -> Result<(), ServiceError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("memory store offline".to_string()));
        }
        if lock(&self.failing).contains(table) {
            return Err(ServiceError::Query(format!("reads of {table} are failing")));
        }
        Ok(())
    }

    fn rows(&self, table: &str) -> Vec<Record> {
        lock(&self.tables).get(table).cloned().unwrap_or_default()
    }
}

/// Orders JSON values the way the store orders columns; missing values sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => CmpOrdering::Equal,
        (None | Some(Value::Null), _) => CmpOrdering::Greater,
        (_, None | Some(Value::Null)) => CmpOrdering::Less,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RemoteDataService for MemoryDataService {
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, ServiceError> {
        self.counters.query.fetch_add(1, Ordering::SeqCst);
        self.check(table)?;
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|r| filters.iter().all(|f| f.matches(r)))
            .collect())
    }

    async fn count(&self, table: &str) -> Result<Option<i64>, ServiceError> {
        self.counters.count.fetch_add(1, Ordering::SeqCst);
        self.check(table)?;
        if let Some(count) = lock(&self.count_overrides).get(table) {
            return Ok(*count);
        }
        Ok(Some(self.rows(table).len() as i64))
    }

    async fn query_ordered(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Record>, ServiceError> {
        self.counters.query_ordered.fetch_add(1, Ordering::SeqCst);
        self.check(table)?;
        let mut rows = self.rows(table);
        rows.sort_by(|a, b| {
            let (a, b) = (a.get(order_field), b.get(order_field));
            let missing = |v: Option<&Value>| matches!(v, None | Some(Value::Null));
            match (descending, missing(a), missing(b)) {
                (true, false, false) => compare_values(b, a),
                _ => compare_values(a, b),
            }
        });
        rows.truncate(limit);
        Ok(rows)
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, ServiceError> {
        self.counters.subscribe.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("memory store offline".to_string()));
        }
        let (tx, events) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new(table);
        lock(&self.subscribers).insert(
            handle.id(),
            Subscriber {
                table: table.to_string(),
                tx,
            },
        );
        Ok(Subscription { handle, events })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.counters.unsubscribe.fetch_add(1, Ordering::SeqCst);
        lock(&self.subscribers).remove(&handle.id());
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}
