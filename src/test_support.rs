//! Test doubles shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use crate::errors::ServiceError;
use crate::models::record::{Filter, Record};
use crate::services::memory::MemoryDataService;
use crate::services::remote::{RemoteDataService, Subscription, SubscriptionHandle};

/// Wraps the in-memory store and holds every read until the gate opens.
pub struct GatedService {
    pub inner: Arc<MemoryDataService>,
    gate: watch::Sender<bool>,
    entered: AtomicUsize,
}

impl GatedService {
    /// Starts closed.
    pub fn new(inner: Arc<MemoryDataService>) -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner,
            gate,
            entered: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }

    pub fn close(&self) {
        self.gate.send_replace(false);
    }

    /// Reads that have reached the gate, whether held or released.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

#[async_trait]
impl RemoteDataService for GatedService {
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, ServiceError> {
        self.pass().await;
        self.inner.query(table, filters).await
    }

    async fn count(&self, table: &str) -> Result<Option<i64>, ServiceError> {
        self.pass().await;
        self.inner.count(table).await
    }

    async fn query_ordered(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Record>, ServiceError> {
        self.pass().await;
        self.inner
            .query_ordered(table, order_field, descending, limit)
            .await
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, ServiceError> {
        self.inner.subscribe(table).await
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.unsubscribe(handle)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.inner.ping().await
    }
}

/// Wraps the in-memory store and, once holding, parks each recent-posts read
/// until it is released by call index. Counts pass straight through, and a
/// parked read keeps the rows it saw when it was issued.
pub struct ListGate {
    pub inner: Arc<MemoryDataService>,
    holding: AtomicBool,
    held: Mutex<Vec<Option<oneshot::Sender<()>>>>,
}

impl ListGate {
    pub fn new(inner: Arc<MemoryDataService>) -> Self {
        Self {
            inner,
            holding: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Park every recent-posts read from now on.
    pub fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Let the `call`-th parked read (zero-based) return.
    pub fn release(&self, call: usize) {
        let sender = self.held.lock().unwrap().get_mut(call).and_then(Option::take);
        if let Some(tx) = sender {
            let _ = tx.send(());
        }
    }

    /// Reads parked so far, released or not.
    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteDataService for ListGate {
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, ServiceError> {
        self.inner.query(table, filters).await
    }

    async fn count(&self, table: &str) -> Result<Option<i64>, ServiceError> {
        self.inner.count(table).await
    }

    async fn query_ordered(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Record>, ServiceError> {
        let rows = self
            .inner
            .query_ordered(table, order_field, descending, limit)
            .await;
        if self.holding.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            self.held.lock().unwrap().push(Some(tx));
            let _ = rx.await;
        }
        rows
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, ServiceError> {
        self.inner.subscribe(table).await
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner.unsubscribe(handle)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.inner.ping().await
    }
}
