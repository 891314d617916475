//! Port to the remote data store: row queries, counts and change subscriptions.
//!
//! The login gate and the dashboard receive an implementation explicitly, so
//! a test double can stand in for the real store.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::record::{ChangeEvent, Filter, Record};

/// Identifier of a live change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Ownership token for a live change channel.
///
/// Not `Clone`: handing it to
/// [`RemoteDataService::unsubscribe`] consumes it, so a handle is released
/// at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    table: String,
}

impl SubscriptionHandle {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            id: SubscriptionId::new(),
            table: table.into(),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// A freshly opened subscription: the handle plus the event stream it owns.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Rows of `table` matching every filter exactly.
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, ServiceError>;

    /// Total row count of `table`; `None` when the store reports no count.
    async fn count(&self, table: &str) -> Result<Option<i64>, ServiceError>;

    /// At most `limit` rows of `table` ordered by `order_field`.
    async fn query_ordered(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Record>, ServiceError>;

    /// Open a change channel for `table`.
    async fn subscribe(&self, table: &str) -> Result<Subscription, ServiceError>;

    /// Release a subscription; its event stream ends.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Cheap reachability probe for readiness checks.
    async fn ping(&self) -> Result<(), ServiceError>;
}
