//! Postgres-backed data service.
//!
//! Rows come back as JSON objects via `to_jsonb`. Change notifications ride
//! on `LISTEN/NOTIFY`: the trigger installed by the migrations publishes
//! `{"table": ..., "op": ...}` on the change channel, and each subscription
//! owns a listener task forwarding events for its table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::ServiceError;
use crate::models::record::{ChangeEvent, ChangeKind, Filter, Record};
use crate::services::remote::{
    RemoteDataService, Subscription, SubscriptionHandle, SubscriptionId,
};

/// Pause before retrying after the notification connection fails.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern compiles")
    })
}

/// Validate a table or column name and return it double-quoted.
pub fn quote_identifier(name: &str) -> Result<String, ServiceError> {
    if identifier_pattern().is_match(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(ServiceError::InvalidIdentifier(name.to_string()))
    }
}

fn select_matching_sql(table: &str, filters: &[Filter]) -> Result<String, ServiceError> {
    let mut sql = format!("SELECT to_jsonb(t) FROM {} t", quote_identifier(table)?);
    for (i, filter) in filters.iter().enumerate() {
        let keyword = if i == 0 { "WHERE" } else { "AND" };
        sql.push_str(&format!(
            " {keyword} t.{}::text = ${}",
            quote_identifier(&filter.column)?,
            i + 1
        ));
    }
    Ok(sql)
}

fn select_ordered_sql(table: &str, order_field: &str, descending: bool) -> Result<String, ServiceError> {
    let direction = if descending { "DESC" } else { "ASC" };
    Ok(format!(
        "SELECT to_jsonb(t) FROM {} t ORDER BY t.{} {direction} NULLS LAST LIMIT $1",
        quote_identifier(table)?,
        quote_identifier(order_field)?,
    ))
}

fn into_record(value: serde_json::Value) -> Result<Record, ServiceError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ServiceError::Decode(format!("expected a row object, got {other}"))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PgDataService {
    pool: PgPool,
    channel: String,
    listeners: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl PgDataService {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl Drop for PgDataService {
    fn drop(&mut self) {
        for (_, task) in lock(&self.listeners).drain() {
            task.abort();
        }
    }
}

/// Decode a notification payload, keeping only events for `table`.
fn event_for(payload: &str, table: &str) -> Option<ChangeEvent> {
    match serde_json::from_str::<ChangeEvent>(payload) {
        Ok(event) if event.table == table => Some(event),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable change payload");
            None
        }
    }
}

/// Forward notifications for `table` until the subscriber goes away.
///
/// `PgListener` reconnects and re-issues `LISTEN` on its own. After any
/// outage a `Resync` event is forwarded so the subscriber can catch up on
/// changes it did not hear about.
async fn forward(mut listener: PgListener, table: String, tx: mpsc::UnboundedSender<ChangeEvent>) {
    while !tx.is_closed() {
        let event = match listener.try_recv().await {
            Ok(Some(notification)) => match event_for(notification.payload(), &table) {
                Some(event) => event,
                None => continue,
            },
            Ok(None) => {
                tracing::warn!(table = %table, "Change listener reconnected");
                ChangeEvent::new(table.as_str(), ChangeKind::Resync)
            }
            Err(sqlx::Error::PoolClosed) => break,
            Err(e) => {
                tracing::warn!(error = %e, table = %table, "Change listener disconnected");
                tokio::time::sleep(RECONNECT_BACKOFF).await;
                ChangeEvent::new(table.as_str(), ChangeKind::Resync)
            }
        };

        if tx.send(event).is_err() {
            break;
        }
    }
    tracing::debug!(table = %table, "Change forwarder stopped");
}

#[async_trait]
impl RemoteDataService for PgDataService {
    async fn query(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, ServiceError> {
        let sql = select_matching_sql(table, filters)?;
        let mut query = sqlx::query_scalar::<_, serde_json::Value>(&sql);
        for filter in filters {
            query = query.bind(filter.value.as_str());
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn count(&self, table: &str) -> Result<Option<i64>, ServiceError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?);
        let count = sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn query_ordered(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Record>, ServiceError> {
        let sql = select_ordered_sql(table, order_field, descending)?;
        sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn subscribe(&self, table: &str) -> Result<Subscription, ServiceError> {
        quote_identifier(table)?;
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;

        let (tx, events) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new(table);
        let task = tokio::spawn(forward(listener, table.to_string(), tx));
        lock(&self.listeners).insert(handle.id(), task);

        tracing::debug!(subscription = %handle.id(), table = %table, channel = %self.channel, "Listening for changes");
        Ok(Subscription { handle, events })
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Some(task) = lock(&self.listeners).remove(&handle.id()) {
            task.abort();
        }
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
