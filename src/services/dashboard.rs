//! Live dashboard: composite read of the stat cards and recent posts, kept
//! fresh by a change subscription on the users table.
//!
//! State is published as a whole [`DashboardState`] through a watch channel.
//! Every commit checks the `active` flag under the channel's write lock, so
//! once [`DashboardController::deactivate`] returns no refresh, in flight or
//! later, can change what observers see.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::TableNames;
use crate::errors::{DashboardError, ServiceError};
use crate::models::dashboard::{
    normalize_recent, DashboardState, DashboardStats, RecentPost, StatValue, RECENT_POSTS_LIMIT,
};
use crate::models::record::ChangeEvent;
use crate::services::remote::{
    RemoteDataService, Subscription, SubscriptionHandle, SubscriptionId,
};

/// One of the three reads making up a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshLeg {
    PostsCount,
    UsersCount,
    RecentPosts,
}

/// What a refresh did to the published state.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// All three reads succeeded and were committed.
    Committed,
    /// Committed with defaults substituted for the failed reads.
    PartialFailure(Vec<(RefreshLeg, ServiceError)>),
    /// The dashboard was inactive; nothing was committed.
    Discarded,
}

struct ActiveSubscription {
    handle: SubscriptionHandle,
    listener: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Active(Option<ActiveSubscription>),
    Deactivated,
}

struct Shared {
    service: Arc<dyn RemoteDataService>,
    tables: TableNames,
    state: watch::Sender<DashboardState>,
    active: AtomicBool,
}

impl Shared {
    /// Apply `update` unless the dashboard is inactive.
    fn commit(&self, update: impl FnOnce(&mut DashboardState)) -> bool {
        self.state.send_if_modified(|state| {
            if !self.active.load(Ordering::Acquire) {
                return false;
            }
            update(state);
            true
        })
    }

    async fn refresh(&self) -> RefreshOutcome {
        let started = self.commit(|state| {
            state.is_loading = true;
            state.stats = DashboardStats::pending();
        });
        if !started {
            tracing::debug!("Dashboard inactive, skipping refresh");
            return RefreshOutcome::Discarded;
        }

        let tables = &self.tables;
        let (posts, users, recent) = tokio::join!(
            self.service.count(&tables.posts),
            self.service.count(&tables.users),
            self.service.query_ordered(
                &tables.posts,
                &tables.posts_order_field,
                true,
                RECENT_POSTS_LIMIT,
            ),
        );

        let mut failures: Vec<(RefreshLeg, ServiceError)> = Vec::new();
        let mut count_or_zero = |leg: RefreshLeg,
                                 table: &str,
                                 count: Result<Option<i64>, ServiceError>| match count {
            Ok(count) => StatValue::from_count(count),
            Err(e) => {
                tracing::error!(error = %e, table = %table, leg = ?leg, "Dashboard count failed");
                failures.push((leg, e));
                StatValue::Count(0)
            }
        };
        let posts = count_or_zero(RefreshLeg::PostsCount, &tables.posts, posts);
        let users = count_or_zero(RefreshLeg::UsersCount, &tables.users, users);

        let recent = match recent {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| match RecentPost::from_record(row, &tables.posts_order_field) {
                    Ok(post) => Some(post),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable post");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, table = %tables.posts, "Recent posts query failed");
                failures.push((RefreshLeg::RecentPosts, e));
                Vec::new()
            }
        };
        let recent = normalize_recent(recent);
        let activity = StatValue::Count(recent.len() as i64);

        let committed = self.commit(move |state| {
            *state = DashboardState {
                is_loading: false,
                stats: DashboardStats::with_values(posts, users, activity),
                recent_posts: recent,
                refreshed_at: Some(Utc::now()),
            };
        });

        if !committed {
            tracing::debug!("Dashboard deactivated mid-refresh, discarding results");
            RefreshOutcome::Discarded
        } else if failures.is_empty() {
            RefreshOutcome::Committed
        } else {
            RefreshOutcome::PartialFailure(failures)
        }
    }
}

/// Runs one refresh per change notification until the stream ends or the
/// dashboard goes inactive.
async fn listen(shared: Arc<Shared>, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
    while let Some(event) = events.recv().await {
        if !shared.active.load(Ordering::Acquire) {
            break;
        }
        tracing::debug!(table = %event.table, kind = ?event.kind, "Change notification, refreshing dashboard");
        shared.refresh().await;
    }
    tracing::debug!("Dashboard change listener stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the dashboard state and its change subscription.
///
/// Single-use lifecycle: `Idle -> Active -> Deactivated`. Dropping an active
/// controller deactivates it.
pub struct DashboardController {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl DashboardController {
    pub fn new(service: Arc<dyn RemoteDataService>, tables: TableNames) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            shared: Arc::new(Shared {
                service,
                tables,
                state,
                active: AtomicBool::new(false),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn state(&self) -> DashboardState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every committed snapshot.
    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.shared.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading
    }

    pub fn stats(&self) -> DashboardStats {
        self.shared.state.borrow().stats.clone()
    }

    pub fn recent_posts(&self) -> Vec<RecentPost> {
        self.shared.state.borrow().recent_posts.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Id of the live change subscription, if one is held.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match &*lock(&self.lifecycle) {
            Lifecycle::Active(Some(sub)) => Some(sub.handle.id()),
            _ => None,
        }
    }

    /// Load the dashboard, then subscribe to changes on the users table.
    ///
    /// A failed subscription is logged; the dashboard stays usable with
    /// manual refreshes.
    pub async fn activate(&self) -> Result<RefreshOutcome, DashboardError> {
        {
            let mut lifecycle = lock(&self.lifecycle);
            match *lifecycle {
                Lifecycle::Idle => *lifecycle = Lifecycle::Active(None),
                Lifecycle::Active(_) => return Err(DashboardError::AlreadyActive),
                Lifecycle::Deactivated => return Err(DashboardError::Deactivated),
            }
            self.shared.active.store(true, Ordering::Release);
        }
        tracing::info!("Dashboard activated");

        let outcome = self.shared.refresh().await;

        let users = &self.shared.tables.users;
        match self.shared.service.subscribe(users).await {
            Ok(Subscription { handle, events }) => {
                let mut lifecycle = lock(&self.lifecycle);
                if let Lifecycle::Active(slot) = &mut *lifecycle {
                    tracing::info!(subscription = %handle.id(), table = %users, "Subscribed to changes");
                    let listener = tokio::spawn(listen(Arc::clone(&self.shared), events));
                    *slot = Some(ActiveSubscription { handle, listener });
                } else {
                    drop(lifecycle);
                    tracing::debug!("Dashboard deactivated while subscribing, releasing handle");
                    self.shared.service.unsubscribe(handle);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, table = %users, "Change subscription failed");
            }
        }

        Ok(outcome)
    }

    /// Run one composite read now.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.shared.refresh().await
    }

    /// Stop committing state and release the subscription.
    ///
    /// Idempotent; the handle is released on the first call only.
    pub fn deactivate(&self) {
        let previous = std::mem::replace(&mut *lock(&self.lifecycle), Lifecycle::Deactivated);
        let Lifecycle::Active(subscription) = previous else {
            return;
        };

        // Taking the state lock orders this against any commit in progress.
        self.shared.state.send_if_modified(|_| {
            self.shared.active.store(false, Ordering::Release);
            false
        });

        if let Some(ActiveSubscription { handle, listener }) = subscription {
            listener.abort();
            tracing::info!(
                subscription = %handle.id(),
                table = %handle.table(),
                "Releasing change subscription"
            );
            self.shared.service.unsubscribe(handle);
        }
        tracing::info!("Dashboard deactivated");
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        self.deactivate();
    }
}
