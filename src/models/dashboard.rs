//! Display-ready dashboard state: the three stat cards and the recent posts feed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::errors::ServiceError;
use crate::models::record::Record;

/// Maximum number of posts in the recent feed.
pub const RECENT_POSTS_LIMIT: usize = 5;

/// Value shown on a stat card.
///
/// `Pending` serializes as `null`, so a loading card never reads as a real zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Pending,
    Count(i64),
}

impl StatValue {
    /// A missing count from the service displays as zero.
    pub fn from_count(count: Option<i64>) -> Self {
        Self::Count(count.unwrap_or(0))
    }

    pub fn count(&self) -> Option<i64> {
        match self {
            Self::Pending => None,
            Self::Count(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub label: &'static str,
    pub value: StatValue,
    pub caption: &'static str,
}

/// The three stat cards, always in posts / users / recent activity order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DashboardStats([StatEntry; 3]);

impl DashboardStats {
    /// All three cards showing the loading placeholder.
    pub fn pending() -> Self {
        Self::with_values(StatValue::Pending, StatValue::Pending, StatValue::Pending)
    }

    pub fn with_values(posts: StatValue, users: StatValue, recent_activity: StatValue) -> Self {
        Self([
            StatEntry {
                label: "Total Blog Posts",
                value: posts,
                caption: "All Time",
            },
            StatEntry {
                label: "Total Visitors",
                value: users,
                caption: "Registered Users",
            },
            StatEntry {
                label: "Recent Activity",
                value: recent_activity,
                caption: "Last 7 Days",
            },
        ])
    }

    pub fn entries(&self) -> &[StatEntry; 3] {
        &self.0
    }

    pub fn posts(&self) -> StatValue {
        self.0[0].value
    }

    pub fn users(&self) -> StatValue {
        self.0[1].value
    }

    pub fn recent_activity(&self) -> StatValue {
        self.0[2].value
    }

    pub fn values(&self) -> [StatValue; 3] {
        [self.posts(), self.users(), self.recent_activity()]
    }
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self::pending()
    }
}

/// Post shown in the recent feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPost {
    pub id: String,
    pub title: String,
    pub image_ref: String,
    pub published_at: DateTime<Utc>,
}

impl RecentPost {
    /// Decode a post row, reading the publish time from `order_field`.
    pub fn from_record(record: &Record, order_field: &str) -> Result<Self, ServiceError> {
        let id = match record.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(ServiceError::Decode("post is missing an id".to_string())),
        };

        let text = |field: &str| {
            record
                .get(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let published_at = record
            .get(order_field)
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                ServiceError::Decode(format!("post {id} has no readable {order_field}"))
            })?;

        Ok(Self {
            title: text("title"),
            image_ref: text("image_url"),
            id,
            published_at,
        })
    }

    /// Public URL of the post image under the storage bucket prefix.
    pub fn image_url(&self, base_url: &str) -> String {
        if base_url.is_empty() {
            return self.image_ref.clone();
        }
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.image_ref.trim_start_matches('/')
        )
    }
}

/// Accepts RFC 3339, naive `timestamp` renderings and bare dates (midnight UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Order newest first and cap at [`RECENT_POSTS_LIMIT`].
pub fn normalize_recent(mut posts: Vec<RecentPost>) -> Vec<RecentPost> {
    posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    posts.truncate(RECENT_POSTS_LIMIT);
    posts
}

/// Snapshot of everything the dashboard view renders.
///
/// Replaced as a whole on every commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    pub is_loading: bool,
    pub stats: DashboardStats,
    pub recent_posts: Vec<RecentPost>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            is_loading: true,
            stats: DashboardStats::pending(),
            recent_posts: Vec::new(),
            refreshed_at: None,
        }
    }
}
