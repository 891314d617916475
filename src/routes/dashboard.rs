//! Dashboard routes: current snapshot and manual refresh.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{ApiResponse, AppError};
use crate::models::dashboard::{DashboardState, DashboardStats};
use crate::services::dashboard::{RefreshLeg, RefreshOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub is_loading: bool,
    pub stats: DashboardStats,
    pub recent_posts: Vec<PostView>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardView {
    fn new(state: DashboardState, image_base_url: &str) -> Self {
        Self {
            is_loading: state.is_loading,
            recent_posts: state
                .recent_posts
                .into_iter()
                .map(|post| PostView {
                    image_url: post.image_url(image_base_url),
                    id: post.id,
                    title: post.title,
                    published_at: post.published_at,
                })
                .collect(),
            stats: state.stats,
            refreshed_at: state.refreshed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshSummary {
    pub failed: Vec<RefreshLeg>,
    pub dashboard: DashboardView,
}

/// GET /api/v1/dashboard
pub async fn show(State(state): State<AppState>) -> Json<ApiResponse<DashboardView>> {
    let view = DashboardView::new(state.dashboard.state(), &state.config.image_base_url);
    ApiResponse::success(view)
}

/// POST /api/v1/dashboard/refresh
pub async fn refresh(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RefreshSummary>>, AppError> {
    let failed = match state.dashboard.refresh().await {
        RefreshOutcome::Committed => Vec::new(),
        RefreshOutcome::PartialFailure(failures) => {
            failures.into_iter().map(|(leg, _)| leg).collect()
        }
        RefreshOutcome::Discarded => {
            return Err(AppError::Conflict("Dashboard is not active".to_string()))
        }
    };

    Ok(ApiResponse::success(RefreshSummary {
        failed,
        dashboard: DashboardView::new(state.dashboard.state(), &state.config.image_base_url),
    }))
}
