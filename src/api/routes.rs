//! Read-only route handlers (spec §6 control surface, Non-goal: no
//! mutating endpoints — the API cannot enqueue, cancel, or otherwise
//! mutate a Download/Account; only the claim protocol does).

use super::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DownloadView {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: crate::types::DownloadStatus,
    pub retries: i64,
}

impl From<crate::store::DownloadRow> for DownloadView {
    fn from(row: crate::store::DownloadRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            name: row.name,
            status: crate::types::DownloadStatus::from_i32(row.status),
            retries: row.retries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: String,
    pub priority: i64,
    pub status: crate::types::AccountStatus,
    pub download_id: Option<i64>,
}

impl From<crate::store::AccountRow> for AccountView {
    fn from(row: crate::store::AccountRow) -> Self {
        Self {
            id: row.id,
            priority: row.priority,
            status: crate::types::AccountStatus::from_i32(row.status),
            download_id: row.download_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub worker_id: String,
    pub status: &'static str,
}

/// `GET /downloads` — every Download row, for operational visibility.
pub async fn list_downloads(
    State(state): State<AppState>,
) -> Result<Json<Vec<DownloadView>>, crate::Error> {
    let rows = state.store.list_downloads().await?;
    Ok(Json(rows.into_iter().map(DownloadView::from).collect()))
}

/// `GET /accounts` — every Account row, for operational visibility.
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountView>>, crate::Error> {
    let rows = state.store.list_accounts().await?;
    Ok(Json(rows.into_iter().map(AccountView::from).collect()))
}

/// `GET /health` — liveness probe; always 200 if the process can answer.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        worker_id: state.worker_id.to_string(),
        status: "ok",
    })
}
