//! Request handlers.
//!
//! Each handler decodes one request, calls exactly one [`BehaviorStore`]
//! operation and encodes the result. Paths, field names and response shapes
//! are fixed by the game client.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use bhv_core::store::StoreStats;
use bhv_core::{Behavior, BehaviorData, BehaviorStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Store handle shared by every handler.
pub type SharedStore = Arc<BehaviorStore>;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// All routes, without middleware.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/upload", post(upload))
        .route("/update_behavior", post(update_behavior))
        .route("/get_all", get(get_all))
        .route("/mark_used", post(mark_used))
        .route("/reset_unused_generations", post(reset_unused_generations))
        .route("/get_behavior_count", get(get_behavior_count))
        .route("/get_profiles", get(get_profiles))
        .route("/clone_profile", post(clone_profile))
        .route("/delete_profile", post(delete_profile))
        .route("/delete_behavior", post(delete_behavior))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .with_state(store)
}

/// Run a store operation on the blocking pool.
///
/// Every handler goes through here, reads included. In immediate flush mode a
/// writer holds the store lock across the snapshot fsync.
async fn blocking<T, F>(store: &SharedStore, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&BehaviorStore) -> T + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(format!("Store task panicked: {e}")))
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `/upload` and `/update_behavior`.
#[derive(Debug, Deserialize)]
pub struct BehaviorRequest {
    /// Target profile.
    pub profile: Option<String>,
    /// Behavior id.
    pub id: Option<String>,
    /// Tuning fields.
    #[serde(flatten)]
    pub data: BehaviorData,
}

/// Body of `/mark_used`.
#[derive(Debug, Deserialize)]
pub struct MarkUsedRequest {
    /// Profile to sweep.
    pub profile: Option<String>,
    /// Ids used during the last generation.
    pub used_ids: Option<Vec<String>>,
}

/// Body of `/reset_unused_generations`.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Profile holding the behaviors.
    pub profile: Option<String>,
    /// Ids whose counters should restart.
    pub parent_ids: Option<Vec<String>>,
}

/// Body of `/clone_profile`.
#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    /// Profile to copy.
    pub source: Option<String>,
    /// Name of the new profile.
    pub target: Option<String>,
}

/// Body of `/delete_profile`.
#[derive(Debug, Deserialize)]
pub struct DeleteProfileRequest {
    /// Profile to remove.
    pub profile: Option<String>,
}

/// Body of `/delete_behavior`.
#[derive(Debug, Deserialize)]
pub struct DeleteBehaviorRequest {
    /// Profile holding the behavior.
    pub profile: Option<String>,
    /// Behavior to remove.
    pub behavior_id: Option<String>,
}

/// `?profile=` query string.
#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    /// Profile name.
    pub profile: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    id: String,
}

#[derive(Debug, Serialize)]
struct UpdatedResponse<T> {
    status: &'static str,
    updated: T,
}

#[derive(Debug, Serialize)]
struct DeletedResponse<T> {
    status: &'static str,
    deleted: T,
}

#[derive(Debug, Serialize)]
struct CloneResponse {
    status: &'static str,
    profile: String,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    behavior_count: usize,
}

#[derive(Debug, Serialize)]
struct ProfilesResponse {
    profiles: Vec<String>,
}

const SUCCESS: &str = "success";

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn liveness() -> &'static str {
    "Behavior store is running"
}

async fn upload(
    State(store): State<SharedStore>,
    payload: Result<Json<BehaviorRequest>, JsonRejection>,
) -> ApiResult<UploadResponse> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let id = req.id.unwrap_or_default();
    let id = blocking(&store, move |s| s.upload(&profile, &id, req.data)).await??;
    Ok(Json(UploadResponse { status: SUCCESS, id }))
}

async fn update_behavior(
    State(store): State<SharedStore>,
    payload: Result<Json<BehaviorRequest>, JsonRejection>,
) -> ApiResult<UpdatedResponse<String>> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let id = req.id.unwrap_or_default();
    let updated = blocking(&store, move |s| s.update_behavior(&profile, &id, req.data)).await??;
    Ok(Json(UpdatedResponse {
        status: SUCCESS,
        updated,
    }))
}

async fn get_all(
    State(store): State<SharedStore>,
    query: Result<Query<ProfileQuery>, QueryRejection>,
) -> ApiResult<Vec<Behavior>> {
    let Query(query) = query?;
    let profile = query.profile.unwrap_or_default();
    if profile.is_empty() {
        return Err(ApiError::BadRequest("Missing 'profile' parameter".into()));
    }
    Ok(Json(blocking(&store, move |s| s.get_all(&profile)).await??))
}

async fn mark_used(
    State(store): State<SharedStore>,
    payload: Result<Json<MarkUsedRequest>, JsonRejection>,
) -> ApiResult<DeletedResponse<Vec<String>>> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let used_ids = req.used_ids.unwrap_or_default();
    let deleted = blocking(&store, move |s| s.mark_used(&profile, &used_ids))
        .await?
        .map_err(ApiError::invalid_profile)?;
    Ok(Json(DeletedResponse {
        status: "updated",
        deleted,
    }))
}

async fn reset_unused_generations(
    State(store): State<SharedStore>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> ApiResult<UpdatedResponse<Vec<String>>> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let parent_ids = req.parent_ids.unwrap_or_default();
    let updated = blocking(&store, move |s| s.reset_unused_generations(&profile, &parent_ids))
        .await?
        .map_err(ApiError::invalid_profile)?;
    Ok(Json(UpdatedResponse {
        status: SUCCESS,
        updated,
    }))
}

async fn get_behavior_count(
    State(store): State<SharedStore>,
    query: Result<Query<ProfileQuery>, QueryRejection>,
) -> ApiResult<CountResponse> {
    let Query(query) = query?;
    let behavior_count = match query.profile {
        Some(profile) => blocking(&store, move |s| s.get_count(&profile)).await?,
        None => 0,
    };
    Ok(Json(CountResponse { behavior_count }))
}

async fn get_profiles(State(store): State<SharedStore>) -> ApiResult<ProfilesResponse> {
    let profiles = blocking(&store, BehaviorStore::get_profiles).await?;
    Ok(Json(ProfilesResponse { profiles }))
}

async fn clone_profile(
    State(store): State<SharedStore>,
    payload: Result<Json<CloneRequest>, JsonRejection>,
) -> ApiResult<CloneResponse> {
    let Json(req) = payload?;
    let source = req.source.unwrap_or_default();
    let target = req.target.unwrap_or_default();
    let profile = blocking(&store, move |s| s.clone_profile(&source, &target)).await??;
    Ok(Json(CloneResponse {
        status: SUCCESS,
        profile,
    }))
}

async fn delete_profile(
    State(store): State<SharedStore>,
    payload: Result<Json<DeleteProfileRequest>, JsonRejection>,
) -> ApiResult<DeletedResponse<String>> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let name = profile.clone();
    blocking(&store, move |s| s.delete_profile(&name)).await??;
    Ok(Json(DeletedResponse {
        status: SUCCESS,
        deleted: profile,
    }))
}

async fn delete_behavior(
    State(store): State<SharedStore>,
    payload: Result<Json<DeleteBehaviorRequest>, JsonRejection>,
) -> ApiResult<DeletedResponse<String>> {
    let Json(req) = payload?;
    let profile = req.profile.unwrap_or_default();
    let behavior_id = req.behavior_id.unwrap_or_default();
    let removed = blocking(&store, move |s| s.delete_behavior(&profile, &behavior_id)).await??;
    Ok(Json(DeletedResponse {
        status: SUCCESS,
        deleted: removed.id,
    }))
}

async fn stats(State(store): State<SharedStore>) -> ApiResult<StoreStats> {
    Ok(Json(blocking(&store, BehaviorStore::stats).await?))
}

async fn metrics(State(store): State<SharedStore>) -> Result<impl IntoResponse, ApiError> {
    let stats = blocking(&store, BehaviorStore::stats).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        stats.counters.to_prometheus(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bhv_core::retention::RetentionPolicy;

    #[tokio::test]
    async fn store_calls_leave_the_runtime_thread() {
        let store: SharedStore = Arc::new(BehaviorStore::in_memory(RetentionPolicy::default()));
        let runtime_thread = std::thread::current().id();

        let op_thread = blocking(&store, |_| std::thread::current().id())
            .await
            .expect("task");
        assert_ne!(op_thread, runtime_thread);

        let profiles = blocking(&store, BehaviorStore::get_profiles)
            .await
            .expect("task");
        assert!(profiles.is_empty());
    }
}
