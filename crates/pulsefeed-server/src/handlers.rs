// HTTP handlers for the enqueue surface and the counter read path.
//
// Write endpoints answer 202 Accepted as soon as the job is on the queue;
// the actual write happens at the next flush. Read endpoints compose
// counters from the counter store through the response cache.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use pulsefeed_core::{
    CacheKeySpec, CommentJob, EntityKind, LikeJob, LikeTarget, MarkReadJob, QueueJob,
};
use pulsefeed_pipeline::{snapshots_for, ResponseCache};
use pulsefeed_store::{CounterStore, DurableQueue};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn DurableQueue>,
    pub counters: Arc<dyn CounterStore>,
    pub cache: ResponseCache,
}

/// Error type that implements IntoResponse
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Request error: {:?}", self.error);
        (
            self.status,
            Json(json!({
                "error": self.error.to_string(),
            })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: err.into(),
        }
    }
}

impl AppError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::anyhow!("{message}"),
        }
    }
}

fn accepted(message: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": 202, "message": message })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct LikeRequest {
    pub post: String,
    pub liker: String,
}

/// POST /v1/like - enqueue a like for a post
pub async fn add_like(
    State(state): State<AppState>,
    Json(request): Json<LikeRequest>,
) -> Result<Response, AppError> {
    if request.post.is_empty() || request.liker.is_empty() {
        return Err(AppError::bad_request("post and liker are required"));
    }

    state
        .queue
        .enqueue(QueueJob::like(LikeJob {
            target: LikeTarget::Post,
            post: request.post,
            comment: None,
            liker: request.liker,
        }))
        .await?;

    counter!("pulsefeed.api.likes_accepted", 1);
    Ok(accepted("Like addition request added to the queue"))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub post: String,
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub parent_comment: Option<String>,
}

/// POST /v1/comment - enqueue a comment on a post
pub async fn add_comment(
    State(state): State<AppState>,
    Json(request): Json<CommentRequest>,
) -> Result<Response, AppError> {
    if request.post.is_empty() || request.author.is_empty() || request.text.is_empty() {
        return Err(AppError::bad_request("post, author and text are required"));
    }

    state
        .queue
        .enqueue(QueueJob::comment(CommentJob {
            post: request.post,
            parent_comment: request.parent_comment,
            author: request.author,
            text: request.text,
        }))
        .await?;

    counter!("pulsefeed.api.comments_accepted", 1);
    Ok(accepted("Comment creation request added to the queue"))
}

#[derive(Deserialize)]
pub struct MarkReadRequest {
    pub recipient: String,
    pub notifications: Vec<String>,
}

/// POST /v1/notification/read - enqueue a mark-as-read request
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Response, AppError> {
    if request.recipient.is_empty() || request.notifications.is_empty() {
        return Err(AppError::bad_request(
            "recipient and notifications are required",
        ));
    }

    state
        .queue
        .enqueue(QueueJob::mark_read(MarkReadJob {
            recipient: request.recipient,
            notifications: request.notifications,
        }))
        .await?;

    Ok(accepted("Notification read request added to the queue"))
}

/// GET /v1/like/{post_id} - like count for a post, through the cache
pub async fn get_post_likes(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let spec = CacheKeySpec::new("/v1/like").param("postId", post_id.as_str());
    if let Some(cached) = state.cache.get_api(&spec).await {
        return Ok((StatusCode::OK, Json(cached)).into_response());
    }

    let snapshots = snapshots_for(
        state.counters.as_ref(),
        EntityKind::Post,
        std::slice::from_ref(&post_id),
    )
    .await;
    let body = json!({
        "postId": post_id,
        "likesCount": snapshots[0].likes_count,
    });

    state.cache.set_api(&spec, &body).await;
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// GET /v1/comment/{post_id} - comment count for a post, through the cache
pub async fn get_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let spec = CacheKeySpec::new("/v1/comment").param("postId", post_id.as_str());
    if let Some(cached) = state.cache.get_api(&spec).await {
        return Ok((StatusCode::OK, Json(cached)).into_response());
    }

    let snapshots = snapshots_for(
        state.counters.as_ref(),
        EntityKind::Post,
        std::slice::from_ref(&post_id),
    )
    .await;
    let body = json!({
        "postId": post_id,
        "commentsCount": snapshots[0].comments_count,
    });

    state.cache.set_api(&spec, &body).await;
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// GET /health - Basic health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}
