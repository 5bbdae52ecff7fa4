//! HTTP handlers for the mix board

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
};
use futures::stream::Stream;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::board::Board;
use crate::error::Error;
use crate::event::PushMessage;
use crate::request::{iso8601, NewRequest};
use crate::storage::RequestStorage;

/// Shared state for handlers
#[derive(Clone)]
pub struct BoardState<S: RequestStorage> {
    pub board: Board<S>,
    pub keep_alive: Duration,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::Validation(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                tracing::error!(error = %other, "Request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

fn push_message_to_axum(message: PushMessage) -> Option<Event> {
    match Event::default().event(message.kind()).json_data(&message) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(error = %e, kind = message.kind(), "Failed to encode push message");
            None
        }
    }
}

/// `POST /api/mix-requests`
pub async fn create_request<S: RequestStorage>(
    State(state): State<BoardState<S>>,
    payload: Result<Json<NewRequest>, JsonRejection>,
) -> Response {
    let Json(candidate) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected mix request body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request data");
        }
    };

    match state.board.submit(candidate).await {
        Ok(request) => Json(request).into_response(),
        Err(e) => {
            if let Error::Validation(ref reason) = e {
                tracing::warn!(reason = %reason, "Rejected mix request");
            }
            e.into_response()
        }
    }
}

/// `GET /api/mix-requests`
pub async fn list_requests<S: RequestStorage>(State(state): State<BoardState<S>>) -> Response {
    match state.board.requests().await {
        Ok(requests) => Json(requests).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub success: bool,
}

/// `DELETE /api/mix-requests`
pub async fn clear_requests<S: RequestStorage>(State(state): State<BoardState<S>>) -> Response {
    match state.board.clear().await {
        Ok(()) => Json(ClearResponse { success: true }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /sse/connect`: the push endpoint
pub async fn sse_connect<S: RequestStorage>(
    State(state): State<BoardState<S>>,
    headers: HeaderMap,
) -> Response {
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let (info, receiver) = match state.board.connect(client_ip.clone(), user_agent).await {
        Ok(opened) => opened,
        Err(e) => return e.into_response(),
    };

    tracing::info!(
        connection_id = %info.connection_id,
        client_ip = ?client_ip,
        snapshot_len = info.snapshot_len,
        "New viewer connection"
    );

    let event_stream = ReceiverStream::new(receiver)
        .filter_map(push_message_to_axum)
        .map(Ok::<_, Infallible>);

    let board = state.board.clone();
    let cleanup_id = info.connection_id.clone();
    let final_stream = CleanupStream {
        inner: Box::pin(event_stream),
        cleanup: Some(Box::new(move || {
            tracing::info!(connection_id = %cleanup_id, "Viewer connection closed");
            board.disconnect(&cleanup_id);
        })),
    };

    Sse::new(final_stream)
        .keep_alive(
            axum::response::sse::KeepAlive::new()
                .interval(state.keep_alive)
                .text("keep-alive"),
        )
        .into_response()
}

/// Runs its cleanup once when the response stream is dropped
struct CleanupStream<S> {
    inner: Pin<Box<S>>,
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl<S> Drop for CleanupStream<S> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl<S: Stream> Stream for CleanupStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

// Stats endpoint
#[derive(Serialize)]
pub struct StatsResponse {
    pub total_connections: usize,
    pub stored_requests: usize,
    pub connections: Vec<ConnectionStats>,
}

#[derive(Serialize)]
pub struct ConnectionStats {
    pub id: String,
    pub connected_at: String,
    pub client_ip: Option<String>,
    pub state: String,
}

/// `GET /api/stats`
pub async fn get_stats<S: RequestStorage>(State(state): State<BoardState<S>>) -> Response {
    let stored_requests = match state.board.storage().len().await {
        Ok(len) => len,
        Err(e) => return e.into_response(),
    };

    let connections: Vec<ConnectionStats> = state
        .board
        .connections()
        .list_connections()
        .into_iter()
        .map(|c| ConnectionStats {
            state: c.state().to_string(),
            id: c.id,
            connected_at: iso8601::format(&c.metadata.connected_at),
            client_ip: c.metadata.client_ip,
        })
        .collect();

    Json(StatsResponse {
        total_connections: connections.len(),
        stored_requests,
        connections,
    })
    .into_response()
}
