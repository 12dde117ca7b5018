use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use futures_lite::Stream;
use tracing::{error, info};

use hanok_shared::errors::AppError;
use hanok_shared::types::auth::AuthUser;

use crate::models::PushEnvelope;
use crate::registry::{ConnectionRegistry, Frame};
use crate::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct StreamQuery {
    /// Skip backlog records created at or before this instant; clients pass
    /// the timestamp of the last frame they saw in a previous session.
    pub since: Option<DateTime<Utc>>,
}

/// Deregisters the stream when the SSE response is dropped, whether by
/// client disconnect or server shutdown.
struct StreamGuard {
    registry: Arc<ConnectionRegistry>,
    user_id: i64,
    stream_id: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.registry.remove_connection(self.user_id, self.stream_id);
    }
}

/// `GET /notifications/stream` -- long-lived SSE stream of alarm frames.
///
/// On connect the unread backlog is flushed as a single frame, then each
/// create/createMany targeting this user produces one frame. The stream is
/// registered before the backlog query so a notification created in that
/// window is delivered twice rather than lost. A heartbeat comment every
/// 15 seconds keeps the connection alive through proxies.
pub async fn notification_stream(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let user_id = auth_user.id;

    let (stream_id, mut rx) = state.registry.open(user_id);
    let guard = StreamGuard {
        registry: state.registry.clone(),
        user_id,
        stream_id,
    };

    // Guard is live: an error here still deregisters on drop.
    let backlog = state.notifications.find_unread(user_id, query.since).await?;

    info!(
        user_id = %user_id,
        stream_id = %stream_id,
        backlog = backlog.len(),
        "notification stream connected"
    );

    let stream = async_stream::stream! {
        let _guard = guard;

        if !backlog.is_empty() {
            match serde_json::to_string(&PushEnvelope::alarm(&backlog)) {
                Ok(json) => yield Ok(SseEvent::default().data(json)),
                Err(e) => error!(error = %e, "failed to serialize backlog envelope"),
            }
        }

        while let Some(frame) = rx.recv().await {
            match frame {
                Frame::Alarm(json) => {
                    yield Ok(SseEvent::default().data(json.as_ref()));
                }
                Frame::Close => {
                    yield Ok(SseEvent::default().event("close").data("shutting down"));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    ))
}
