use axum::extract::{Extension, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use pomo_core::OwnerId;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/v1/events: SSE stream emitting `update` whenever the caller's
/// tasks or sessions change. The data is `tasks` or `sessions`.
pub async fn sse_events(
    State(app): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> impl axum::response::IntoResponse {
    let rx = app.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| {
        msg.ok().filter(|change| change.owner == owner).map(|change| {
            Ok::<Event, Infallible>(Event::default().event("update").data(change.kind.as_str()))
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
