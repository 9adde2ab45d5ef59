//! `GET /v1/jobs/:id/events` — SSE fan-out of one job's lifecycle and
//! streaming events.

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures_util::stream::Stream;
use uuid::Uuid;

use crate::state::AppState;

pub async fn job_events_sse(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> impl IntoResponse {
    if state.queue.get(job_id).await.is_none() {
        let stream = futures_util::stream::once(async {
            Ok::<_, std::convert::Infallible>(
                Event::default().event("error").data(r#"{"error":"job not found"}"#),
            )
        });
        return Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    }

    let keepalive = state.broker.keepalive_timeout();
    let subscription = state.broker.subscribe(job_id);
    state.broker.stream_connected(job_id);

    let stream = make_job_event_stream(state, subscription);
    Sse::new(stream)
        .keep_alive(KeepAlive::default().interval(keepalive))
        .into_response()
}

fn make_job_event_stream(
    state: AppState,
    mut subscription: crate::broker::Subscription,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    let keepalive_interval = state.broker.keepalive_timeout();
    async_stream::stream! {
        let job_id = subscription.job_id;
        let mut ticker = tokio::time::interval(keepalive_interval);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                maybe_event = subscription.receiver.recv() => {
                    let Some(event) = maybe_event else { break };
                    let data = serde_json::to_string(&event.data).unwrap_or_default();
                    yield Ok(Event::default().event(event.event.clone()).data(data));
                }
                _ = ticker.tick() => {
                    // Broadcasts through the broker so every subscriber of
                    // this job, not just this stream, sees the idle ping.
                    state.broker.keepalive(job_id);
                }
            }
        }

        // subscription drops here; its Drop impl unsubscribes.
    }
}
