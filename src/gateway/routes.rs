//! Request handlers.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::{sse, Html, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiResult;
use super::render;
use super::AppState;
use crate::bus::{BusPoll, DuplicateFilter, Subscription};
use crate::state::StateStore;

/// How long a dashboard connection waits for an event before a heartbeat
/// frame is sent, so idle connections are not mistaken for dead ones by
/// intermediary proxies.
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(25);

/// `GET /` - the dashboard page with the current snapshot rendered in.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Html<String> {
    let snapshot = state.store.snapshot().await;
    Html(render::dashboard_page(&snapshot))
}

/// `GET /api/state` - the raw snapshot, keyed alphabetically.
pub async fn current_state(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, String>> {
    let snapshot = state.store.snapshot().await;
    Json(snapshot.into_iter().collect())
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(flatten)]
    pub link: crate::broker::LinkStatus,
}

/// `GET /api/status` - broker link health and counters.
pub async fn link_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: state.link.is_connected(),
        link: state.link.status(),
    })
}

/// Per-connection context for the SSE loop.
struct StreamContext {
    subscription: Subscription,
    filter: DuplicateFilter,
    store: Arc<StateStore>,
}

/// `GET /events` - one-way server push of re-rendered state tables.
///
/// Each connection owns its subscription and consumes at its own pace.
/// Consecutive identical events collapse into one render; a receive timeout
/// becomes an SSE comment frame as keep-alive. Client disconnect drops the
/// stream, and with it the subscription.
pub async fn event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>>> {
    debug!("dashboard client connected to the event stream");
    let context = StreamContext {
        subscription: state.bus.subscribe(),
        filter: DuplicateFilter::default(),
        store: Arc::clone(&state.store),
    };

    let stream = stream::unfold(context, |mut context| async move {
        loop {
            match context.subscription.recv(KEEPALIVE_TIMEOUT).await {
                BusPoll::Event(event) => {
                    if !context.filter.accept(&event) {
                        continue;
                    }
                    let snapshot = context.store.snapshot().await;
                    let frame = sse::Event::default()
                        .event("message")
                        .data(render::state_table(&snapshot));
                    return Some((Ok(frame), context));
                }
                BusPoll::KeepAlive => {
                    let frame = sse::Event::default().comment("keep-alive");
                    return Some((Ok(frame), context));
                }
                BusPoll::Closed => {
                    debug!("change bus closed, ending event stream");
                    return None;
                }
            }
        }
    });

    Sse::new(stream)
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingRequest {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub status: &'static str,
}

/// `POST /api/command` - publish an arbitrary topic/payload pair.
pub async fn publish_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<Json<CommandResponse>> {
    state.link.publish(&request.topic, &request.payload).await?;
    Ok(Json(CommandResponse { status: "sent" }))
}

/// `POST /api/settings` - send a "change setting" command to the device.
pub async fn change_setting(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SettingRequest>,
) -> ApiResult<Json<CommandResponse>> {
    state.link.change_setting(&request.name, &request.value).await?;
    Ok(Json(CommandResponse { status: "sent" }))
}

/// `POST /api/settings/request` - ask the device to re-emit its settings.
pub async fn request_settings(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<CommandResponse>> {
    state.link.request_settings().await?;
    Ok(Json(CommandResponse { status: "sent" }))
}
