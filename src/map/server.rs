//! The local map server: accepts pushes from the tracker and fans them out to map pages.

use std::convert::Infallible;

use async_stream::stream;
use axum::Router;
use axum::extract::{Json, State};
use axum::response::Html;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use bon::Builder;
use futures::Stream;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::{
    CLEAR_LOCATION_PATH, DeviceLocation, EVENTS_PATH, FixUpdate, HIDE_MARKER_PATH, MapEvent,
    SignalUpdate, TrackedLocation, UPDATE_FIX_PATH, UPDATE_LOCATION_PATH, UPDATE_SIGNAL_PATH,
    UPDATE_TRACKED_LOCATION_PATH,
};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

#[derive(Debug, Clone, Builder)]
pub struct MapServerConfig {
    /// `host:port`; host names are resolved when binding.
    #[builder(default = "127.0.0.1:5000".to_string())]
    pub bind_addr: String,

    /// Events buffered per subscriber before the oldest are dropped.
    #[builder(default = 64)]
    pub buffer: usize,
}

#[derive(Clone)]
struct MapServerState {
    events: broadcast::Sender<MapEvent>,
}

/// Build the map server routes around an event fan-out channel.
pub fn router(events: broadcast::Sender<MapEvent>) -> Router {
    Router::new()
        .route("/", get(index))
        .route(EVENTS_PATH, get(subscribe))
        .route(UPDATE_LOCATION_PATH, post(update_location))
        .route(UPDATE_TRACKED_LOCATION_PATH, post(update_tracked_location))
        .route(CLEAR_LOCATION_PATH, post(clear_location))
        .route(HIDE_MARKER_PATH, post(hide_marker))
        .route(UPDATE_SIGNAL_PATH, post(update_signal))
        .route(UPDATE_FIX_PATH, post(update_fix))
        .with_state(MapServerState { events })
}

/// Open the listening socket for `config`.
pub async fn bind(config: &MapServerConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    info!(address = %listener.local_addr()?, "Map server listening");
    Ok(listener)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: MapServerConfig) -> std::io::Result<()> {
    let (events, _) = broadcast::channel(config.buffer);
    let listener = bind(&config).await?;
    axum::serve(listener, router(events)).await
}

fn publish(state: &MapServerState, event: MapEvent) -> Json<Value> {
    // No open page is not an error; the next update will find one.
    match state.events.send(event) {
        Ok(subscribers) => debug!(subscribers, event = ?event, "Pushed map event"),
        Err(_) => debug!(event = ?event, "No map page subscribed"),
    }
    Json(json!({ "status": "success" }))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn update_location(
    State(state): State<MapServerState>,
    Json(body): Json<DeviceLocation>,
) -> Json<Value> {
    publish(&state, MapEvent::UpdateLocation(body))
}

async fn update_tracked_location(
    State(state): State<MapServerState>,
    Json(body): Json<TrackedLocation>,
) -> Json<Value> {
    publish(&state, MapEvent::UpdateTrackedLocation(body))
}

async fn clear_location(State(state): State<MapServerState>) -> Json<Value> {
    publish(&state, MapEvent::ClearLocation)
}

async fn hide_marker(State(state): State<MapServerState>) -> Json<Value> {
    publish(&state, MapEvent::HideMarker)
}

async fn update_signal(
    State(state): State<MapServerState>,
    Json(body): Json<SignalUpdate>,
) -> Json<Value> {
    publish(&state, MapEvent::UpdateSignal(body))
}

async fn update_fix(
    State(state): State<MapServerState>,
    Json(body): Json<FixUpdate>,
) -> Json<Value> {
    publish(&state, MapEvent::UpdateFix(body))
}

async fn subscribe(
    State(state): State<MapServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut events = state.events.subscribe();
    info!("Map page subscribed");

    let stream = stream! {
        loop {
            match events.recv().await {
                Ok(event) => match Event::default().json_data(event) {
                    Ok(sse) => yield Ok::<_, Infallible>(sse),
                    Err(e) => warn!(error = %e, "Failed to encode map event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Map page fell behind, dropped events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
