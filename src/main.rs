mod codec;
mod config;
mod error;
mod game;
mod quiz;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Json, Path as AxumPath, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use game::client::{TransportError, WireMessage, WireSink, WireStream};
use game::coordinator::Coordinator;
use game::{Action, Pin};
use quiz::manager::Manager;

#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
    quizzes: Arc<Manager>,
}

/// Wraps axum's WebSocket write half so the game layer never depends on
/// axum directly (spec §4.8's `Transport` abstraction boundary).
struct AxumSink(SplitSink<WebSocket, Message>);

impl WireSink for AxumSink {
    async fn send(&mut self, msg: WireMessage) -> Result<(), TransportError> {
        let frame = match msg {
            WireMessage::Text(s) => Message::Text(s.into()),
            WireMessage::Binary => Message::Binary(Vec::new().into()),
            WireMessage::Ping => Message::Ping(Vec::new().into()),
            WireMessage::Pong => Message::Pong(Vec::new().into()),
            WireMessage::Close => Message::Close(None),
        };
        self.0.send(frame).await.map_err(|e| TransportError(e.to_string()))
    }
}

struct AxumStream(SplitStream<WebSocket>);

impl WireStream for AxumStream {
    async fn recv(&mut self) -> Option<Result<WireMessage, TransportError>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(f) => f,
                Err(e) => return Some(Err(TransportError(e.to_string()))),
            };
            return Some(Ok(match frame {
                Message::Text(s) => WireMessage::Text(s.to_string()),
                Message::Binary(_) => WireMessage::Binary,
                Message::Ping(_) => WireMessage::Ping,
                Message::Pong(_) => WireMessage::Pong,
                Message::Close(_) => WireMessage::Close,
            }));
        }
    }
}

async fn play_handler(
    AxumPath(pin): AxumPath<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Ok(pin) = pin.parse::<u32>().map(Pin) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !pin.validate() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(handle) = state.coordinator.get_game(pin) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        game::player::connect(AxumSink(sink), AxumStream(stream), handle.actions, handle.token).await;
    })
    .into_response()
}

async fn host_handler(
    AxumPath(pin): AxumPath<String>,
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Ok(pin) = pin.parse::<u32>().map(Pin) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !pin.validate() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(handle) = state.coordinator.get_game(pin) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        game::host::connect(AxumSink(sink), AxumStream(stream), handle.actions, handle.token).await;
    })
    .into_response()
}

/// Not one of spec.md §6's two named routes, but the minimal plumbing
/// needed to exercise them at all: given an already-loaded quiz's content
/// hash, spin up a session and hand back its PIN. Quiz authoring and a
/// lobby UI remain out of scope (spec.md §1's Non-goals).
async fn create_game_handler(AxumPath(hash): AxumPath<String>, State(state): State<AppState>) -> impl IntoResponse {
    let Some(quiz) = state.quizzes.get_string(&hash) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.coordinator.create_game(quiz) {
        Ok(pin) => (StatusCode::OK, pin.to_string()).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to create game");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(serde::Deserialize)]
struct JoinRequest {
    nick: String,
}

/// Likewise not one of spec.md §6's named routes: a lobby needs some way to
/// turn a chosen nickname into the player ID that `ident <id>` hands back
/// over the WebSocket (spec.md §4.5's `AddPlayer` action). The landing page
/// itself stays out of scope; this is just the minimal seam it would call.
async fn join_handler(
    AxumPath(pin): AxumPath<String>,
    State(state): State<AppState>,
    Json(body): Json<JoinRequest>,
) -> impl IntoResponse {
    let Ok(pin) = pin.parse::<u32>().map(Pin) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !pin.validate() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let Some(handle) = state.coordinator.get_game(pin) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    if handle.actions.send(Action::AddPlayer { nick: body.nick, reply: reply_tx }).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    match reply_rx.await {
        Ok(Ok(id)) => (StatusCode::OK, id.to_string()).into_response(),
        Ok(Err(e)) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/quiplex.conf".to_string());
    let cfg = match config::Config::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, path = %config_path, "no config file, using defaults");
            config::Config::default()
        }
    };

    let quizzes = Arc::new(Manager::new());
    let quiz_dir = std::env::var("QUIZ_DIR").unwrap_or_else(|_| "quizzes".to_string());
    match quizzes.load_dir(Path::new(&quiz_dir)) {
        Ok(report) => {
            tracing::info!(loaded = report.loaded.len(), failed = report.errors.len(), "quiz directory crawled");
            for err in &report.errors {
                tracing::error!(path = %err.path.display(), error = %err.error, "quiz load failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, dir = %quiz_dir, "quiz directory unreadable"),
    }

    let coordinator = Arc::new(Coordinator::new(cfg.game_timeout));

    let state = AppState { coordinator, quizzes };

    let app = Router::new()
        .route("/api/play/{pin}", get(play_handler))
        .route("/api/play/{pin}/join", post(join_handler))
        .route("/api/host/{pin}", get(host_handler))
        .route("/api/games/{hash}", post(create_game_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(cfg.full_addr()).await.expect("failed to bind listen address");

    tracing::info!(addr = %cfg.full_addr(), "quiplex server running");

    axum::serve(listener, app).await.unwrap();
}
