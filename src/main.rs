//! Griffin Engine — transport glue over the broker feed quality core.
//!
//! Parses CSV-over-HTTP ingest payloads, fans out tick/analysis events over
//! a WebSocket, and serves the latest `AnalysisSnapshot` as JSON. All
//! scoring logic lives in `griffin_engine::*`; this binary only wires it to
//! axum the way the teacher's `main.rs` wires its signal pipeline to HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use griffin_engine::config::ServerConfig;
use griffin_engine::engine::Engine;
use griffin_engine::middleware::request_logging_simple;
use griffin_engine::model::OrderType;
use griffin_engine::orchestrator;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    ws_tx: broadcast::Sender<WsEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum WsEvent {
    #[serde(rename = "spread_update")]
    SpreadUpdate {
        broker: String,
        symbol: String,
        current_spread: f64,
    },
    #[serde(rename = "full_analysis")]
    FullAnalysis {
        snapshot: Arc<griffin_engine::snapshot::AnalysisSnapshot>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    let engine = Arc::new(Engine::new());
    let (ws_tx, _ws_rx) = broadcast::channel::<WsEvent>(1000);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    orchestrator::log_startup();
    let registry = engine.registry();
    let analysis_task = tokio::spawn(orchestrator::run(registry.clone(), shutdown_rx));

    let broadcaster_tx = ws_tx.clone();
    let broadcast_registry = registry.clone();
    let broadcast_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let snapshot = broadcast_registry.read_snapshot();
            let _ = broadcaster_tx.send(WsEvent::FullAnalysis { snapshot });
        }
    });

    let state = AppState {
        engine: engine.clone(),
        ws_tx,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/ticks", post(post_tick))
        .route("/api/slippage", post(post_slippage))
        .route("/api/latency", post(post_latency))
        .route("/api/snapshot", get(get_snapshot))
        .route("/ws", get(websocket_handler))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_logging_simple))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "griffin engine listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    analysis_task.abort();
    broadcast_task.abort();

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "griffin_engine=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn health_check() -> &'static str {
    "ok"
}

/// `broker,symbol,_,bid,ask` — the third field is reserved (spec §6).
async fn post_tick(State(state): State<AppState>, body: String) -> Response {
    let parts: Vec<&str> = body.trim().split(',').collect();
    if parts.len() != 5 {
        return axum::Json(serde_json::json!({"status": "invalid_format"})).into_response();
    }

    let (broker, symbol, bid, ask) = (parts[0], parts[1], parts[3], parts[4]);
    let outcome = state.engine.ingest_tick(broker, symbol, bid, ask);
    if let griffin_engine::error::IngestOutcome::Ok(ref ack) = outcome {
        let _ = state.ws_tx.send(WsEvent::SpreadUpdate {
            broker: ack.broker.clone(),
            symbol: ack.symbol.clone(),
            current_spread: ack.current_spread,
        });
    }
    axum::Json(outcome).into_response()
}

/// `broker,symbol,_,order_type,price,_` — third and sixth fields reserved.
async fn post_slippage(State(state): State<AppState>, body: String) -> Response {
    let parts: Vec<&str> = body.trim().split(',').collect();
    if parts.len() != 6 {
        return axum::Json(serde_json::json!({"status": "invalid_format"})).into_response();
    }
    let order_type = match parts[3].to_uppercase().as_str() {
        "BUY" => OrderType::Buy,
        "SELL" => OrderType::Sell,
        _ => return axum::Json(serde_json::json!({"status": "invalid_format"})).into_response(),
    };

    let outcome = state.engine.ingest_slippage(parts[0], parts[1], order_type, parts[4]);
    axum::Json(outcome).into_response()
}

/// `broker,symbol,client_send_time_ms`.
async fn post_latency(State(state): State<AppState>, body: String) -> Response {
    let parts: Vec<&str> = body.trim().split(',').collect();
    if parts.len() != 3 {
        return axum::Json(serde_json::json!({"status": "invalid_format"})).into_response();
    }
    let client_send_time_ms: f64 = match parts[2].parse() {
        Ok(v) => v,
        Err(_) => return axum::Json(serde_json::json!({"status": "invalid_format"})).into_response(),
    };

    let outcome = state.engine.ingest_latency(parts[0], parts[1], client_send_time_ms);
    axum::Json(outcome).into_response()
}

async fn get_snapshot(State(state): State<AppState>) -> Response {
    axum::Json(state.engine.snapshot()).into_response()
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut rx = state.ws_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let msg = serde_json::to_string(&event).unwrap_or_else(|e| {
                            warn!(error = %e, "failed to serialize ws event");
                            "{}".to_string()
                        });
                        if socket.send(Message::Text(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "ws client lagged, dropping buffered events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}
