// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

mod business_metrics;
mod config;
#[cfg(feature = "debug-endpoints")]
mod debug;
mod dynamo;
mod kafka;
mod memory;
mod ports;
mod round;
mod wager;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lambda_http::run as lambda_run;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::de::DeserializeOwned;
use slot_common::{
    BusinessMetricsRequest, BusinessMetricsResponse, CalculateRequest, CalculateResponse,
    ConnectCalculateResponse, ConnectCode, ConnectErrorBody, TraceContext,
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::{ServiceConfig, env_flag},
    dynamo::DynamoRepository,
    kafka::{KafkaGameEventPublisher, LogOnlyPublisher},
    memory::InMemoryRepository,
    ports::{BalanceRepository, GameEventPublisher, GameRepository, WagerService},
    round::GameRoundService,
    wager::HttpWagerService,
};

const SERVICE_NAME: &str = "game-engine-service";

/// Request headers copied into the published game result.
const TRACE_HEADERS: [&str; 5] = [
    "traceparent",
    "tracestate",
    "sentry-trace",
    "baggage",
    "x-request-id",
];

#[derive(Clone)]
struct AppState {
    rounds: GameRoundService,
    metrics: PrometheusHandle,
}

impl AppState {
    async fn from_env(config: &ServiceConfig, metrics: PrometheusHandle) -> anyhow::Result<Self> {
        let engine = Arc::new(config.build_engine()?);

        let games: Arc<dyn GameRepository>;
        let balances: Arc<dyn BalanceRepository>;
        if let Some(repository) = DynamoRepository::from_env(config.default_balance).await {
            let repository = Arc::new(repository);
            games = repository.clone();
            balances = repository;
        } else {
            info!("no DynamoDB configured; keeping rounds and balances in memory");
            let repository = Arc::new(InMemoryRepository::new(config.default_balance));
            games = repository.clone();
            balances = repository;
        }

        let publisher: Arc<dyn GameEventPublisher> = if env_flag("KAFKA_ENABLED", true)? {
            Arc::new(KafkaGameEventPublisher::from_env()?)
        } else {
            info!("Kafka disabled; game results are only logged");
            Arc::new(LogOnlyPublisher)
        };

        let wager: Option<Arc<dyn WagerService>> = if config.use_wager_service {
            info!("wager service integration enabled");
            Some(Arc::new(HttpWagerService::from_env()?))
        } else {
            None
        };

        Ok(Self {
            rounds: GameRoundService::new(engine, games, balances, publisher, wager),
            metrics,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "game_engine_service=debug,tower_http=info".to_string()),
        )
        .init();

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    business_metrics::describe();

    let config = ServiceConfig::from_env()?;
    let state = AppState::from_env(&config, metrics).await?;
    let app = build_router(state, config.enable_rest, config.enable_connect);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("AWS Lambda runtime detected; running game-engine-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("GAME_ENGINE_BIND", "0.0.0.0:8082")?;
    info!(
        %bind_addr,
        rest = config.enable_rest,
        connect = config.enable_connect,
        "game-engine-service listening"
    );
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState, enable_rest: bool, enable_connect: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler));

    if enable_rest {
        router = router
            .route("/calculate", post(calculate_handler))
            .route("/business-metrics", post(business_metrics_handler));
    }
    if enable_connect {
        router = router
            .route(
                "/game.v1.GameEngineService/Calculate",
                post(connect_calculate_handler),
            )
            .route(
                "/game.v1.GameEngineService/TrackBusinessMetrics",
                post(connect_business_metrics_handler),
            );
    }
    #[cfg(feature = "debug-endpoints")]
    {
        router = router.merge(debug::router::<AppState>());
    }

    router
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

fn trace_context(headers: &HeaderMap) -> TraceContext {
    TRACE_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?.trim();
            (!value.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": SERVICE_NAME}))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn calculate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CalculateResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let (status, response) = state
        .rounds
        .execute(&request, &trace_context(&headers))
        .await;
    Ok((status, Json(response)))
}

async fn business_metrics_handler(
    State(state): State<AppState>,
    payload: Result<Json<BusinessMetricsRequest>, JsonRejection>,
) -> Result<Json<BusinessMetricsResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(Json(state.rounds.track_business_metrics(&request)))
}

/// Connect unary JSON bodies; an empty body is the default message.
fn parse_connect<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ConnectError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|error| ConnectError {
        code: ConnectCode::InvalidArgument,
        message: format!("invalid request body: {error}"),
    })
}

async fn connect_calculate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ConnectCalculateResponse>, ConnectError> {
    let request: CalculateRequest = parse_connect(&body)?;
    let settlement = state
        .rounds
        .play(&request, &trace_context(&headers))
        .await
        .map_err(|error| ConnectError {
            code: error.connect_code(),
            message: error.to_string(),
        })?;
    Ok(Json(ConnectCalculateResponse::from(&settlement.to_response())))
}

async fn connect_business_metrics_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BusinessMetricsResponse>, ConnectError> {
    let request: BusinessMetricsRequest = parse_connect(&body)?;
    Ok(Json(state.rounds.track_business_metrics(&request)))
}

#[derive(Debug)]
struct ConnectError {
    code: ConnectCode,
    message: String,
}

impl IntoResponse for ConnectError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(status = %status, code = ?self.code, message = %self.message, "connect request failed");
        (
            status,
            Json(ConnectErrorBody {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business_metrics::testing::{recorder, sample};
    use crate::round::tests::{RecordingPublisher, engine, service_with};
    use axum::http::HeaderValue;

    fn app_state(win_probability: f64) -> (AppState, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let state = AppState {
            rounds: service_with(engine(win_probability), publisher.clone()),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
        };
        (state, publisher)
    }

    async fn body_json(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn router_builds_with_every_surface_combination() {
        for (rest, connect) in [(true, true), (true, false), (false, true), (false, false)] {
            let (state, _) = app_state(0.3);
            let _ = build_router(state, rest, connect);
        }
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let Json(body) = health().await;
        assert_eq!(body, serde_json::json!({"ok": true, "service": "game-engine-service"}));
    }

    #[test]
    fn trace_context_keeps_known_non_empty_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("sentry-trace", HeaderValue::from_static("abc-def-1"));
        headers.insert("baggage", HeaderValue::from_static("  "));
        headers.insert("x-unrelated", HeaderValue::from_static("ignored"));

        let trace = trace_context(&headers);
        assert_eq!(trace.len(), 1);
        assert_eq!(trace.get("sentry-trace").unwrap(), "abc-def-1");
    }

    #[tokio::test]
    async fn rest_calculate_settles_and_propagates_trace() {
        let (state, publisher) = app_state(1.0);
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static("00-abc-def-01"));

        let (status, Json(response)) = calculate_handler(
            State(state),
            headers,
            Ok(Json(CalculateRequest {
                user_id: "alice".to_string(),
                bet: 10.0,
                cpu_intensive: false,
            })),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(response.win);
        assert_eq!(response.symbols.len(), 3);
        assert!(response.error.is_none());
        assert_eq!(response.new_balance, 1000.0 - 10.0 + response.payout);
        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].trace.get("traceparent").unwrap(), "00-abc-def-01");
    }

    #[tokio::test]
    async fn rest_calculate_rejects_negative_bet() {
        let (state, publisher) = app_state(0.3);
        let (status, Json(response)) = calculate_handler(
            State(state),
            HeaderMap::new(),
            Ok(Json(CalculateRequest {
                user_id: "alice".to_string(),
                bet: -5.0,
                cpu_intensive: false,
            })),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response.error.unwrap().contains("-5"));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_calculate_speaks_camel_case() {
        let (state, _) = app_state(0.0);
        let body = Bytes::from_static(br#"{"userId": "alice", "bet": 10, "cpuIntensive": false}"#);
        let response = connect_calculate_handler(State(state), HeaderMap::new(), body)
            .await
            .unwrap()
            .into_response();

        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["win"], false);
        assert_eq!(json["newBalance"], 990.0);
        assert!(json.get("new_balance").is_none());
        assert!(json.get("wageringProgress").is_none());
    }

    #[tokio::test]
    async fn connect_and_rest_requests_parse_identically() {
        let camel: CalculateRequest =
            parse_connect(br#"{"userId": "u1", "bet": 2.5, "cpuIntensive": true}"#).unwrap();
        let snake: CalculateRequest =
            parse_connect(br#"{"user_id": "u1", "bet": 2.5, "cpu_intensive": true}"#).unwrap();
        assert_eq!(camel, snake);
    }

    #[tokio::test]
    async fn connect_errors_use_code_and_message() {
        let (state, _) = app_state(0.3);
        let response = connect_calculate_handler(
            State(state.clone()),
            HeaderMap::new(),
            Bytes::from_static(b"{not json"),
        )
        .await
        .unwrap_err()
        .into_response();
        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_argument");

        let response = connect_calculate_handler(
            State(state),
            HeaderMap::new(),
            Bytes::from_static(br#"{"userId": "alice", "bet": -1}"#),
        )
        .await
        .unwrap_err()
        .into_response();
        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_argument");
        assert!(json["message"].as_str().unwrap().contains("bet"));
    }

    #[tokio::test]
    async fn connect_business_metrics_defaults_to_normal() {
        let (state, _) = app_state(0.3);
        let Json(response) = connect_business_metrics_handler(State(state), Bytes::new())
            .await
            .unwrap();
        assert_eq!(response.status, "Normal metrics tracked");
    }

    #[tokio::test]
    async fn rest_business_metrics_flattens_scenario_data() {
        let (state, _) = app_state(0.3);
        let Json(response) = business_metrics_handler(
            State(state),
            Ok(Json(BusinessMetricsRequest {
                scenario: "session_surge".to_string(),
            })),
        )
        .await
        .unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "Session surge triggered");
        assert_eq!(json["normal"], 150);
        assert_eq!(json["surge"], 850);
    }

    #[tokio::test]
    async fn metrics_endpoint_counts_spins() {
        let (recorder, handle) = recorder();
        let _recording = metrics::set_default_local_recorder(&recorder);
        let (mut state, _) = app_state(0.0);
        state.metrics = handle.clone();
        calculate_handler(
            State(state.clone()),
            HeaderMap::new(),
            Ok(Json(CalculateRequest {
                user_id: "alice".to_string(),
                bet: 1.0,
                cpu_intensive: false,
            })),
        )
        .await
        .unwrap();

        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("# TYPE game_engine_spins_total counter"));
        assert!(text.contains("game_engine_bet_volume"));
        assert_eq!(sample(&handle, "game_engine_spins_total"), Some(1.0));
    }
}
