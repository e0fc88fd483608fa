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

//! Failure fixtures for exercising error reporting, memory and CPU alerts.
//! Compiled only with the `debug-endpoints` feature; nothing here touches
//! the game state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{error, info, warn};

const LEAK_CHUNK_BYTES: usize = 10 * 1024 * 1024;
const CPU_SPIKE_DURATION: Duration = Duration::from_secs(5);
const THREAD_COUNT: u64 = 3;
const FAILING_THREAD: u64 = 2;

#[derive(Clone)]
pub struct DebugState {
    leaked: Arc<Mutex<Vec<Vec<u8>>>>,
    spike_duration: Duration,
}

impl Default for DebugState {
    fn default() -> Self {
        Self {
            leaked: Arc::new(Mutex::new(Vec::new())),
            spike_duration: CPU_SPIKE_DURATION,
        }
    }
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/debug/crash", get(crash))
        .route("/debug/error/{kind}", get(trigger_error))
        .route("/debug/memory-leak", get(memory_leak))
        .route("/debug/infinite-loop", get(infinite_loop))
        .route("/debug/async-error", get(async_error))
        .route("/debug/threading-error", get(threading_error))
        .with_state(DebugState::default())
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("invalid literal for integer: {0}")]
    Value(#[from] std::num::ParseIntError),
    #[error("type mismatch: {0}")]
    Type(#[from] serde_json::Error),
    #[error("index {index} out of range for length {len}")]
    Index { index: usize, len: usize },
    #[error("missing key '{0}'")]
    Key(String),
    #[error("division by zero")]
    Zero,
    #[error("Custom game engine error for demo")]
    Custom,
    #[error("Unknown error type: {0}")]
    Unknown(String),
}

impl IntoResponse for DemoError {
    fn into_response(self) -> Response {
        let status = match self {
            DemoError::Unknown(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(status = %status, error = %self, "debug error triggered");
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

async fn crash() -> Json<serde_json::Value> {
    error!("debug crash endpoint hit");
    panic!("[DEMO] Game Engine crash triggered!");
}

async fn trigger_error(Path(kind): Path<String>) -> Result<Json<serde_json::Value>, DemoError> {
    warn!(kind = %kind, "triggering debug error");
    match kind.as_str() {
        "value" => {
            let parsed: i64 = "not_a_number".parse()?;
            Ok(Json(serde_json::json!({"parsed": parsed})))
        }
        "type" => {
            let items: Vec<u32> = serde_json::from_value(serde_json::json!({"key": "value"}))?;
            Ok(Json(serde_json::json!({"items": items})))
        }
        "index" => {
            let items = [1, 2, 3];
            let item = items.get(10).ok_or(DemoError::Index {
                index: 10,
                len: items.len(),
            })?;
            Ok(Json(serde_json::json!({"item": item})))
        }
        "key" => {
            let data = HashMap::from([("name", "test")]);
            let value = data
                .get("missing")
                .ok_or_else(|| DemoError::Key("missing".to_string()))?;
            Ok(Json(serde_json::json!({"value": value})))
        }
        "zero" => {
            let divisor = kind.len() as i64 - 4;
            let quotient = 100_i64.checked_div(divisor).ok_or(DemoError::Zero)?;
            Ok(Json(serde_json::json!({"quotient": quotient})))
        }
        "custom" => Err(DemoError::Custom),
        other => Err(DemoError::Unknown(other.to_string())),
    }
}

async fn memory_leak(State(state): State<DebugState>) -> Json<serde_json::Value> {
    let mut leaked = state
        .leaked
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    leaked.push(vec![b'X'; LEAK_CHUNK_BYTES]);
    let total_leaked_mb = leaked.len() * LEAK_CHUNK_BYTES / (1024 * 1024);
    warn!(
        leaked_items = leaked.len(),
        total_leaked_mb, "memory leak demo grew retained buffers"
    );
    Json(serde_json::json!({
        "status": "Memory leak created",
        "leaked_items": leaked.len(),
        "total_leaked_mb": total_leaked_mb,
    }))
}

fn burn_cpu(duration: Duration) -> u64 {
    let started = Instant::now();
    let mut iterations = 0_u64;
    while started.elapsed() < duration {
        for i in 0..10_000_u64 {
            let square_sum: u64 = (0..100_u64).map(|j| j * j).sum();
            let x = i as f64;
            std::hint::black_box((square_sum, x.sin() * x.cos()));
        }
        iterations += 10_000;
    }
    iterations
}

async fn infinite_loop(
    State(state): State<DebugState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    warn!(duration_ms = state.spike_duration.as_millis() as u64, "starting CPU spike demo");
    let duration = state.spike_duration;
    let iterations = tokio::task::spawn_blocking(move || burn_cpu(duration))
        .await
        .map_err(|error| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("CPU spike task failed: {error}")})),
            )
        })?;
    info!(iterations, "CPU spike demo completed");
    Ok(Json(serde_json::json!({
        "status": "CPU spike completed",
        "duration_seconds": duration.as_secs_f64(),
        "iterations": iterations,
    })))
}

async fn async_error() -> Json<serde_json::Value> {
    let succeeding = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, anyhow::Error>("Success")
    };
    let failing = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Err::<&str, _>(anyhow::anyhow!("Async task failed in coroutine"))
    };
    let timing_out = async {
        tokio::time::timeout(
            Duration::from_millis(500),
            tokio::time::sleep(Duration::from_secs(10)),
        )
        .await
        .map(|()| "finished")
        .map_err(|_| anyhow::anyhow!("Async operation timed out"))
    };

    let results = tokio::join!(succeeding, failing, timing_out);
    let mut failures = 0;
    for result in [results.0, results.1, results.2] {
        if let Err(error) = result {
            failures += 1;
            error!(error = %error, "async demo task failed");
        }
    }
    Json(serde_json::json!({
        "status": "Async demo completed",
        "failures": failures,
    }))
}

fn run_threads() -> (usize, usize) {
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|thread_id| {
            std::thread::spawn(move || -> anyhow::Result<()> {
                std::thread::sleep(Duration::from_millis(100 * thread_id));
                if thread_id == FAILING_THREAD {
                    anyhow::bail!("Thread {thread_id} encountered an error");
                }
                Ok(())
            })
        })
        .collect();

    let created = handles.len();
    let mut failures = 0;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                failures += 1;
                error!(error = %error, "threading demo worker failed");
            }
            Err(_) => {
                failures += 1;
                error!("threading demo worker panicked");
            }
        }
    }
    (created, failures)
}

async fn threading_error() -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)>
{
    let (created, failures) = tokio::task::spawn_blocking(run_threads)
        .await
        .map_err(|error| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": format!("threading demo failed: {error}")})),
            )
        })?;
    Ok(Json(serde_json::json!({
        "status": "Threading demo completed",
        "threads_created": created,
        "failures": failures,
    })))
}
