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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::Strategy;
use crate::round::{GameRound, SpinRequest};
use crate::symbols::Symbol;

/// Propagated tracing headers (`traceparent`, `sentry-trace`, `baggage`, ...).
pub type TraceContext = BTreeMap<String, String>;

/// Spin input. Accepts both the REST (snake_case) and the Connect
/// (camelCase) spelling of every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CalculateRequest {
    #[serde(default, alias = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub bet: f64,
    #[serde(default, alias = "cpuIntensive")]
    pub cpu_intensive: bool,
}

impl CalculateRequest {
    pub fn to_spin_request(&self) -> SpinRequest {
        SpinRequest {
            user_id: self.user_id.clone(),
            bet: self.bet,
            strategy: Strategy::from_cpu_intensive(self.cpu_intensive),
        }
    }
}

/// REST spin response. A failed spin carries `error` and zeroed fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CalculateResponse {
    pub win: bool,
    pub payout: f64,
    pub symbols: Vec<Symbol>,
    pub new_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wagering_progress: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CalculateResponse {
    pub fn settled(
        round: &GameRound,
        new_balance: f64,
        wagering_progress: Option<serde_json::Value>,
    ) -> Self {
        Self {
            win: round.outcome.win,
            payout: round.payout,
            symbols: round.outcome.symbols.to_vec(),
            new_balance,
            wagering_progress,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWageringProgress {
    pub progress_percent: f64,
    pub remaining: f64,
    pub can_convert: bool,
}

impl ConnectWageringProgress {
    /// Reads the wager service's snake_case progress object; missing fields
    /// default to zero/false.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self {
            progress_percent: value
                .get("progress_percent")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or_default(),
            remaining: value
                .get("remaining")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or_default(),
            can_convert: value
                .get("can_convert")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or_default(),
        }
    }
}

/// Connect (camelCase) spin response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectCalculateResponse {
    pub win: bool,
    pub payout: f64,
    pub symbols: Vec<Symbol>,
    pub new_balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wagering_progress: Option<ConnectWageringProgress>,
}

impl From<&CalculateResponse> for ConnectCalculateResponse {
    fn from(response: &CalculateResponse) -> Self {
        Self {
            win: response.win,
            payout: response.payout,
            symbols: response.symbols.clone(),
            new_balance: response.new_balance,
            wagering_progress: response
                .wagering_progress
                .as_ref()
                .map(ConnectWageringProgress::from_value),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectCode {
    InvalidArgument,
    Internal,
}

impl ConnectCode {
    pub fn http_status(self) -> u16 {
        match self {
            ConnectCode::InvalidArgument => 400,
            ConnectCode::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectErrorBody {
    pub code: ConnectCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusinessScenario {
    RtpAnomaly,
    SessionSurge,
    WinRateManipulation,
    Normal,
}

impl BusinessScenario {
    /// Unknown scenario names run the normal scenario.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "rtp_anomaly" => BusinessScenario::RtpAnomaly,
            "session_surge" => BusinessScenario::SessionSurge,
            "win_rate_manipulation" => BusinessScenario::WinRateManipulation,
            _ => BusinessScenario::Normal,
        }
    }
}

fn default_scenario() -> String {
    "normal".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessMetricsRequest {
    #[serde(default = "default_scenario")]
    pub scenario: String,
}

impl Default for BusinessMetricsRequest {
    fn default() -> Self {
        Self {
            scenario: default_scenario(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BusinessMetricsResponse {
    pub status: String,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Message published for every settled round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRoundEvent {
    pub data: GameRound,
    pub trace: TraceContext,
    pub timestamp: DateTime<Utc>,
}

impl GameRoundEvent {
    pub fn new(round: &GameRound, trace: &TraceContext) -> Self {
        Self {
            data: round.clone(),
            trace: trace.clone(),
            timestamp: round.timestamp,
        }
    }
}
