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

//! Collaborator contracts of the round orchestrator. Every adapter lives
//! behind one of these traits so the service can run against in-memory
//! fakes, DynamoDB/Kafka, or test recorders.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slot_common::{GameRound, GameRoundEvent, RollingStats, SessionStats};

#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Stores the round and returns it with its assigned id.
    async fn save(&self, round: &GameRound) -> anyhow::Result<GameRound>;
    async fn session_stats(
        &self,
        user_id: &str,
        hours: u32,
    ) -> anyhow::Result<Option<SessionStats>>;
    async fn rolling_stats(&self, hours: u32) -> anyhow::Result<Option<RollingStats>>;
}

#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Current balance; an unknown user is created with the default balance.
    async fn get_balance(&self, user_id: &str) -> anyhow::Result<f64>;
    /// Applies `payout - bet` and returns the new balance.
    async fn update_balance(&self, user_id: &str, bet: f64, payout: f64) -> anyhow::Result<f64>;
}

#[async_trait]
pub trait GameEventPublisher: Send + Sync {
    async fn publish(&self, event: &GameRoundEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerResult {
    Win,
    Lose,
}

impl WagerResult {
    pub fn from_win(win: bool) -> Self {
        if win { WagerResult::Win } else { WagerResult::Lose }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWager {
    pub wager_id: Option<String>,
    pub wagering_progress: Option<serde_json::Value>,
}

/// Optional bonus-wagering integration. `None` means the user has nothing
/// to wager against; it is not an error.
#[async_trait]
pub trait WagerService: Send + Sync {
    async fn validate_wager(
        &self,
        user_id: &str,
        amount: f64,
        game_id: &str,
    ) -> anyhow::Result<Option<serde_json::Value>>;
    async fn place_wager(
        &self,
        validation: &serde_json::Value,
        result: WagerResult,
        payout: f64,
    ) -> anyhow::Result<Option<PlacedWager>>;
}
