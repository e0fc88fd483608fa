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

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use slot_common::{GameRound, ROLLING_STATS_WINDOW_HOURS, RollingStats, SessionStats};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ports::{BalanceRepository, GameRepository};

/// Rounds are kept in save order and only for as long as the widest stats
/// window can see them.
#[derive(Default)]
struct InMemoryStore {
    rounds: VecDeque<GameRound>,
    balances: HashMap<String, f64>,
}

impl InMemoryStore {
    fn retain_since(&mut self, cutoff: DateTime<Utc>) {
        while self
            .rounds
            .front()
            .is_some_and(|round| round.timestamp < cutoff)
        {
            self.rounds.pop_front();
        }
    }
}

/// Process-local rounds and balances. Used when no DynamoDB endpoint is
/// configured and by tests.
#[derive(Clone)]
pub struct InMemoryRepository {
    store: Arc<RwLock<InMemoryStore>>,
    default_balance: f64,
}

impl InMemoryRepository {
    pub fn new(default_balance: f64) -> Self {
        Self {
            store: Arc::new(RwLock::new(InMemoryStore::default())),
            default_balance,
        }
    }

    #[cfg(test)]
    async fn retained_rounds(&self) -> usize {
        self.store.read().await.rounds.len()
    }
}

fn window_start(hours: u32) -> DateTime<Utc> {
    Utc::now() - Duration::hours(i64::from(hours))
}

#[async_trait]
impl GameRepository for InMemoryRepository {
    async fn save(&self, round: &GameRound) -> anyhow::Result<GameRound> {
        let saved = round.clone().with_id(Uuid::new_v4().to_string());
        let cutoff = window_start(ROLLING_STATS_WINDOW_HOURS);
        let mut store = self.store.write().await;
        store.retain_since(cutoff);
        if saved.timestamp >= cutoff {
            store.rounds.push_back(saved.clone());
        }
        Ok(saved)
    }

    async fn session_stats(
        &self,
        user_id: &str,
        hours: u32,
    ) -> anyhow::Result<Option<SessionStats>> {
        let since = window_start(hours);
        let store = self.store.read().await;
        let stats = store
            .rounds
            .iter()
            .filter(|round| round.user_id == user_id && round.timestamp >= since)
            .fold(SessionStats::default(), |mut stats, round| {
                stats.total_bets += round.bet;
                stats.total_payouts += round.payout;
                stats.count += 1;
                stats
            });
        Ok((stats.count > 0).then_some(stats))
    }

    async fn rolling_stats(&self, hours: u32) -> anyhow::Result<Option<RollingStats>> {
        let since = window_start(hours);
        let store = self.store.read().await;
        let mut stats = RollingStats::default();
        let mut players = HashSet::new();
        for round in store.rounds.iter().filter(|round| round.timestamp >= since) {
            stats.total_bets += round.bet;
            stats.total_payouts += round.payout;
            stats.count += 1;
            players.insert(round.user_id.as_str());
        }
        stats.unique_players = players.len() as u64;
        Ok((stats.count > 0).then_some(stats))
    }
}

#[async_trait]
impl BalanceRepository for InMemoryRepository {
    async fn get_balance(&self, user_id: &str) -> anyhow::Result<f64> {
        let mut store = self.store.write().await;
        Ok(*store
            .balances
            .entry(user_id.to_string())
            .or_insert(self.default_balance))
    }

    async fn update_balance(&self, user_id: &str, bet: f64, payout: f64) -> anyhow::Result<f64> {
        let mut store = self.store.write().await;
        let balance = store
            .balances
            .entry(user_id.to_string())
            .or_insert(self.default_balance);
        *balance += payout - bet;
        if *balance < 0.0 {
            *balance = self.default_balance - bet + payout;
        }
        Ok(*balance)
    }
}
