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

use std::collections::{HashMap, HashSet};

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client as DynamoClient,
    types::{AttributeValue, ReturnValue},
};
use chrono::{Duration, SecondsFormat, Utc};
use slot_common::{GameRound, RollingStats, SessionStats};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ports::{BalanceRepository, GameRepository};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed rounds and balances. Only built when a DynamoDB endpoint
/// or an AWS region is configured.
#[derive(Clone)]
pub struct DynamoRepository {
    client: DynamoClient,
    rounds_table: String,
    balances_table: String,
    default_balance: f64,
}

impl DynamoRepository {
    pub async fn from_env(default_balance: f64) -> Option<Self> {
        if std::env::var("DYNAMODB_ENDPOINT").is_err() && std::env::var("AWS_REGION").is_err() {
            return None;
        }
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Ok(endpoint) = std::env::var("DYNAMODB_ENDPOINT") {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        let repository = Self {
            client: DynamoClient::new(&config),
            rounds_table: std::env::var("GAME_ROUNDS_TABLE")
                .ok()
                .unwrap_or_else(|| "game_rounds".to_string()),
            balances_table: std::env::var("USER_BALANCES_TABLE")
                .ok()
                .unwrap_or_else(|| "user_balances".to_string()),
            default_balance,
        };
        info!(
            rounds_table = %repository.rounds_table,
            balances_table = %repository.balances_table,
            "using DynamoDB repositories"
        );
        Some(repository)
    }

    /// Scans the rounds table page by page, returning every item that
    /// matches the filter.
    async fn scan_rounds(
        &self,
        filter: &str,
        values: &[(&str, AttributeValue)],
    ) -> anyhow::Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.rounds_table)
                .filter_expression(filter)
                .expression_attribute_names("#ts", "timestamp")
                .set_exclusive_start_key(start_key.take());
            for (name, value) in values {
                request = request.expression_attribute_values(*name, value.clone());
            }
            let output = request
                .send()
                .await
                .context("failed to scan game_rounds table")?;
            items.extend(output.items.unwrap_or_default());
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn reset_balance(&self, user_id: &str, balance: f64) -> anyhow::Result<()> {
        self.client
            .update_item()
            .table_name(&self.balances_table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression("SET balance = :balance, updated_at = :updated_at")
            .expression_attribute_values(":balance", number(balance))
            .expression_attribute_values(":updated_at", AttributeValue::S(timestamp_now()))
            .send()
            .await
            .context("failed to reset user balance")?;
        Ok(())
    }
}

fn number(value: f64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn read_number(item: &Item, key: &str) -> Option<f64> {
    item.get(key)
        .and_then(|value| value.as_n().ok())
        .and_then(|value| value.parse().ok())
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn window_start(hours: u32) -> AttributeValue {
    AttributeValue::S(
        (Utc::now() - Duration::hours(i64::from(hours))).to_rfc3339_opts(SecondsFormat::Micros, true),
    )
}

fn round_item(round: &GameRound, id: &str) -> anyhow::Result<Item> {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(id.to_string()));
    item.insert(
        "user_id".to_string(),
        AttributeValue::S(round.user_id.clone()),
    );
    item.insert("bet".to_string(), number(round.bet));
    item.insert(
        "symbols".to_string(),
        AttributeValue::S(serde_json::to_string(&round.outcome.symbols)?),
    );
    item.insert("win".to_string(), AttributeValue::Bool(round.outcome.win));
    item.insert(
        "multiplier".to_string(),
        AttributeValue::N(round.outcome.multiplier.to_string()),
    );
    item.insert("payout".to_string(), number(round.payout));
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(round.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    Ok(item)
}

#[async_trait]
impl GameRepository for DynamoRepository {
    async fn save(&self, round: &GameRound) -> anyhow::Result<GameRound> {
        let id = Uuid::new_v4().to_string();
        self.client
            .put_item()
            .table_name(&self.rounds_table)
            .set_item(Some(round_item(round, &id)?))
            .send()
            .await
            .context("failed to put item into game_rounds table")?;
        Ok(round.clone().with_id(id))
    }

    async fn session_stats(
        &self,
        user_id: &str,
        hours: u32,
    ) -> anyhow::Result<Option<SessionStats>> {
        let items = self
            .scan_rounds(
                "user_id = :user_id AND #ts >= :since",
                &[
                    (":user_id", AttributeValue::S(user_id.to_string())),
                    (":since", window_start(hours)),
                ],
            )
            .await?;
        if items.is_empty() {
            return Ok(None);
        }
        let mut stats = SessionStats::default();
        for item in &items {
            stats.total_bets += read_number(item, "bet").unwrap_or_default();
            stats.total_payouts += read_number(item, "payout").unwrap_or_default();
            stats.count += 1;
        }
        Ok(Some(stats))
    }

    async fn rolling_stats(&self, hours: u32) -> anyhow::Result<Option<RollingStats>> {
        let items = self
            .scan_rounds("#ts >= :since", &[(":since", window_start(hours))])
            .await?;
        if items.is_empty() {
            return Ok(None);
        }
        let mut stats = RollingStats::default();
        let mut players = HashSet::new();
        for item in &items {
            stats.total_bets += read_number(item, "bet").unwrap_or_default();
            stats.total_payouts += read_number(item, "payout").unwrap_or_default();
            stats.count += 1;
            if let Some(user_id) = item.get("user_id").and_then(|value| value.as_s().ok()) {
                players.insert(user_id.clone());
            }
        }
        stats.unique_players = players.len() as u64;
        Ok(Some(stats))
    }
}

#[async_trait]
impl BalanceRepository for DynamoRepository {
    async fn get_balance(&self, user_id: &str) -> anyhow::Result<f64> {
        let output = self
            .client
            .get_item()
            .table_name(&self.balances_table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .context("failed to read user balance")?;
        if let Some(item) = output.item {
            return Ok(read_number(&item, "balance").unwrap_or(self.default_balance));
        }

        let mut item = HashMap::new();
        item.insert("user_id".to_string(), AttributeValue::S(user_id.to_string()));
        item.insert("balance".to_string(), number(self.default_balance));
        item.insert("created_at".to_string(), AttributeValue::S(timestamp_now()));
        self.client
            .put_item()
            .table_name(&self.balances_table)
            .set_item(Some(item))
            .send()
            .await
            .context("failed to create user balance")?;
        Ok(self.default_balance)
    }

    async fn update_balance(&self, user_id: &str, bet: f64, payout: f64) -> anyhow::Result<f64> {
        let output = self
            .client
            .update_item()
            .table_name(&self.balances_table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression(
                "SET balance = if_not_exists(balance, :default) + :delta, updated_at = :updated_at",
            )
            .expression_attribute_values(":default", number(self.default_balance))
            .expression_attribute_values(":delta", number(payout - bet))
            .expression_attribute_values(":updated_at", AttributeValue::S(timestamp_now()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .context("failed to update user balance")?;

        let balance = output
            .attributes
            .as_ref()
            .and_then(|attributes| read_number(attributes, "balance"));
        match balance {
            Some(balance) if balance >= 0.0 => Ok(balance),
            _ => {
                let reset = self.default_balance - bet + payout;
                warn!(user_id = %user_id, balance = ?balance, reset, "resetting user balance");
                self.reset_balance(user_id, reset).await?;
                Ok(reset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slot_common::{Outcome, Symbol, SymbolTable};

    #[test]
    fn round_item_stores_numbers_and_glyphs() {
        let table = SymbolTable::reference();
        let round = GameRound {
            id: None,
            user_id: "alice".to_string(),
            bet: 10.0,
            outcome: Outcome::winning(Symbol::Lemon, &table),
            payout: 30.0,
            timestamp: Utc::now(),
        };
        let item = round_item(&round, "round-1").unwrap();
        assert_eq!(item.get("id"), Some(&AttributeValue::S("round-1".to_string())));
        assert_eq!(read_number(&item, "bet"), Some(10.0));
        assert_eq!(read_number(&item, "payout"), Some(30.0));
        assert_eq!(item.get("multiplier"), Some(&AttributeValue::N("3".to_string())));
        assert_eq!(item.get("win"), Some(&AttributeValue::Bool(true)));
        assert_eq!(
            item.get("symbols"),
            Some(&AttributeValue::S("[\"🍋\",\"🍋\",\"🍋\"]".to_string()))
        );
    }

    #[test]
    fn read_number_ignores_non_numeric_attributes() {
        let mut item = HashMap::new();
        item.insert("balance".to_string(), AttributeValue::S("oops".to_string()));
        assert_eq!(read_number(&item, "balance"), None);
        assert_eq!(read_number(&item, "missing"), None);
    }
}
