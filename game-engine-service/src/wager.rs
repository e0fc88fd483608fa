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

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::ports::{PlacedWager, WagerResult, WagerService};

const WAGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Bonus-wagering service over HTTP. A non-success status means "no wager"
/// rather than an error; transport failures are errors.
#[derive(Clone)]
pub struct HttpWagerService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWagerService {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("WAGER_SERVICE_URL")
            .ok()
            .unwrap_or_else(|| "http://wager-service:8085".to_string());
        let client = reqwest::Client::builder()
            .timeout(WAGER_TIMEOUT)
            .build()
            .context("failed to build wager service client")?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to call wager service {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response body unavailable>".to_string());
            warn!(%status, body = %body, path = %path, "wager service rejected request");
            return Ok(None);
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .with_context(|| format!("invalid wager service response from {path}"))?;
        Ok(Some(body))
    }
}

fn placed_wager(body: serde_json::Value) -> PlacedWager {
    PlacedWager {
        wager_id: body
            .get("wager_id")
            .and_then(|value| match value {
                serde_json::Value::String(id) => Some(id.clone()),
                serde_json::Value::Number(id) => Some(id.to_string()),
                _ => None,
            }),
        wagering_progress: body
            .get("wagering_progress")
            .filter(|value| !value.is_null())
            .cloned(),
    }
}

#[async_trait]
impl WagerService for HttpWagerService {
    async fn validate_wager(
        &self,
        user_id: &str,
        amount: f64,
        game_id: &str,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        self.post_json(
            "wager/validate",
            serde_json::json!({
                "user_id": user_id,
                "amount": amount,
                "game_id": game_id
            }),
        )
        .await
    }

    async fn place_wager(
        &self,
        validation: &serde_json::Value,
        result: WagerResult,
        payout: f64,
    ) -> anyhow::Result<Option<PlacedWager>> {
        let body = self
            .post_json(
                "wager/place",
                serde_json::json!({
                    "validation_data": validation,
                    "game_result": result,
                    "payout": payout
                }),
            )
            .await?;
        Ok(body.map(|body| {
            let placed = placed_wager(body);
            info!(
                wager_id = placed.wager_id.as_deref().unwrap_or("none"),
                "wager placed"
            );
            placed
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placed_wager_reads_id_and_progress() {
        let placed = placed_wager(serde_json::json!({
            "wager_id": "w-1",
            "wagering_progress": {"progress_percent": 40.0, "remaining": 60.0, "can_convert": false}
        }));
        assert_eq!(placed.wager_id.as_deref(), Some("w-1"));
        assert_eq!(
            placed.wagering_progress.unwrap()["remaining"],
            serde_json::json!(60.0)
        );
    }

    #[test]
    fn placed_wager_treats_null_progress_as_absent() {
        let placed = placed_wager(serde_json::json!({"wager_id": 7, "wagering_progress": null}));
        assert_eq!(placed.wager_id.as_deref(), Some("7"));
        assert!(placed.wagering_progress.is_none());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let service = HttpWagerService {
            client: reqwest::Client::new(),
            base_url: "http://wager:8085/".to_string(),
        };
        assert_eq!(service.endpoint("wager/place"), "http://wager:8085/wager/place");
    }
}
