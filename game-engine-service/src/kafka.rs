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

use anyhow::Context;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    message::{Header, OwnedHeaders},
    producer::{FutureProducer, FutureRecord},
};
use slot_common::{GameRoundEvent, TraceContext};

use crate::ports::GameEventPublisher;

#[derive(Clone)]
pub struct KafkaGameEventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaGameEventPublisher {
    pub fn from_env() -> anyhow::Result<Self> {
        let bootstrap_servers = std::env::var("KAFKA_BOOTSTRAP_SERVERS")
            .ok()
            .unwrap_or_else(|| "kafka:9092".to_string());
        let producer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .context("failed to create Kafka game-result producer")?;
        Ok(Self {
            producer,
            topic: std::env::var("GAME_RESULTS_TOPIC")
                .ok()
                .unwrap_or_else(|| "gaming.game_results".to_string()),
        })
    }
}

fn trace_headers(trace: &TraceContext) -> OwnedHeaders {
    trace
        .iter()
        .fold(OwnedHeaders::new(), |headers, (key, value)| {
            headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            })
        })
}

#[async_trait]
impl GameEventPublisher for KafkaGameEventPublisher {
    async fn publish(&self, event: &GameRoundEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event).context("failed to encode game result")?;
        self.producer
            .send(
                FutureRecord::to(&self.topic)
                    .key(&event.data.user_id)
                    .payload(&payload)
                    .headers(trace_headers(&event.trace)),
                std::time::Duration::from_secs(5),
            )
            .await
            .map_err(|(error, _)| anyhow::anyhow!("Kafka publish failed: {error:?}"))?;
        Ok(())
    }
}

/// Publisher used when Kafka is switched off with `KAFKA_ENABLED=false`.
pub struct LogOnlyPublisher;

#[async_trait]
impl GameEventPublisher for LogOnlyPublisher {
    async fn publish(&self, event: &GameRoundEvent) -> anyhow::Result<()> {
        tracing::debug!(
            user_id = %event.data.user_id,
            round_id = event.data.id.as_deref().unwrap_or("none"),
            win = event.data.outcome.win,
            "game result not published; Kafka disabled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::Headers;

    #[test]
    fn trace_context_becomes_message_headers() {
        let mut trace = TraceContext::new();
        trace.insert("baggage".to_string(), "sentry-release=1".to_string());
        trace.insert("traceparent".to_string(), "00-abc-def-01".to_string());

        let headers = trace_headers(&trace);
        assert_eq!(headers.count(), 2);
        let first = headers.get(0);
        assert_eq!(first.key, "baggage");
        assert_eq!(first.value, Some("sentry-release=1".as_bytes()));
    }
}
