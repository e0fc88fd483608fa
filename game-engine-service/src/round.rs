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

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::http::StatusCode;
use slot_common::{
    BusinessMetricsRequest, BusinessMetricsResponse, BusinessScenario, CalculateRequest,
    CalculateResponse, ConnectCode, GameRound, GameRoundEvent, OutcomeEngine,
    ROLLING_STATS_WINDOW_HOURS, RoundError, SESSION_STATS_WINDOW_HOURS, SLOT_GAME_ID,
    SpinCancelled, SpinRequest, Strategy, TraceContext, ValidationError, play_round,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    business_metrics::{self, BusinessMetrics, MetricUnit},
    ports::{BalanceRepository, GameEventPublisher, GameRepository, WagerResult, WagerService},
};

#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {cause:#}")]
pub struct CollaboratorError {
    pub operation: &'static str,
    pub cause: anyhow::Error,
}

#[derive(Debug, thiserror::Error)]
pub enum SpinError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Cancelled(#[from] SpinCancelled),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("spin task failed: {0}")]
    Task(String),
}

impl From<RoundError> for SpinError {
    fn from(error: RoundError) -> Self {
        match error {
            RoundError::Validation(error) => SpinError::Validation(error),
            RoundError::Cancelled(error) => SpinError::Cancelled(error),
        }
    }
}

impl SpinError {
    pub fn status(&self) -> StatusCode {
        match self {
            SpinError::Validation(_) => StatusCode::BAD_REQUEST,
            SpinError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            SpinError::Collaborator(_) | SpinError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn connect_code(&self) -> ConnectCode {
        match self {
            SpinError::Validation(_) => ConnectCode::InvalidArgument,
            _ => ConnectCode::Internal,
        }
    }
}

/// A settled spin together with everything the edges report back.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinSettlement {
    pub round: GameRound,
    pub new_balance: f64,
    pub wagering_progress: Option<serde_json::Value>,
}

impl SpinSettlement {
    pub fn to_response(&self) -> CalculateResponse {
        CalculateResponse::settled(&self.round, self.new_balance, self.wagering_progress.clone())
    }
}

/// Raises the cancel flag when the request future is dropped so a heavy
/// spin on the blocking pool stops early.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

fn spin_inline(engine: &OutcomeEngine, request: &SpinRequest) -> Result<GameRound, RoundError> {
    let mut rng = rand::rng();
    play_round(engine, request, &mut rng, &AtomicBool::new(false))
}

#[derive(Clone)]
pub struct GameRoundService {
    engine: Arc<OutcomeEngine>,
    games: Arc<dyn GameRepository>,
    balances: Arc<dyn BalanceRepository>,
    publisher: Arc<dyn GameEventPublisher>,
    wager: Option<Arc<dyn WagerService>>,
    metrics: BusinessMetrics,
}

impl GameRoundService {
    pub fn new(
        engine: Arc<OutcomeEngine>,
        games: Arc<dyn GameRepository>,
        balances: Arc<dyn BalanceRepository>,
        publisher: Arc<dyn GameEventPublisher>,
        wager: Option<Arc<dyn WagerService>>,
    ) -> Self {
        Self {
            engine,
            games,
            balances,
            publisher,
            wager,
            metrics: BusinessMetrics::new(),
        }
    }

    /// Spin, then settle the round against every collaborator. Only an
    /// invalid request, a cancelled spin, or a failed balance update fail
    /// the call; the other collaborators are best effort.
    pub async fn play(
        &self,
        request: &CalculateRequest,
        trace: &TraceContext,
    ) -> Result<SpinSettlement, SpinError> {
        let result = self.settle(request.to_spin_request(), trace).await;
        if let Err(error) = &result {
            self.metrics.record_failure();
            warn!(
                user_id = %request.user_id,
                bet = request.bet,
                error = %error,
                "spin failed"
            );
        }
        result
    }

    /// Like [`play`](Self::play) but always yields a response body; failures
    /// carry `error` and zeroed fields.
    pub async fn execute(
        &self,
        request: &CalculateRequest,
        trace: &TraceContext,
    ) -> (StatusCode, CalculateResponse) {
        match self.play(request, trace).await {
            Ok(settlement) => (StatusCode::OK, settlement.to_response()),
            Err(error) => (error.status(), CalculateResponse::failed(error.to_string())),
        }
    }

    pub fn track_business_metrics(&self, request: &BusinessMetricsRequest) -> BusinessMetricsResponse {
        let scenario = BusinessScenario::parse(&request.scenario);
        let _span = info_span!("metrics.scenario", scenario = ?scenario).entered();
        self.metrics.run_scenario(scenario)
    }

    async fn settle(
        &self,
        request: SpinRequest,
        trace: &TraceContext,
    ) -> Result<SpinSettlement, SpinError> {
        let round = self.spin(request).await?;
        let round = self.persist(round).await;
        self.publish(&round, trace).await;
        self.track_round_metrics(&round).await;

        let new_balance = self
            .apply_balance(&round)
            .instrument(info_span!("db.balance", user_id = %round.user_id))
            .await?;

        let wagering_progress = self.integrate_wager(&round).await;

        info!(
            user_id = %round.user_id,
            round_id = round.id.as_deref().unwrap_or("none"),
            bet = round.bet,
            win = round.outcome.win,
            payout = round.payout,
            new_balance,
            "spin settled"
        );
        Ok(SpinSettlement {
            round,
            new_balance,
            wagering_progress,
        })
    }

    async fn spin(&self, request: SpinRequest) -> Result<GameRound, SpinError> {
        let strategy = self.engine.resolve(request.strategy);
        let span = info_span!("game.rng", strategy = strategy.as_str());
        if strategy != request.strategy {
            info!(parent: &span, "heavy strategy disabled; serving normal strategy");
        }

        let started = std::time::Instant::now();
        let round = match strategy {
            Strategy::Normal => {
                let _entered = span.enter();
                spin_inline(&self.engine, &request)?
            }
            Strategy::Heavy => {
                let cancel = Arc::new(AtomicBool::new(false));
                let _guard = CancelOnDrop(cancel.clone());
                let engine = self.engine.clone();
                let blocking_span = span.clone();
                tokio::task::spawn_blocking(move || {
                    let _entered = blocking_span.enter();
                    let mut rng = rand::rng();
                    play_round(&engine, &request, &mut rng, &cancel)
                })
                .await
                .map_err(|error| SpinError::Task(error.to_string()))??
            }
        };
        debug!(
            parent: &span,
            elapsed_ms = started.elapsed().as_millis() as u64,
            win = round.outcome.win,
            "outcome drawn"
        );
        Ok(round)
    }

    /// The pre-spin read is informational only; the update decides the spin.
    async fn apply_balance(&self, round: &GameRound) -> Result<f64, CollaboratorError> {
        let previous_balance = match self.balances.get_balance(&round.user_id).await {
            Ok(balance) => Some(balance),
            Err(error) => {
                warn!(user_id = %round.user_id, error = ?error, "failed to read balance before update");
                None
            }
        };
        let new_balance = self
            .balances
            .update_balance(&round.user_id, round.bet, round.payout)
            .await
            .map_err(|cause| CollaboratorError {
                operation: "balance update",
                cause,
            })?;
        debug!(
            user_id = %round.user_id,
            previous_balance,
            new_balance,
            balance_change = round.balance_change(),
            "balance updated"
        );
        Ok(new_balance)
    }

    async fn persist(&self, round: GameRound) -> GameRound {
        match self
            .games
            .save(&round)
            .instrument(info_span!("db.insert", user_id = %round.user_id))
            .await
        {
            Ok(saved) => saved,
            Err(error) => {
                warn!(user_id = %round.user_id, error = ?error, "failed to persist game round");
                round
            }
        }
    }

    async fn publish(&self, round: &GameRound, trace: &TraceContext) {
        let event = GameRoundEvent::new(round, trace);
        let span = info_span!("mq.publish", user_id = %round.user_id);
        match self.publisher.publish(&event).instrument(span).await {
            Ok(()) => debug!(user_id = %round.user_id, "game result published"),
            Err(error) => {
                warn!(user_id = %round.user_id, error = ?error, "failed to publish game result")
            }
        }
    }

    async fn track_round_metrics(&self, round: &GameRound) {
        let span = info_span!("metrics.track", user_id = %round.user_id);
        async {
            self.metrics
                .record_spin(round.outcome.win, round.bet, round.payout);
            self.metrics
                .track_metric(business_metrics::BET_VOLUME, round.bet, MetricUnit::Currency, &[]);
            self.metrics
                .track_metric(business_metrics::PAYOUT_VOLUME, round.payout, MetricUnit::Currency, &[]);
            let win_rate = if round.outcome.win { 100.0 } else { 0.0 };
            self.metrics
                .track_metric(business_metrics::WIN_RATE, win_rate, MetricUnit::Percent, &[]);

            match self
                .games
                .session_stats(&round.user_id, SESSION_STATS_WINDOW_HOURS)
                .await
            {
                Ok(Some(stats)) => {
                    self.metrics
                        .track_rtp(stats.total_bets, stats.total_payouts, "session");
                }
                Ok(None) => {}
                Err(error) => warn!(error = ?error, "failed to load session stats"),
            }

            match self.games.rolling_stats(ROLLING_STATS_WINDOW_HOURS).await {
                Ok(Some(stats)) => {
                    let rtp = self
                        .metrics
                        .track_rtp(stats.total_bets, stats.total_payouts, "24h");
                    self.metrics.track_with_anomaly_detection(
                        business_metrics::RTP_ROLLING,
                        rtp,
                        MetricUnit::Percent,
                        &[("period", "24h")],
                    );
                }
                Ok(None) => {}
                Err(error) => warn!(error = ?error, "failed to load rolling stats"),
            }
        }
        .instrument(span)
        .await
    }

    async fn integrate_wager(&self, round: &GameRound) -> Option<serde_json::Value> {
        let wager = self.wager.as_ref()?;
        let span = info_span!("wager.integrate", user_id = %round.user_id);
        async {
            let validation = match wager
                .validate_wager(&round.user_id, round.bet, SLOT_GAME_ID)
                .await
            {
                Ok(Some(validation)) => validation,
                Ok(None) => {
                    debug!("wager validation skipped or rejected");
                    return None;
                }
                Err(error) => {
                    warn!(error = ?error, "wager validation failed");
                    return None;
                }
            };
            match wager
                .place_wager(
                    &validation,
                    WagerResult::from_win(round.outcome.win),
                    round.payout,
                )
                .await
            {
                Ok(Some(placed)) => placed.wagering_progress,
                Ok(None) => None,
                Err(error) => {
                    warn!(error = ?error, "wager placement failed");
                    None
                }
            }
        }
        .instrument(span)
        .await
    }
}
