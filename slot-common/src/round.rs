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

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::{Outcome, OutcomeEngine, Strategy};
use crate::error::{RoundError, ValidationError};
use crate::payout::{payout, validate_bet};

/// Normalized spin input, independent of the edge's field naming.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinRequest {
    pub user_id: String,
    pub bet: f64,
    pub strategy: Strategy,
}

/// One settled spin. Persistence assigns `id`; nothing else changes after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameRound {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub bet: f64,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub payout: f64,
    pub timestamp: DateTime<Utc>,
}

impl GameRound {
    pub fn balance_change(&self) -> f64 {
        self.payout - self.bet
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Validates the request, draws an outcome and prices it. Nothing is
/// drawn for an invalid request.
pub fn play_round<R: Rng + ?Sized>(
    engine: &OutcomeEngine,
    request: &SpinRequest,
    rng: &mut R,
    cancel: &AtomicBool,
) -> Result<GameRound, RoundError> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(ValidationError::MissingUserId.into());
    }
    let bet = validate_bet(request.bet)?;

    let outcome = engine.spin(request.strategy, rng, cancel)?;
    let payout = payout(bet, &outcome)?;

    Ok(GameRound {
        id: None,
        user_id: user_id.to_string(),
        bet,
        outcome,
        payout: payout.amount,
        timestamp: Utc::now(),
    })
}

/// Per-user totals over a time window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStats {
    pub total_bets: f64,
    pub total_payouts: f64,
    pub count: u64,
}

impl SessionStats {
    pub fn rtp(&self) -> f64 {
        rtp_percent(self.total_bets, self.total_payouts)
    }
}

/// Totals across every user over a time window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RollingStats {
    pub total_bets: f64,
    pub total_payouts: f64,
    pub count: u64,
    pub unique_players: u64,
}

impl RollingStats {
    pub fn rtp(&self) -> f64 {
        rtp_percent(self.total_bets, self.total_payouts)
    }
}

pub fn rtp_percent(total_bets: f64, total_payouts: f64) -> f64 {
    if total_bets > 0.0 {
        total_payouts / total_bets * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{Symbol, SymbolTable};
    use rand::{SeedableRng, rngs::StdRng};

    fn request(user_id: &str, bet: f64) -> SpinRequest {
        SpinRequest {
            user_id: user_id.to_string(),
            bet,
            strategy: Strategy::Normal,
        }
    }

    #[test]
    fn forced_win_round_settles_bet_times_multiplier() {
        let engine = OutcomeEngine::with_win_probability(SymbolTable::reference(), 1.0).unwrap();
        let cancel = AtomicBool::new(false);
        let round = play_round(
            &engine,
            &request("player-1", 10.0),
            &mut StdRng::seed_from_u64(1),
            &cancel,
        )
        .unwrap();

        assert!(round.outcome.win);
        let multiplier = engine.table().multiplier(round.outcome.symbols[0]);
        assert_eq!(round.payout, 10.0 * f64::from(multiplier));
        assert_eq!(round.balance_change(), round.payout - 10.0);
        assert_eq!(round.id, None);
        assert_eq!(round.user_id, "player-1");
    }

    #[test]
    fn forced_loss_round_loses_the_bet() {
        let engine = OutcomeEngine::with_win_probability(SymbolTable::reference(), 0.0).unwrap();
        let cancel = AtomicBool::new(false);
        let round = play_round(
            &engine,
            &request("player-1", 10.0),
            &mut StdRng::seed_from_u64(1),
            &cancel,
        )
        .unwrap();

        assert!(!round.outcome.win);
        assert_eq!(round.payout, 0.0);
        assert_eq!(round.balance_change(), -10.0);
    }

    #[test]
    fn negative_bet_is_a_validation_error() {
        let engine = OutcomeEngine::new(SymbolTable::reference()).unwrap();
        let cancel = AtomicBool::new(false);
        let result = play_round(
            &engine,
            &request("player-1", -5.0),
            &mut StdRng::seed_from_u64(1),
            &cancel,
        );
        assert_eq!(
            result,
            Err(RoundError::Validation(ValidationError::InvalidBet(-5.0)))
        );
    }

    #[test]
    fn blank_user_id_is_a_validation_error() {
        let engine = OutcomeEngine::new(SymbolTable::reference()).unwrap();
        let cancel = AtomicBool::new(false);
        let result = play_round(
            &engine,
            &request("   ", 10.0),
            &mut StdRng::seed_from_u64(1),
            &cancel,
        );
        assert_eq!(
            result,
            Err(RoundError::Validation(ValidationError::MissingUserId))
        );
    }

    #[test]
    fn round_serializes_outcome_fields_inline() {
        let table = SymbolTable::reference();
        let round = GameRound {
            id: None,
            user_id: "u".to_string(),
            bet: 2.0,
            outcome: Outcome::winning(Symbol::Star, &table),
            payout: 20.0,
            timestamp: Utc::now(),
        }
        .with_id("round-1");

        let value = serde_json::to_value(&round).unwrap();
        assert_eq!(value["id"], "round-1");
        assert_eq!(value["win"], true);
        assert_eq!(value["multiplier"], 10);
        assert_eq!(value["symbols"], serde_json::json!(["⭐", "⭐", "⭐"]));
    }

    #[test]
    fn rtp_is_zero_without_bets() {
        assert_eq!(SessionStats::default().rtp(), 0.0);
        let stats = RollingStats {
            total_bets: 200.0,
            total_payouts: 180.0,
            count: 20,
            unique_players: 3,
        };
        assert!((stats.rtp() - 90.0).abs() < 1e-9);
    }
}
