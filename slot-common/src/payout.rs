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

use crate::engine::Outcome;
use crate::error::ValidationError;

/// Amount credited for a spin and its net effect on the balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payout {
    pub amount: f64,
    pub balance_change: f64,
}

pub fn validate_bet(bet: f64) -> Result<f64, ValidationError> {
    if bet.is_finite() && bet >= 0.0 {
        Ok(bet)
    } else {
        Err(ValidationError::InvalidBet(bet))
    }
}

/// `bet * multiplier` on a win, zero otherwise.
pub fn payout(bet: f64, outcome: &Outcome) -> Result<Payout, ValidationError> {
    let bet = validate_bet(bet)?;
    let amount = if outcome.win {
        bet * f64::from(outcome.multiplier)
    } else {
        0.0
    };
    Ok(Payout {
        amount,
        balance_change: amount - bet,
    })
}
