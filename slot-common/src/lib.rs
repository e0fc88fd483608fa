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

//! Slot outcome and payout core shared by the game-engine service.
//!
//! Everything here is synchronous and free of I/O. The symbol table and
//! outcome engine are immutable once built, so one instance can serve any
//! number of concurrent spins.

pub mod dto;
pub mod engine;
pub mod error;
pub mod payout;
pub mod round;
pub mod symbols;

use regex::Regex;

pub use crate::dto::{
    BusinessMetricsRequest, BusinessMetricsResponse, BusinessScenario, CalculateRequest,
    CalculateResponse, ConnectCalculateResponse, ConnectCode, ConnectErrorBody,
    ConnectWageringProgress, GameRoundEvent, TraceContext,
};
pub use crate::engine::{
    DEFAULT_WIN_PROBABILITY, HeavySettings, Outcome, OutcomeEngine, Strategy, primes_from,
};
pub use crate::error::{ConfigError, RoundError, SpinCancelled, ValidationError};
pub use crate::payout::{Payout, payout, validate_bet};
pub use crate::round::{
    GameRound, RollingStats, SessionStats, SpinRequest, play_round, rtp_percent,
};
pub use crate::symbols::{
    ALL_SYMBOLS, MAX_TOTAL_WEIGHT, Symbol, SymbolSpec, SymbolTable, WeightedSymbolPool,
};

pub const DEFAULT_BALANCE: f64 = 1000.0;
pub const SLOT_GAME_ID: &str = "slot-machine";
pub const SESSION_STATS_WINDOW_HOURS: u32 = 1;
pub const ROLLING_STATS_WINDOW_HOURS: u32 = 24;

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_vars_leaves_plain_text_alone() {
        assert_eq!(expand_env_vars("weight: 30"), "weight: 30");
    }

    #[test]
    fn expand_env_vars_blanks_unset_variables() {
        assert_eq!(
            expand_env_vars("weight: ${SLOT_COMMON_TEST_SURELY_UNSET_VAR}"),
            "weight: "
        );
    }

    #[test]
    fn expand_env_vars_substitutes_set_variables() {
        // PATH is present in any test environment.
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("p=${PATH}"), format!("p={path}"));
    }
}
