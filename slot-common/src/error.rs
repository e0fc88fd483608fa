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

use thiserror::Error;

use crate::symbols::Symbol;

/// Malformed engine configuration. Raised while building the symbol table or
/// the outcome engine, never while spinning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("symbol table is empty")]
    EmptyTable,

    #[error("symbol table total weight is zero")]
    ZeroTotalWeight,

    #[error("symbol table total weight exceeds {max}")]
    TotalWeightTooLarge { max: u32 },

    #[error("symbol {0} has zero weight")]
    ZeroWeight(Symbol),

    #[error("symbol {0} has zero multiplier")]
    ZeroMultiplier(Symbol),

    #[error("symbol {0} is configured more than once")]
    DuplicateSymbol(Symbol),

    #[error("symbol table needs at least 2 distinct symbols, found {0}")]
    TooFewSymbols(usize),

    #[error("symbol {0} is not configured")]
    UnknownSymbol(Symbol),

    #[error("win probability {0} must be within [0, 1]")]
    InvalidWinProbability(f64),

    #[error("heavy strategy needs at least 3 primes, got {0}")]
    TooFewHeavyPrimes(usize),

    #[error("heavy strategy needs a non-zero iteration count")]
    ZeroHeavyIterations,

    #[error("invalid symbol table yaml: {0}")]
    Yaml(String),
}

/// Caller input rejected before any draw or side effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("bet must be a non-negative number, got {0}")]
    InvalidBet(f64),

    #[error("user_id is required")]
    MissingUserId,
}

/// The heavy strategy observed its cancel flag and stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("spin cancelled before completion")]
pub struct SpinCancelled;

/// Failure of the core round boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cancelled(#[from] SpinCancelled),
}
