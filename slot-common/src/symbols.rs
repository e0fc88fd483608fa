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

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// All symbols in reference table order.
pub const ALL_SYMBOLS: [Symbol; 6] = [
    Symbol::Cherry,
    Symbol::Lemon,
    Symbol::Orange,
    Symbol::Grape,
    Symbol::Star,
    Symbol::Diamond,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    #[serde(rename = "🍒", alias = "cherry")]
    Cherry,
    #[serde(rename = "🍋", alias = "lemon")]
    Lemon,
    #[serde(rename = "🍊", alias = "orange")]
    Orange,
    #[serde(rename = "🍇", alias = "grape")]
    Grape,
    #[serde(rename = "⭐", alias = "star")]
    Star,
    #[serde(rename = "💎", alias = "diamond")]
    Diamond,
}

impl Symbol {
    pub fn glyph(self) -> &'static str {
        match self {
            Symbol::Cherry => "🍒",
            Symbol::Lemon => "🍋",
            Symbol::Orange => "🍊",
            Symbol::Grape => "🍇",
            Symbol::Star => "⭐",
            Symbol::Diamond => "💎",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymbolSpec {
    pub symbol: Symbol,
    pub weight: u32,
    pub multiplier: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymbolTableConfig {
    symbols: Vec<SymbolSpec>,
}

/// Upper bound on the summed weights. The weighted pool holds one entry per
/// weight unit.
pub const MAX_TOTAL_WEIGHT: u32 = 1_000_000;

/// Validated weight/multiplier configuration shared read-only by every spin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    specs: Vec<SymbolSpec>,
    total_weight: u32,
}

impl SymbolTable {
    /// Builds a table, rejecting anything the outcome engine could not draw
    /// from: no symbols, zero or oversized weights, zero multipliers,
    /// duplicates, and tables with a single symbol (a losing spin needs a
    /// second symbol).
    pub fn new(specs: Vec<SymbolSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::EmptyTable);
        }

        let mut seen = Vec::with_capacity(specs.len());
        for spec in &specs {
            if seen.contains(&spec.symbol) {
                return Err(ConfigError::DuplicateSymbol(spec.symbol));
            }
            seen.push(spec.symbol);
        }

        let total_weight = specs
            .iter()
            .try_fold(0u32, |total, spec| total.checked_add(spec.weight))
            .filter(|total| *total <= MAX_TOTAL_WEIGHT)
            .ok_or(ConfigError::TotalWeightTooLarge {
                max: MAX_TOTAL_WEIGHT,
            })?;
        if total_weight == 0 {
            return Err(ConfigError::ZeroTotalWeight);
        }
        if let Some(spec) = specs.iter().find(|spec| spec.weight == 0) {
            return Err(ConfigError::ZeroWeight(spec.symbol));
        }
        if let Some(spec) = specs.iter().find(|spec| spec.multiplier == 0) {
            return Err(ConfigError::ZeroMultiplier(spec.symbol));
        }
        if specs.len() < 2 {
            return Err(ConfigError::TooFewSymbols(specs.len()));
        }

        Ok(Self {
            specs,
            total_weight,
        })
    }

    /// The built-in table: weights {30,25,20,15,8,2}, multipliers {2,3,4,5,10,20}.
    pub fn reference() -> Self {
        let weights = [30, 25, 20, 15, 8, 2];
        let multipliers = [2, 3, 4, 5, 10, 20];
        let specs = ALL_SYMBOLS
            .iter()
            .zip(weights)
            .zip(multipliers)
            .map(|((&symbol, weight), multiplier)| SymbolSpec {
                symbol,
                weight,
                multiplier,
            })
            .collect();
        Self {
            specs,
            total_weight: 100,
        }
    }

    /// Parses `symbols: [{symbol, weight, multiplier}, ...]` and validates it.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SymbolTableConfig =
            serde_yaml::from_str(raw).map_err(|error| ConfigError::Yaml(error.to_string()))?;
        Self::new(config.symbols)
    }

    pub fn specs(&self) -> &[SymbolSpec] {
        &self.specs
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.specs.iter().map(|spec| spec.symbol).collect()
    }

    pub fn weight(&self, symbol: Symbol) -> Result<u32, ConfigError> {
        self.spec(symbol)
            .map(|spec| spec.weight)
            .ok_or(ConfigError::UnknownSymbol(symbol))
    }

    /// Unknown symbols pay 1x.
    pub fn multiplier(&self, symbol: Symbol) -> u32 {
        self.spec(symbol).map_or(1, |spec| spec.multiplier)
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn weighted_pool(&self) -> WeightedSymbolPool {
        let mut symbols = Vec::with_capacity(self.total_weight as usize);
        for spec in &self.specs {
            symbols.extend(std::iter::repeat_n(spec.symbol, spec.weight as usize));
        }
        WeightedSymbolPool { symbols }
    }

    /// Analytic long-run return of the normal strategy, as a ratio
    /// (1.0 = 100%): win probability times the weight-averaged multiplier.
    pub fn expected_rtp(&self, win_probability: f64) -> f64 {
        let weighted: u64 = self
            .specs
            .iter()
            .map(|spec| u64::from(spec.weight) * u64::from(spec.multiplier))
            .sum();
        win_probability * weighted as f64 / f64::from(self.total_weight)
    }

    fn spec(&self, symbol: Symbol) -> Option<&SymbolSpec> {
        self.specs.iter().find(|spec| spec.symbol == symbol)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::reference()
    }
}

/// Flat sampling domain: every symbol repeated `weight` times, table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedSymbolPool {
    symbols: Vec<Symbol>,
}

impl WeightedSymbolPool {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbol at `index` wrapped around the pool length.
    pub fn at(&self, index: usize) -> Symbol {
        self.symbols[index % self.symbols.len()]
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Symbol {
        self.symbols[rng.random_range(0..self.symbols.len())]
    }
}
