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

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SpinCancelled};
use crate::symbols::{Symbol, SymbolTable, WeightedSymbolPool};

pub const DEFAULT_WIN_PROBABILITY: f64 = 0.30;

pub const DEFAULT_HEAVY_PRIME_FLOOR: u64 = 10_000_000;
pub const DEFAULT_HEAVY_PRIME_COUNT: usize = 10;
pub const DEFAULT_HEAVY_ITERATIONS: u32 = 5_000;
pub const DEFAULT_HEAVY_MATRIX_SIZE: usize = 100;
pub const DEFAULT_HEAVY_MATRIX_ROUNDS: u32 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Normal,
    Heavy,
}

impl Strategy {
    pub fn from_cpu_intensive(cpu_intensive: bool) -> Self {
        if cpu_intensive {
            Strategy::Heavy
        } else {
            Strategy::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Normal => "normal",
            Strategy::Heavy => "cpu_intensive",
        }
    }
}

/// Three reels plus the derived win flag and multiplier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub symbols: [Symbol; 3],
    pub win: bool,
    pub multiplier: u32,
}

impl Outcome {
    pub fn winning(symbol: Symbol, table: &SymbolTable) -> Self {
        Self {
            symbols: [symbol; 3],
            win: true,
            multiplier: table.multiplier(symbol),
        }
    }

    /// `symbols` must not be three of a kind.
    pub fn losing(symbols: [Symbol; 3]) -> Self {
        debug_assert!(!is_three_of_a_kind(&symbols));
        Self {
            symbols,
            win: false,
            multiplier: 0,
        }
    }

    pub fn is_three_of_a_kind(&self) -> bool {
        is_three_of_a_kind(&self.symbols)
    }
}

fn is_three_of_a_kind(symbols: &[Symbol; 3]) -> bool {
    symbols[0] == symbols[1] && symbols[1] == symbols[2]
}

/// Tuning of the CPU-bound demo strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeavySettings {
    /// When false, heavy requests are served by the normal strategy.
    pub enabled: bool,
    pub prime_floor: u64,
    pub prime_count: usize,
    pub iterations: u32,
    pub matrix_size: usize,
    pub matrix_rounds: u32,
}

impl Default for HeavySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            prime_floor: DEFAULT_HEAVY_PRIME_FLOOR,
            prime_count: DEFAULT_HEAVY_PRIME_COUNT,
            iterations: DEFAULT_HEAVY_ITERATIONS,
            matrix_size: DEFAULT_HEAVY_MATRIX_SIZE,
            matrix_rounds: DEFAULT_HEAVY_MATRIX_ROUNDS,
        }
    }
}

/// Draws outcomes from an immutable symbol table. Cheap to share behind an
/// `Arc`; every spin only reads from it.
#[derive(Debug, Clone)]
pub struct OutcomeEngine {
    table: SymbolTable,
    pool: WeightedSymbolPool,
    win_probability: f64,
    heavy: HeavySettings,
}

impl OutcomeEngine {
    pub fn new(table: SymbolTable) -> Result<Self, ConfigError> {
        Self::with_win_probability(table, DEFAULT_WIN_PROBABILITY)
    }

    pub fn with_win_probability(
        table: SymbolTable,
        win_probability: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&win_probability) {
            return Err(ConfigError::InvalidWinProbability(win_probability));
        }
        let pool = table.weighted_pool();
        if pool.is_empty() {
            return Err(ConfigError::ZeroTotalWeight);
        }
        Ok(Self {
            table,
            pool,
            win_probability,
            heavy: HeavySettings::default(),
        })
    }

    /// The heavy strategy derives three reels from the first three primes and
    /// needs at least one accumulation pass per prime.
    pub fn with_heavy_settings(mut self, heavy: HeavySettings) -> Result<Self, ConfigError> {
        if heavy.prime_count < 3 {
            return Err(ConfigError::TooFewHeavyPrimes(heavy.prime_count));
        }
        if heavy.iterations == 0 {
            return Err(ConfigError::ZeroHeavyIterations);
        }
        self.heavy = heavy;
        Ok(self)
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn pool(&self) -> &WeightedSymbolPool {
        &self.pool
    }

    pub fn win_probability(&self) -> f64 {
        self.win_probability
    }

    pub fn heavy_settings(&self) -> &HeavySettings {
        &self.heavy
    }

    /// The strategy that will actually run for a request.
    pub fn resolve(&self, requested: Strategy) -> Strategy {
        match requested {
            Strategy::Heavy if !self.heavy.enabled => Strategy::Normal,
            other => other,
        }
    }

    pub fn spin<R: Rng + ?Sized>(
        &self,
        strategy: Strategy,
        rng: &mut R,
        cancel: &AtomicBool,
    ) -> Result<Outcome, SpinCancelled> {
        match self.resolve(strategy) {
            Strategy::Normal => Ok(self.spin_normal(rng)),
            Strategy::Heavy => self.spin_heavy(rng, cancel),
        }
    }

    pub fn spin_normal<R: Rng + ?Sized>(&self, rng: &mut R) -> Outcome {
        if rng.random_bool(self.win_probability) {
            return Outcome::winning(self.pool.sample(rng), &self.table);
        }

        let mut reels = [
            self.pool.sample(rng),
            self.pool.sample(rng),
            self.pool.sample(rng),
        ];
        self.break_accidental_win(&mut reels, rng);
        Outcome::losing(reels)
    }

    /// Deliberately expensive variant. The win decision and reel positions
    /// are derived from trigonometric sums over large primes instead of the
    /// RNG; the RNG only feeds the throwaway matrices and the dedup rule.
    pub fn spin_heavy<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        cancel: &AtomicBool,
    ) -> Result<Outcome, SpinCancelled> {
        let primes = primes_from(self.heavy.prime_floor, self.heavy.prime_count, cancel)?;
        burn_matrices(self.heavy.matrix_size, self.heavy.matrix_rounds, rng, cancel)?;
        let heavy_sum = accumulate(&primes, self.heavy.iterations, cancel)?;

        let pool_len = self.pool.len() as f64;
        let threshold = heavy_sum.abs() % 100.0 / 100.0;
        if threshold < self.win_probability {
            let first = primes.first().copied().unwrap_or(1) as f64;
            let index = ((heavy_sum * first).abs() % pool_len) as usize;
            return Ok(Outcome::winning(self.pool.at(index), &self.table));
        }

        let mut reels = [Symbol::Cherry; 3];
        for (reel, slot) in reels.iter_mut().enumerate() {
            let prime = primes.get(reel).copied().unwrap_or(1) as f64;
            let mut reel_sum = 0.0_f64;
            for j in 0..self.heavy.iterations {
                if cancel.load(Ordering::Relaxed) {
                    return Err(SpinCancelled);
                }
                reel_sum += (prime * f64::from(j) * (reel + 1) as f64).sin();
            }
            *slot = self.pool.at((reel_sum.abs() % pool_len) as usize);
        }
        self.break_accidental_win(&mut reels, rng);
        Ok(Outcome::losing(reels))
    }

    /// Replaces the middle reel when a losing draw came up three of a kind.
    fn break_accidental_win<R: Rng + ?Sized>(&self, reels: &mut [Symbol; 3], rng: &mut R) {
        if !is_three_of_a_kind(reels) {
            return;
        }
        let others: Vec<Symbol> = self
            .table
            .symbols()
            .into_iter()
            .filter(|symbol| *symbol != reels[0])
            .collect();
        // The table always holds at least two symbols.
        reels[1] = others[rng.random_range(0..others.len())];
    }
}

/// First `count` primes at or above `floor`, by trial division.
pub fn primes_from(floor: u64, count: usize, cancel: &AtomicBool) -> Result<Vec<u64>, SpinCancelled> {
    let mut primes = Vec::with_capacity(count);
    let mut candidate = floor;
    while primes.len() < count {
        if cancel.load(Ordering::Relaxed) {
            return Err(SpinCancelled);
        }
        if is_prime(candidate) {
            primes.push(candidate);
        }
        let Some(next) = candidate.checked_add(1) else {
            break;
        };
        candidate = next;
    }
    Ok(primes)
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut divisor = 2;
    while divisor <= n / divisor {
        if n % divisor == 0 {
            return false;
        }
        divisor += 1;
    }
    true
}

fn accumulate(primes: &[u64], iterations: u32, cancel: &AtomicBool) -> Result<f64, SpinCancelled> {
    let mut sum = 0.0_f64;
    for &prime in primes {
        if cancel.load(Ordering::Relaxed) {
            return Err(SpinCancelled);
        }
        let prime = prime as f64;
        for i in 0..iterations {
            let i = f64::from(i);
            sum += (prime * i).sin() * (prime / (i + 1.0)).cos();
            sum += (sum.abs() + 1.0).ln();
            sum += (-sum.abs() / 1_000_000.0).exp();
        }
    }
    Ok(sum)
}

fn burn_matrices<R: Rng + ?Sized>(
    size: usize,
    rounds: u32,
    rng: &mut R,
    cancel: &AtomicBool,
) -> Result<(), SpinCancelled> {
    if size == 0 || rounds == 0 {
        return Ok(());
    }
    let mut a: Vec<f64> = (0..size * size).map(|_| rng.random::<f64>()).collect();
    let b: Vec<f64> = (0..size * size).map(|_| rng.random::<f64>()).collect();
    let mut product = vec![0.0_f64; size * size];

    for _ in 0..rounds {
        for row in 0..size {
            if cancel.load(Ordering::Relaxed) {
                return Err(SpinCancelled);
            }
            for col in 0..size {
                let mut cell = 0.0;
                for k in 0..size {
                    cell += a[row * size + k] * b[k * size + col];
                }
                product[row * size + col] = cell;
            }
        }
        std::mem::swap(&mut a, &mut product);
    }
    std::hint::black_box(&a);
    Ok(())
}
