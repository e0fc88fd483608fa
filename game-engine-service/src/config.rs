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
use slot_common::{
    DEFAULT_BALANCE, DEFAULT_WIN_PROBABILITY, HeavySettings, OutcomeEngine, SymbolTable,
    expand_env_vars,
};
use tracing::info;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub enable_rest: bool,
    pub enable_connect: bool,
    pub win_probability: f64,
    pub heavy: HeavySettings,
    pub symbol_table_path: Option<String>,
    pub default_balance: f64,
    pub use_wager_service: bool,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = HeavySettings::default();
        Ok(Self {
            enable_rest: env_flag("ENABLE_REST", true)?,
            enable_connect: env_flag("ENABLE_CONNECT", true)?,
            win_probability: env_parse("WIN_PROBABILITY", DEFAULT_WIN_PROBABILITY)?,
            heavy: HeavySettings {
                enabled: env_flag("HEAVY_STRATEGY_ENABLED", defaults.enabled)?,
                prime_floor: env_parse("HEAVY_PRIME_FLOOR", defaults.prime_floor)?,
                prime_count: env_parse("HEAVY_PRIME_COUNT", defaults.prime_count)?,
                iterations: env_parse("HEAVY_ITERATIONS", defaults.iterations)?,
                matrix_size: env_parse("HEAVY_MATRIX_SIZE", defaults.matrix_size)?,
                matrix_rounds: env_parse("HEAVY_MATRIX_ROUNDS", defaults.matrix_rounds)?,
            },
            symbol_table_path: std::env::var("SYMBOL_TABLE_CONFIG_PATH")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            default_balance: env_parse("DEFAULT_BALANCE", DEFAULT_BALANCE)?,
            use_wager_service: env_flag("USE_WAGER_SERVICE", false)?,
        })
    }

    /// Builds the outcome engine. A malformed symbol table stops startup.
    pub fn build_engine(&self) -> anyhow::Result<OutcomeEngine> {
        let table = match self.symbol_table_path.as_deref() {
            Some(path) => load_symbol_table(path)?,
            None => SymbolTable::reference(),
        };
        let engine = OutcomeEngine::with_win_probability(table, self.win_probability)
            .context("invalid outcome engine configuration")?
            .with_heavy_settings(self.heavy)
            .context("invalid heavy strategy configuration")?;

        info!(
            symbols = engine.table().specs().len(),
            pool_size = engine.pool().len(),
            win_probability = engine.win_probability(),
            expected_rtp = engine.table().expected_rtp(engine.win_probability()),
            heavy_enabled = engine.heavy_settings().enabled,
            "outcome engine ready"
        );
        Ok(engine)
    }
}

fn load_symbol_table(path: &str) -> anyhow::Result<SymbolTable> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read symbol table config {path}"))?;
    let table = SymbolTable::from_yaml_str(&expand_env_vars(&raw))
        .with_context(|| format!("invalid symbol table config {path}"))?;
    info!(path = %path, total_weight = table.total_weight(), "loaded symbol table from YAML config");
    Ok(table)
}

/// Boolean switch from the environment. Unset or blank keeps the default;
/// anything `parse_flag` does not recognise is an error.
pub fn env_flag(var_name: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => parse_flag(&value)
            .with_context(|| format!("invalid {var_name}: expected true/false, got {value:?}")),
        _ => Ok(default),
    }
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn env_parse<T>(var_name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {var_name}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> ServiceConfig {
        ServiceConfig {
            enable_rest: true,
            enable_connect: true,
            win_probability: DEFAULT_WIN_PROBABILITY,
            heavy: HeavySettings::default(),
            symbol_table_path: None,
            default_balance: DEFAULT_BALANCE,
            use_wager_service: false,
        }
    }

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!(
            "game-engine-{name}-{}.yaml",
            uuid::Uuid::new_v4()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn default_config_uses_reference_table() {
        let engine = config().build_engine().unwrap();
        assert_eq!(engine.pool().len(), 100);
        assert_eq!(engine.win_probability(), DEFAULT_WIN_PROBABILITY);
    }

    #[test]
    fn yaml_symbol_table_is_loaded() {
        let path = write_temp(
            "ok",
            "symbols:\n  - {symbol: cherry, weight: 3, multiplier: 2}\n  - {symbol: star, weight: 1, multiplier: 10}\n",
        );
        let mut config = config();
        config.symbol_table_path = Some(path.clone());
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.pool().len(), 4);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn zero_weight_table_fails_startup() {
        let path = write_temp(
            "zero",
            "symbols:\n  - {symbol: cherry, weight: 0, multiplier: 2}\n  - {symbol: star, weight: 0, multiplier: 10}\n",
        );
        let mut config = config();
        config.symbol_table_path = Some(path.clone());
        let error = config.build_engine().unwrap_err();
        assert!(format!("{error:#}").contains("total weight is zero"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_table_file_fails_startup() {
        let mut config = config();
        config.symbol_table_path = Some("/definitely/not/here.yaml".to_string());
        assert!(config.build_engine().is_err());
    }

    #[test]
    fn invalid_win_probability_fails_startup() {
        let mut config = config();
        config.win_probability = 2.0;
        assert!(config.build_engine().is_err());
    }

    #[test]
    fn env_parse_falls_back_to_default_when_unset() {
        let value: u32 = env_parse("GAME_ENGINE_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
        assert!(env_flag("GAME_ENGINE_TEST_SURELY_UNSET_VAR", true).unwrap());
    }

    #[test]
    fn flags_accept_common_spellings() {
        for on in ["true", "TRUE", "1", "yes", " on "] {
            assert_eq!(parse_flag(on), Some(true), "{on}");
        }
        for off in ["false", "False", "0", "no", "off"] {
            assert_eq!(parse_flag(off), Some(false), "{off}");
        }
        assert_eq!(parse_flag("enabled"), None);
        assert_eq!(parse_flag("2"), None);
    }

    #[test]
    fn unrecognised_flag_value_is_an_error() {
        let var = "GAME_ENGINE_TEST_FLAG_TYPO";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(var, "ture") };
        let error = env_flag(var, true).unwrap_err();
        assert!(format!("{error:#}").contains(var));

        unsafe { std::env::set_var(var, "1") };
        assert!(env_flag(var, false).unwrap());
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn too_few_heavy_primes_fails_startup() {
        let mut config = config();
        config.heavy.prime_count = 0;
        let error = config.build_engine().unwrap_err();
        assert!(format!("{error:#}").contains("at least 3 primes"));
    }
}
