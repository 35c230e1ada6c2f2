use anyhow::{Context, Result};
use evo_rebase_ledger::{
    tokens, AccountId, FeeRateBps, FeeSchedule, GenesisConfig, RebaseConfig, RebaseRate,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration for an Evo ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub rebase: RebaseSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Genesis supply in whole tokens (18 decimals)
    #[serde(default = "default_initial_supply")]
    pub initial_supply: u64,

    /// Supply cap in whole tokens; rebase growth stops here
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,

    /// Receives the genesis supply and administers the ledger
    #[serde(default = "default_owner")]
    pub owner: AccountId,

    /// Receives transfer fees
    #[serde(default = "default_fee_collector")]
    pub fee_collector: AccountId,
}

fn default_initial_supply() -> u64 {
    1_000_000
}

fn default_max_supply() -> u64 {
    1_000_000_000_000
}

fn default_owner() -> AccountId {
    AccountId::from_low_u64(1)
}

fn default_fee_collector() -> AccountId {
    AccountId::from_low_u64(2)
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            initial_supply: default_initial_supply(),
            max_supply: default_max_supply(),
            owner: default_owner(),
            fee_collector: default_fee_collector(),
        }
    }
}

/// Fee rates in basis points and per-direction toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeesConfig {
    #[serde(default = "default_fee_bps")]
    pub buy_fee_bps: FeeRateBps,

    #[serde(default = "default_fee_bps")]
    pub sell_fee_bps: FeeRateBps,

    #[serde(default = "default_fee_bps")]
    pub normal_fee_bps: FeeRateBps,

    #[serde(default = "default_true")]
    pub fees_on_buy: bool,

    #[serde(default = "default_true")]
    pub fees_on_sell: bool,

    #[serde(default)]
    pub fees_on_normal_transfers: bool,
}

fn default_fee_bps() -> FeeRateBps {
    300
}

fn default_true() -> bool {
    true
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            buy_fee_bps: default_fee_bps(),
            sell_fee_bps: default_fee_bps(),
            normal_fee_bps: default_fee_bps(),
            fees_on_buy: true,
            fees_on_sell: true,
            fees_on_normal_transfers: false,
        }
    }
}

impl From<&FeesConfig> for FeeSchedule {
    fn from(fees: &FeesConfig) -> Self {
        FeeSchedule {
            buy_fee_bps: fees.buy_fee_bps,
            sell_fee_bps: fees.sell_fee_bps,
            normal_fee_bps: fees.normal_fee_bps,
            fees_on_buy: fees.fees_on_buy,
            fees_on_sell: fees.fees_on_sell,
            fees_on_normal_transfers: fees.fees_on_normal_transfers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseSettings {
    /// Growth per rebase is rate_numerator / rate_denominator
    #[serde(default = "default_rate_numerator")]
    pub rate_numerator: u64,

    #[serde(default = "default_rate_denominator")]
    pub rate_denominator: u64,

    /// Seconds between scheduled rebases
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: u64,

    /// Unix time of the first scheduled rebase
    #[serde(default)]
    pub next_rebase: u64,

    /// Rebase at the start of a transfer once one is due
    #[serde(default)]
    pub auto_rebase: bool,

    /// While false only the owner may send
    #[serde(default)]
    pub initial_distribution_finished: bool,
}

fn default_rate_numerator() -> u64 {
    RebaseRate::DEFAULT.numerator as u64
}

fn default_rate_denominator() -> u64 {
    RebaseRate::DEFAULT.denominator as u64
}

fn default_frequency_secs() -> u64 {
    15 * 60
}

impl Default for RebaseSettings {
    fn default() -> Self {
        Self {
            rate_numerator: default_rate_numerator(),
            rate_denominator: default_rate_denominator(),
            frequency_secs: default_frequency_secs(),
            next_rebase: 0,
            auto_rebase: false,
            initial_distribution_finished: false,
        }
    }
}

impl RebaseSettings {
    pub fn rate(&self) -> RebaseRate {
        RebaseRate {
            numerator: self.rate_numerator as u128,
            denominator: self.rate_denominator as u128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load config from a file if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if Self::exists(path) {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Build the ledger's genesis parameters.
    pub fn genesis(&self) -> Result<GenesisConfig> {
        let rate = self.rebase.rate();
        rate.validate().context("Invalid rebase rate")?;

        let fees = FeeSchedule::from(&self.fees);
        fees.validate().context("Invalid fee configuration")?;

        Ok(GenesisConfig {
            owner: self.token.owner,
            fee_collector: self.token.fee_collector,
            initial_supply: tokens(self.token.initial_supply),
            fees,
            rebase: RebaseConfig {
                rate,
                frequency_secs: self.rebase.frequency_secs,
                max_supply: tokens(self.token.max_supply),
            },
            next_rebase: self.rebase.next_rebase,
            initial_distribution_finished: self.rebase.initial_distribution_finished,
            auto_rebase: self.rebase.auto_rebase,
        })
    }
}

/// Get the default data directory (~/.evo)
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".evo")
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}
