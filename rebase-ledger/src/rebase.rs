//! Rebase engine: supply growth without per-holder writes.
//!
//! Each rebase grows the non-excluded part of the supply by a fixed rate and
//! recomputes the share ratio against it:
//!
//! ```text
//! growth            = floor(non_excluded_supply × numerator / denominator)
//! total_supply'     = min(total_supply + growth, max_supply)
//! shares_per_token' = ceil(non_excluded_shares / (total_supply' - excluded_supply))
//! ```
//!
//! Holders' share counts stay fixed, so every non-excluded balance grows by
//! the same factor and repeated rebases compound: N rebases at rate r give a
//! factor of (1 + r)^N. Excluded balances are outside the ratio and do not
//! move.
//!
//! ## Cadence
//!
//! A scheduled rebase is only accepted once `now >= next_rebase`; a successful
//! rebase moves `next_rebase` to `now + frequency_secs`. The owner can force a
//! rebase through the ledger's manual path, which skips the cadence check.

use tracing::{info, warn};

use crate::{
    error::{LedgerError, LedgerResult},
    shares::ScaledBalanceStore,
    units::DEFAULT_MAX_SUPPLY,
};

/// Growth per rebase as an exact fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebaseRate {
    pub numerator: u128,
    pub denominator: u128,
}

impl RebaseRate {
    /// 0.63283933% per rebase.
    pub const DEFAULT: RebaseRate = RebaseRate {
        numerator: 63_283_933,
        denominator: 10_000_000_000,
    };

    /// Create a rate, rejecting a zero denominator and rates above 100%.
    pub fn new(numerator: u128, denominator: u128) -> LedgerResult<Self> {
        let rate = Self {
            numerator,
            denominator,
        };
        rate.validate()?;
        Ok(rate)
    }

    /// Check that the rate is usable.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.denominator == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "rebase rate denominator must be non-zero".to_string(),
            ));
        }
        if self.numerator > self.denominator {
            return Err(LedgerError::InvalidConfiguration(format!(
                "rebase rate {}/{} exceeds 100% per rebase",
                self.numerator, self.denominator
            )));
        }
        Ok(())
    }

    /// `floor(supply × numerator / denominator)` without overflowing on large
    /// supplies.
    pub fn growth(&self, supply: u128) -> LedgerResult<u128> {
        let whole = (supply / self.denominator)
            .checked_mul(self.numerator)
            .ok_or(LedgerError::Overflow)?;
        let part = (supply % self.denominator)
            .checked_mul(self.numerator)
            .ok_or(LedgerError::Overflow)?
            / self.denominator;
        whole.checked_add(part).ok_or(LedgerError::Overflow)
    }

    /// The rate as a float, for display and projections.
    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for RebaseRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Owner-tunable rebase parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebaseConfig {
    /// Growth per rebase.
    pub rate: RebaseRate,

    /// Seconds between scheduled rebases.
    pub frequency_secs: u64,

    /// Supply cap; growth is clamped so total supply never exceeds it.
    pub max_supply: u128,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            rate: RebaseRate::DEFAULT,
            frequency_secs: 15 * 60,
            max_supply: DEFAULT_MAX_SUPPLY,
        }
    }
}

/// Rebase progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebaseState {
    /// Number of rebases applied so far.
    pub epoch: u64,

    /// Earliest time (unix seconds) the next scheduled rebase is accepted.
    pub next_rebase: u64,

    /// Time of the last applied rebase.
    pub last_rebase: Option<u64>,
}

/// What a rebase did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RebaseOutcome {
    /// Epoch number after the rebase.
    pub epoch: u64,

    /// Tokens added to the supply.
    pub growth: u128,

    /// Total supply after the rebase.
    pub total_supply: u128,

    /// Ratio after the rebase.
    pub shares_per_token: u128,

    /// True when growth was cut short by the supply cap.
    pub clamped: bool,
}

/// Applies rebases to a [`ScaledBalanceStore`].
#[derive(Clone, Debug)]
pub struct RebaseEngine {
    pub config: RebaseConfig,
    pub state: RebaseState,
}

impl RebaseEngine {
    /// Create an engine whose first scheduled rebase is at `next_rebase`.
    pub fn new(config: RebaseConfig, next_rebase: u64) -> LedgerResult<Self> {
        config.rate.validate()?;
        Ok(Self {
            config,
            state: RebaseState {
                epoch: 0,
                next_rebase,
                last_rebase: None,
            },
        })
    }

    /// Whether a scheduled rebase is accepted at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        now >= self.state.next_rebase
    }

    /// Fail with `RebaseNotDue` if a scheduled rebase is not yet accepted.
    pub fn ensure_due(&self, now: u64) -> LedgerResult<()> {
        if self.is_due(now) {
            Ok(())
        } else {
            Err(LedgerError::RebaseNotDue {
                now,
                next_rebase: self.state.next_rebase,
            })
        }
    }

    /// Grow the supply by one step and recompute the store's ratio.
    ///
    /// Does not check cadence; callers decide whether the rebase is
    /// scheduled or forced. On error neither the store nor the engine has
    /// changed.
    pub fn apply(
        &mut self,
        store: &mut ScaledBalanceStore,
        total_supply: u128,
        now: u64,
    ) -> LedgerResult<RebaseOutcome> {
        let excluded = store.excluded_supply();
        let non_excluded = total_supply.saturating_sub(excluded);

        let mut growth = self.config.rate.growth(non_excluded)?;
        let headroom = self.config.max_supply.saturating_sub(total_supply);
        let clamped = growth > headroom;
        if clamped {
            warn!(
                growth,
                headroom,
                max_supply = self.config.max_supply,
                "Rebase growth clamped at max supply"
            );
            growth = headroom;
        }

        let next_total = total_supply + growth;
        let ratio = store.ratio_for_supply(next_total.saturating_sub(excluded))?;

        store.set_shares_per_token(ratio);
        self.state.epoch += 1;
        self.state.last_rebase = Some(now);
        self.state.next_rebase = now.saturating_add(self.config.frequency_secs);

        info!(
            epoch = self.state.epoch,
            growth,
            total_supply = next_total,
            shares_per_token = ratio,
            next_rebase = self.state.next_rebase,
            "Rebase applied"
        );

        Ok(RebaseOutcome {
            epoch: self.state.epoch,
            growth,
            total_supply: next_total,
            shares_per_token: ratio,
            clamped,
        })
    }

    /// Balance a non-excluded holder would have after `rebases` more rebases,
    /// ignoring the supply cap.
    pub fn projected_balance(&self, balance: u128, rebases: u32) -> LedgerResult<u128> {
        (0..rebases).try_fold(balance, |acc, _| {
            let growth = self.config.rate.growth(acc)?;
            acc.checked_add(growth).ok_or(LedgerError::Overflow)
        })
    }
}
