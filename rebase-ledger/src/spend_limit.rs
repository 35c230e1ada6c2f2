//! Per-wallet spend limits.
//!
//! A limit caps how much an account may send, either per transfer or in total
//! since the limit was set. Accounts without a limit are unrestricted.

use std::collections::BTreeMap;

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
};

/// How a spend limit is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SpendLimitMode {
    /// Each transfer on its own must not exceed the limit.
    #[default]
    PerTransaction,
    /// The running total since the limit was set must not exceed it.
    Cumulative,
}

/// An owner-set cap on outbound transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpendLimit {
    /// Maximum amount in base units.
    pub amount: u128,
    pub mode: SpendLimitMode,
}

impl SpendLimit {
    pub fn per_transaction(amount: u128) -> Self {
        Self {
            amount,
            mode: SpendLimitMode::PerTransaction,
        }
    }

    pub fn cumulative(amount: u128) -> Self {
        Self {
            amount,
            mode: SpendLimitMode::Cumulative,
        }
    }
}

/// Limit and spend-so-far for one account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WalletLimit {
    pub limit: SpendLimit,
    pub spent: u128,
}

/// Checks and records outbound amounts against configured limits.
#[derive(Clone, Debug, Default)]
pub struct SpendLimitGuard {
    wallets: BTreeMap<AccountId, WalletLimit>,
}

impl SpendLimitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a limit. Either way the recorded spend starts over.
    pub fn set_limit(&mut self, account: AccountId, limit: Option<SpendLimit>) {
        match limit {
            Some(limit) => {
                self.wallets.insert(account, WalletLimit { limit, spent: 0 });
            }
            None => {
                self.wallets.remove(&account);
            }
        }
    }

    /// Restore a limit together with its recorded spend.
    pub fn restore(&mut self, account: AccountId, wallet: WalletLimit) {
        self.wallets.insert(account, wallet);
    }

    /// The configured limit, if any.
    pub fn limit(&self, account: &AccountId) -> Option<SpendLimit> {
        self.wallets.get(account).map(|w| w.limit)
    }

    /// Amount recorded against a cumulative limit.
    pub fn spent(&self, account: &AccountId) -> u128 {
        self.wallets.get(account).map(|w| w.spent).unwrap_or(0)
    }

    /// Fail if sending `amount` would break the account's limit.
    ///
    /// Does not record anything.
    pub fn check(&self, account: &AccountId, amount: u128) -> LedgerResult<()> {
        let Some(wallet) = self.wallets.get(account) else {
            return Ok(());
        };
        let attempted = match wallet.limit.mode {
            SpendLimitMode::PerTransaction => amount,
            SpendLimitMode::Cumulative => wallet.spent.saturating_add(amount),
        };
        if attempted > wallet.limit.amount {
            return Err(LedgerError::SpendLimitExceeded {
                account: *account,
                limit: wallet.limit.amount,
                attempted,
            });
        }
        Ok(())
    }

    /// Record a completed outbound amount.
    pub fn record(&mut self, account: &AccountId, amount: u128) {
        if let Some(wallet) = self.wallets.get_mut(account) {
            wallet.spent = wallet.spent.saturating_add(amount);
        }
    }

    /// Check, then record on success.
    pub fn check_and_record(&mut self, account: &AccountId, amount: u128) -> LedgerResult<()> {
        self.check(account, amount)?;
        self.record(account, amount);
        Ok(())
    }

    /// Iterate over all configured limits.
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, WalletLimit)> + '_ {
        self.wallets.iter().map(|(&k, &v)| (k, v))
    }
}
