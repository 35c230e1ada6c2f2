//! Exclusion registry: moving accounts in and out of rebase participation.
//!
//! An excluded account's balance is stored in real token units and is not
//! touched by rebases. Moving an account across the boundary converts its
//! balance at the current ratio, moves it between the share pool and the
//! excluded pool, and recomputes the ratio for the shrunken or grown share
//! pool. The whole transition is computed before anything is written.

use tracing::debug;

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
    shares::{ratio_for, Holding, ScaledBalanceStore},
};

/// Result of an exclusion status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExclusionTransition {
    /// The account whose status was set.
    pub account: AccountId,

    /// Exclusion status after the call.
    pub excluded: bool,

    /// Token balance of the account after the transition.
    pub balance: u128,

    /// Ratio after the transition.
    pub shares_per_token: u128,

    /// False when the account already had the requested status.
    pub changed: bool,
}

impl ScaledBalanceStore {
    /// Set whether an account is excluded from rebase growth.
    ///
    /// `total_supply` is the ledger's current total token supply; it is needed
    /// to size the non-excluded pool the ratio is recomputed against.
    pub fn set_excluded(
        &mut self,
        account: AccountId,
        excluded: bool,
        total_supply: u128,
    ) -> LedgerResult<ExclusionTransition> {
        let current = self.holding(&account).unwrap_or_default();
        let spt = self.shares_per_token();

        if current.is_excluded() == excluded {
            return Ok(ExclusionTransition {
                account,
                excluded,
                balance: self.balance_of(&account),
                shares_per_token: spt,
                changed: false,
            });
        }

        let pool_shares = self.non_excluded_shares();
        let pool_excluded = self.excluded_supply();

        let (holding, next_shares, next_excluded) = match current {
            Holding::Shares(shares) => {
                let amount = shares / spt;
                (
                    Holding::Tokens(amount),
                    pool_shares - shares,
                    pool_excluded.checked_add(amount).ok_or(LedgerError::Overflow)?,
                )
            }
            Holding::Tokens(amount) => {
                let shares = amount.checked_mul(spt).ok_or(LedgerError::Overflow)?;
                let next_shares = pool_shares
                    .checked_add(shares)
                    .ok_or(LedgerError::Overflow)?;
                (Holding::Shares(shares), next_shares, pool_excluded - amount)
            }
        };

        let non_excluded_supply = total_supply.checked_sub(next_excluded).ok_or_else(|| {
            LedgerError::InvalidConfiguration(format!(
                "excluded supply {next_excluded} exceeds total supply {total_supply}"
            ))
        })?;
        let ratio = ratio_for(next_shares, non_excluded_supply, spt)?;

        self.replace_holding(account, holding);
        self.set_shares_per_token(ratio);

        debug!(
            account = %account,
            excluded,
            shares_per_token = ratio,
            excluded_supply = next_excluded,
            "Exclusion status changed"
        );

        Ok(ExclusionTransition {
            account,
            excluded,
            balance: self.balance_of(&account),
            shares_per_token: ratio,
            changed: true,
        })
    }

    /// Accounts currently excluded from rebase, in address order.
    pub fn excluded_accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.accounts()
            .filter(|(_, holding)| holding.is_excluded())
            .map(|(account, _)| account)
    }
}
