//! Share-scaled balance storage.
//!
//! Non-excluded accounts hold *shares*, a fixed internal unit. Their token
//! balance is `shares / shares_per_token`, so a rebase only has to change the
//! ratio, never an account record:
//!
//! ```text
//! balance_of(a) = shares(a) / shares_per_token          (truncating)
//! shares(amount) = amount * shares_per_token             (exact)
//! ```
//!
//! Excluded accounts hold their real token amount directly and are invisible
//! to the ratio. The store keeps both pool totals so that
//!
//! ```text
//! non_excluded_shares / shares_per_token + excluded_supply <= total_supply
//! ```
//!
//! with the shortfall bounded by the rounding of the ratio. The ratio is
//! rounded up, so balances only ever round down.

use std::collections::BTreeMap;

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
};

/// How an account's balance is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Holding {
    /// Rebase-participating balance, in shares.
    Shares(u128),
    /// Balance of an account excluded from rebase, in real token units.
    Tokens(u128),
}

impl Default for Holding {
    fn default() -> Self {
        Holding::Shares(0)
    }
}

impl Holding {
    /// Whether this holding belongs to an excluded account.
    pub fn is_excluded(&self) -> bool {
        matches!(self, Holding::Tokens(_))
    }
}

/// Per-account balances plus the global share-to-token ratio.
#[derive(Clone, Debug)]
pub struct ScaledBalanceStore {
    holdings: BTreeMap<AccountId, Holding>,
    shares_per_token: u128,
    non_excluded_shares: u128,
    excluded_supply: u128,
}

impl ScaledBalanceStore {
    /// Create the genesis store with the whole supply on `holder`.
    ///
    /// The share pool is the largest multiple of `initial_supply` that fits in
    /// a `u128`, so the genesis ratio is exact and every transfer before the
    /// first rebase conserves supply to the unit.
    pub fn genesis(holder: AccountId, initial_supply: u128) -> LedgerResult<Self> {
        if initial_supply == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "initial supply must be non-zero".to_string(),
            ));
        }
        let total_shares = u128::MAX - (u128::MAX % initial_supply);
        let shares_per_token = total_shares / initial_supply;

        let mut holdings = BTreeMap::new();
        holdings.insert(holder, Holding::Shares(total_shares));

        Ok(Self {
            holdings,
            shares_per_token,
            non_excluded_shares: total_shares,
            excluded_supply: 0,
        })
    }

    /// Rebuild a store from persisted holdings, recomputing both pool totals.
    pub fn from_holdings(
        holdings: impl IntoIterator<Item = (AccountId, Holding)>,
        shares_per_token: u128,
    ) -> LedgerResult<Self> {
        if shares_per_token == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "shares per token must be non-zero".to_string(),
            ));
        }

        let mut store = Self {
            holdings: BTreeMap::new(),
            shares_per_token,
            non_excluded_shares: 0,
            excluded_supply: 0,
        };
        for (account, holding) in holdings {
            match holding {
                Holding::Shares(shares) => {
                    store.non_excluded_shares = store
                        .non_excluded_shares
                        .checked_add(shares)
                        .ok_or(LedgerError::Overflow)?;
                }
                Holding::Tokens(tokens) => {
                    store.excluded_supply = store
                        .excluded_supply
                        .checked_add(tokens)
                        .ok_or(LedgerError::Overflow)?;
                }
            }
            store.holdings.insert(account, holding);
        }
        Ok(store)
    }

    /// Current shares per whole base unit of token.
    pub fn shares_per_token(&self) -> u128 {
        self.shares_per_token
    }

    /// Sum of shares held by non-excluded accounts.
    pub fn non_excluded_shares(&self) -> u128 {
        self.non_excluded_shares
    }

    /// Sum of real balances held by excluded accounts.
    pub fn excluded_supply(&self) -> u128 {
        self.excluded_supply
    }

    /// Token value of the whole non-excluded share pool at the current ratio.
    pub fn non_excluded_pool_value(&self) -> u128 {
        self.non_excluded_shares / self.shares_per_token
    }

    /// The stored holding for an account, if it has ever been credited.
    pub fn holding(&self, account: &AccountId) -> Option<Holding> {
        self.holdings.get(account).copied()
    }

    /// Whether the account is excluded from rebase growth.
    pub fn is_excluded(&self, account: &AccountId) -> bool {
        self.holdings
            .get(account)
            .map(Holding::is_excluded)
            .unwrap_or(false)
    }

    /// Shares held by a non-excluded account (0 for excluded or unknown).
    pub fn shares_of(&self, account: &AccountId) -> u128 {
        match self.holdings.get(account) {
            Some(Holding::Shares(shares)) => *shares,
            _ => 0,
        }
    }

    /// Externally visible token balance.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        match self.holdings.get(account) {
            Some(Holding::Shares(shares)) => shares / self.shares_per_token,
            Some(Holding::Tokens(tokens)) => *tokens,
            None => 0,
        }
    }

    /// Convert a token amount to shares at the current ratio.
    pub fn to_shares(&self, amount: u128) -> LedgerResult<u128> {
        amount
            .checked_mul(self.shares_per_token)
            .ok_or(LedgerError::Overflow)
    }

    /// Add shares to a non-excluded account.
    pub fn credit_shares(&mut self, account: AccountId, delta: u128) -> LedgerResult<()> {
        let pool = self
            .non_excluded_shares
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        match self.holdings.entry(account).or_default() {
            Holding::Shares(shares) => {
                *shares = shares.checked_add(delta).ok_or(LedgerError::Overflow)?;
            }
            Holding::Tokens(_) => return Err(excluded_mismatch(&account)),
        }
        self.non_excluded_shares = pool;
        Ok(())
    }

    /// Remove shares from a non-excluded account.
    pub fn debit_shares(&mut self, account: AccountId, delta: u128) -> LedgerResult<()> {
        if delta == 0 {
            return Ok(());
        }
        let spt = self.shares_per_token;
        match self.holdings.get_mut(&account) {
            Some(Holding::Shares(shares)) if *shares >= delta => {
                *shares -= delta;
            }
            Some(Holding::Shares(shares)) => {
                return Err(LedgerError::InsufficientBalance {
                    available: *shares / spt,
                    requested: delta / spt,
                });
            }
            Some(Holding::Tokens(_)) => return Err(excluded_mismatch(&account)),
            None => {
                return Err(LedgerError::InsufficientBalance {
                    available: 0,
                    requested: delta / spt,
                })
            }
        }
        self.non_excluded_shares -= delta;
        Ok(())
    }

    /// Add real tokens to an excluded account.
    pub fn credit_excluded_tokens(&mut self, account: AccountId, delta: u128) -> LedgerResult<()> {
        let pool = self
            .excluded_supply
            .checked_add(delta)
            .ok_or(LedgerError::Overflow)?;
        match self.holdings.get_mut(&account) {
            Some(Holding::Tokens(tokens)) => {
                *tokens = tokens.checked_add(delta).ok_or(LedgerError::Overflow)?;
            }
            _ => {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "{account} is not excluded from rebase"
                )))
            }
        }
        self.excluded_supply = pool;
        Ok(())
    }

    /// Remove real tokens from an excluded account.
    pub fn debit_excluded_tokens(&mut self, account: AccountId, delta: u128) -> LedgerResult<()> {
        match self.holdings.get_mut(&account) {
            Some(Holding::Tokens(tokens)) if *tokens >= delta => {
                *tokens -= delta;
            }
            Some(Holding::Tokens(tokens)) => {
                return Err(LedgerError::InsufficientBalance {
                    available: *tokens,
                    requested: delta,
                });
            }
            _ => {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "{account} is not excluded from rebase"
                )))
            }
        }
        self.excluded_supply -= delta;
        Ok(())
    }

    /// Credit a token amount through whichever pool the account belongs to.
    pub fn credit(&mut self, account: AccountId, amount: u128) -> LedgerResult<()> {
        if self.is_excluded(&account) {
            self.credit_excluded_tokens(account, amount)
        } else {
            let shares = self.to_shares(amount)?;
            self.credit_shares(account, shares)
        }
    }

    /// Debit a token amount through whichever pool the account belongs to.
    pub fn debit(&mut self, account: AccountId, amount: u128) -> LedgerResult<()> {
        if self.is_excluded(&account) {
            self.debit_excluded_tokens(account, amount)
        } else {
            let available = self.balance_of(&account);
            if available < amount {
                return Err(LedgerError::InsufficientBalance {
                    available,
                    requested: amount,
                });
            }
            let shares = self.to_shares(amount)?;
            self.debit_shares(account, shares)
        }
    }

    /// Ratio the pool would have for the given non-excluded token supply.
    ///
    /// With no non-excluded supply (or no shares) the current ratio is kept.
    /// Fails when the pool is too small to represent the supply.
    pub fn ratio_for_supply(&self, non_excluded_supply: u128) -> LedgerResult<u128> {
        ratio_for(self.non_excluded_shares, non_excluded_supply, self.shares_per_token)
    }

    /// Commit a new ratio.
    pub(crate) fn set_shares_per_token(&mut self, shares_per_token: u128) {
        debug_assert!(shares_per_token > 0);
        self.shares_per_token = shares_per_token;
    }

    /// Replace an account's holding wholesale, adjusting both pools.
    ///
    /// Used by exclusion transitions, which precompute the new holding.
    pub(crate) fn replace_holding(&mut self, account: AccountId, holding: Holding) {
        if let Some(previous) = self.holdings.insert(account, holding) {
            match previous {
                Holding::Shares(shares) => self.non_excluded_shares -= shares,
                Holding::Tokens(tokens) => self.excluded_supply -= tokens,
            }
        }
        match holding {
            Holding::Shares(shares) => self.non_excluded_shares += shares,
            Holding::Tokens(tokens) => self.excluded_supply += tokens,
        }
    }

    /// Capture the ratio, pool totals and the given accounts' holdings.
    pub(crate) fn checkpoint(&self, touched: &[AccountId]) -> StoreCheckpoint {
        StoreCheckpoint {
            holdings: touched
                .iter()
                .map(|account| (*account, self.holding(account)))
                .collect(),
            shares_per_token: self.shares_per_token,
            non_excluded_shares: self.non_excluded_shares,
            excluded_supply: self.excluded_supply,
        }
    }

    /// Roll back to a checkpoint. Only accounts named at checkpoint time are
    /// restored.
    pub(crate) fn restore(&mut self, checkpoint: StoreCheckpoint) {
        for (account, holding) in checkpoint.holdings.into_iter().rev() {
            match holding {
                Some(holding) => self.holdings.insert(account, holding),
                None => self.holdings.remove(&account),
            };
        }
        self.shares_per_token = checkpoint.shares_per_token;
        self.non_excluded_shares = checkpoint.non_excluded_shares;
        self.excluded_supply = checkpoint.excluded_supply;
    }

    /// Iterate over every known account and its holding.
    pub fn accounts(&self) -> impl Iterator<Item = (AccountId, Holding)> + '_ {
        self.holdings.iter().map(|(&k, &v)| (k, v))
    }

    /// Number of known accounts.
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    /// Returns true if no account has ever been credited.
    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Sum of all visible balances (useful for conservation checks).
    pub fn sum_of_balances(&self) -> u128 {
        self.holdings
            .keys()
            .map(|account| self.balance_of(account))
            .sum()
    }
}

/// Saved store state for rolling back a failed multi-step operation.
#[derive(Clone, Debug)]
pub(crate) struct StoreCheckpoint {
    holdings: Vec<(AccountId, Option<Holding>)>,
    shares_per_token: u128,
    non_excluded_shares: u128,
    excluded_supply: u128,
}

/// `ceil(shares / supply)`, keeping `current` when the pool is empty.
///
/// Rounding up keeps `shares / ratio <= supply`.
pub(crate) fn ratio_for(shares: u128, supply: u128, current: u128) -> LedgerResult<u128> {
    if supply == 0 || shares == 0 {
        return Ok(current);
    }
    if shares < supply {
        return Err(LedgerError::InvalidConfiguration(format!(
            "share pool of {shares} cannot represent a supply of {supply}"
        )));
    }
    Ok(shares.div_ceil(supply))
}

fn excluded_mismatch(account: &AccountId) -> LedgerError {
    LedgerError::InvalidConfiguration(format!("{account} is excluded from rebase"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::tokens;

    fn setup() -> (ScaledBalanceStore, AccountId, AccountId) {
        let owner = AccountId::from_low_u64(1);
        let other = AccountId::from_low_u64(2);
        let store = ScaledBalanceStore::genesis(owner, tokens(1_000_000)).unwrap();
        (store, owner, other)
    }

    #[test]
    fn test_genesis_ratio_is_exact() {
        let (store, owner, _) = setup();
        assert_eq!(store.balance_of(&owner), tokens(1_000_000));
        assert_eq!(
            store.non_excluded_shares(),
            store.shares_per_token() * tokens(1_000_000)
        );
        assert_eq!(store.non_excluded_pool_value(), tokens(1_000_000));
    }

    #[test]
    fn test_genesis_rejects_zero_supply() {
        assert!(matches!(
            ScaledBalanceStore::genesis(AccountId::ZERO, 0),
            Err(LedgerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_credit_debit_moves_exact_shares() {
        let (mut store, owner, other) = setup();

        store.debit(owner, tokens(250)).unwrap();
        store.credit(other, tokens(250)).unwrap();

        assert_eq!(store.balance_of(&other), tokens(250));
        assert_eq!(store.balance_of(&owner), tokens(1_000_000 - 250));
        assert_eq!(store.sum_of_balances(), tokens(1_000_000));
    }

    #[test]
    fn test_debit_insufficient() {
        let (mut store, _, other) = setup();

        let result = store.debit(other, 1);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientBalance {
                available: 0,
                requested: 1
            })
        );
        assert!(store.holding(&other).is_none());
    }

    #[test]
    fn test_excluded_paths() {
        let (mut store, owner, other) = setup();
        store.replace_holding(other, Holding::Tokens(0));

        store.debit(owner, 500).unwrap();
        store.credit(other, 500).unwrap();
        assert_eq!(store.balance_of(&other), 500);
        assert_eq!(store.excluded_supply(), 500);
        assert_eq!(
            store.non_excluded_pool_value() + store.excluded_supply(),
            tokens(1_000_000)
        );

        assert!(matches!(
            store.debit_excluded_tokens(other, 501),
            Err(LedgerError::InsufficientBalance {
                available: 500,
                requested: 501
            })
        ));
        assert!(matches!(
            store.credit_shares(other, 1),
            Err(LedgerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_balance_truncates() {
        let (mut store, owner, other) = setup();
        // Just under one whole unit worth of shares.
        let shares = store.shares_per_token() - 1;
        store.debit_shares(owner, shares).unwrap();
        store.credit_shares(other, shares).unwrap();

        assert_eq!(store.balance_of(&other), 0);
        assert_eq!(store.balance_of(&owner), tokens(1_000_000) - 1);
    }

    #[test]
    fn test_from_holdings_recomputes_totals() {
        let (mut store, owner, other) = setup();
        store.debit(owner, 700).unwrap();
        store.replace_holding(other, Holding::Tokens(0));
        store.credit(other, 700).unwrap();

        let rebuilt =
            ScaledBalanceStore::from_holdings(store.accounts(), store.shares_per_token()).unwrap();
        assert_eq!(rebuilt.non_excluded_shares(), store.non_excluded_shares());
        assert_eq!(rebuilt.excluded_supply(), 700);
    }

    #[test]
    fn test_checkpoint_restore() {
        let (mut store, owner, other) = setup();
        let checkpoint = store.checkpoint(&[owner, other]);

        store.debit(owner, tokens(10)).unwrap();
        store.credit(other, tokens(10)).unwrap();
        store.set_shares_per_token(store.shares_per_token() / 2);

        store.restore(checkpoint);
        assert_eq!(store.balance_of(&owner), tokens(1_000_000));
        assert!(store.holding(&other).is_none());
        assert_eq!(store.non_excluded_pool_value(), tokens(1_000_000));
    }

    #[test]
    fn test_ratio_for_supply() {
        let (store, _, _) = setup();
        let spt = store.shares_per_token();
        assert_eq!(store.ratio_for_supply(tokens(1_000_000)).unwrap(), spt);
        assert_eq!(store.ratio_for_supply(0).unwrap(), spt);
        assert!(store.ratio_for_supply(u128::MAX).is_err());
    }

    #[test]
    fn test_ratio_rounds_up() {
        assert_eq!(ratio_for(10, 5, 1).unwrap(), 2);
        assert_eq!(ratio_for(11, 5, 1).unwrap(), 3);
        assert_eq!(ratio_for(0, 5, 7).unwrap(), 7);
        assert!(ratio_for(4, 5, 1).is_err());

        // A non-divisible pool never reads above its supply.
        let (shares, supply) = (u128::MAX - 12_345, tokens(1_006_328));
        let ratio = ratio_for(shares, supply, 1).unwrap();
        assert!(shares / ratio <= supply);
        assert!(shares / ratio >= supply - supply / ratio - 1);
    }
}
