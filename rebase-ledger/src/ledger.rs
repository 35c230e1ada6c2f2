//! The ledger state machine.
//!
//! [`RebaseLedger`] owns every component: the share store, the rebase
//! engine, the fee schedule, spend limits, AMM pair marks, allowances and the
//! event log. It is a plain `&mut self` state machine; callers that need
//! shared access wrap it in a lock.
//!
//! Transfers live in `transfer.rs`, owner-gated operations in `admin.rs`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    fee::FeeSchedule,
    rebase::{RebaseConfig, RebaseEngine, RebaseOutcome, RebaseState},
    shares::{Holding, ScaledBalanceStore},
    spend_limit::{SpendLimit, SpendLimitGuard},
    units::DEFAULT_INITIAL_SUPPLY,
};

/// Parameters for creating a ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisConfig {
    /// Receives the whole initial supply and administers the ledger.
    pub owner: AccountId,

    /// Receives transfer fees.
    pub fee_collector: AccountId,

    /// Initial supply in base units.
    pub initial_supply: u128,

    pub fees: FeeSchedule,

    pub rebase: RebaseConfig,

    /// Time of the first scheduled rebase.
    pub next_rebase: u64,

    /// While false only the owner may send.
    pub initial_distribution_finished: bool,

    /// Rebase opportunistically at the start of each transfer once due.
    pub auto_rebase: bool,
}

impl GenesisConfig {
    /// Defaults: 1,000,000 tokens, default fees and rebase schedule, transfers
    /// locked, auto-rebase off.
    pub fn new(owner: AccountId, fee_collector: AccountId) -> Self {
        Self {
            owner,
            fee_collector,
            initial_supply: DEFAULT_INITIAL_SUPPLY,
            fees: FeeSchedule::default(),
            rebase: RebaseConfig::default(),
            next_rebase: 0,
            initial_distribution_finished: false,
            auto_rebase: false,
        }
    }
}

/// Point-in-time summary of the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerStats {
    pub total_supply: u128,
    pub max_supply: u128,
    pub shares_per_token: u128,
    pub non_excluded_shares: u128,
    pub excluded_supply: u128,
    pub accounts: usize,
    pub excluded_accounts: usize,
    pub epoch: u64,
    pub next_rebase: u64,
    pub last_rebase: Option<u64>,
}

/// Single-instance ledger state.
#[derive(Clone, Debug)]
pub struct RebaseLedger {
    pub(crate) owner: AccountId,
    pub(crate) fee_collector: AccountId,
    pub(crate) total_supply: u128,
    pub(crate) store: ScaledBalanceStore,
    pub(crate) fees: FeeSchedule,
    pub(crate) spend_limits: SpendLimitGuard,
    pub(crate) amm_pairs: BTreeSet<AccountId>,
    pub(crate) fee_exempt: BTreeSet<AccountId>,
    pub(crate) allowances: BTreeMap<(AccountId, AccountId), u128>,
    pub(crate) rebase: RebaseEngine,
    pub(crate) initial_distribution_finished: bool,
    pub(crate) auto_rebase: bool,
    pub(crate) events: Vec<LedgerEvent>,
}

impl RebaseLedger {
    /// Create the ledger with the whole initial supply on the owner.
    ///
    /// The owner and the fee collector start fee-exempt.
    pub fn genesis(config: GenesisConfig) -> LedgerResult<Self> {
        config.fees.validate()?;
        if config.initial_supply > config.rebase.max_supply {
            return Err(LedgerError::InvalidConfiguration(format!(
                "initial supply {} exceeds max supply {}",
                config.initial_supply, config.rebase.max_supply
            )));
        }
        let store = ScaledBalanceStore::genesis(config.owner, config.initial_supply)?;
        let rebase = RebaseEngine::new(config.rebase, config.next_rebase)?;

        info!(
            owner = %config.owner,
            fee_collector = %config.fee_collector,
            initial_supply = config.initial_supply,
            shares_per_token = store.shares_per_token(),
            "Ledger created"
        );

        Ok(Self {
            owner: config.owner,
            fee_collector: config.fee_collector,
            total_supply: config.initial_supply,
            store,
            fees: config.fees,
            spend_limits: SpendLimitGuard::new(),
            amm_pairs: BTreeSet::new(),
            fee_exempt: [config.owner, config.fee_collector].into_iter().collect(),
            allowances: BTreeMap::new(),
            rebase,
            initial_distribution_finished: config.initial_distribution_finished,
            auto_rebase: config.auto_rebase,
            events: Vec::new(),
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn fee_collector(&self) -> AccountId {
        self.fee_collector
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Visible token balance; zero for unknown accounts.
    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.store.balance_of(account)
    }

    pub fn shares_of(&self, account: &AccountId) -> u128 {
        self.store.shares_of(account)
    }

    pub fn shares_per_token(&self) -> u128 {
        self.store.shares_per_token()
    }

    pub fn non_excluded_shares(&self) -> u128 {
        self.store.non_excluded_shares()
    }

    pub fn excluded_supply(&self) -> u128 {
        self.store.excluded_supply()
    }

    pub fn is_excluded(&self, account: &AccountId) -> bool {
        self.store.is_excluded(account)
    }

    pub fn is_automated_market_maker_pair(&self, account: &AccountId) -> bool {
        self.amm_pairs.contains(account)
    }

    pub fn is_fee_exempt(&self, account: &AccountId) -> bool {
        self.fee_exempt.contains(account)
    }

    pub fn spend_limit(&self, account: &AccountId) -> Option<SpendLimit> {
        self.spend_limits.limit(account)
    }

    /// Amount recorded against the account's cumulative spend limit.
    pub fn spent(&self, account: &AccountId) -> u128 {
        self.spend_limits.spent(account)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn rebase_config(&self) -> &RebaseConfig {
        &self.rebase.config
    }

    pub fn rebase_state(&self) -> RebaseState {
        self.rebase.state
    }

    pub fn initial_distribution_finished(&self) -> bool {
        self.initial_distribution_finished
    }

    pub fn auto_rebase(&self) -> bool {
        self.auto_rebase
    }

    /// Every account the ledger has a holding for, with its visible balance.
    pub fn balances(&self) -> impl Iterator<Item = (AccountId, u128)> + '_ {
        self.store
            .accounts()
            .map(|(account, _)| (account, self.store.balance_of(&account)))
    }

    /// Every account and its raw holding.
    pub fn holdings(&self) -> impl Iterator<Item = (AccountId, Holding)> + '_ {
        self.store.accounts()
    }

    /// Balance a non-excluded holder of `balance` would have after `rebases`
    /// more rebases at the current rate.
    pub fn projected_balance(&self, balance: u128, rebases: u32) -> LedgerResult<u128> {
        self.rebase.projected_balance(balance, rebases)
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            total_supply: self.total_supply,
            max_supply: self.rebase.config.max_supply,
            shares_per_token: self.store.shares_per_token(),
            non_excluded_shares: self.store.non_excluded_shares(),
            excluded_supply: self.store.excluded_supply(),
            accounts: self.store.len(),
            excluded_accounts: self.store.excluded_accounts().count(),
            epoch: self.rebase.state.epoch,
            next_rebase: self.rebase.state.next_rebase,
            last_rebase: self.rebase.state.last_rebase,
        }
    }

    /// Events committed so far.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Rebase
    // ========================================================================

    /// Apply a scheduled rebase. Fails with `RebaseNotDue` before
    /// `next_rebase`.
    pub fn rebase(&mut self, now: u64) -> LedgerResult<RebaseOutcome> {
        self.rebase.ensure_due(now)?;
        self.apply_rebase(now)
    }

    /// Rebase without checking cadence.
    pub(crate) fn apply_rebase(&mut self, now: u64) -> LedgerResult<RebaseOutcome> {
        let outcome = self.rebase.apply(&mut self.store, self.total_supply, now)?;
        self.total_supply = outcome.total_supply;
        self.events.push(LedgerEvent::Rebase {
            epoch: outcome.epoch,
            growth: outcome.growth,
            total_supply: outcome.total_supply,
            shares_per_token: outcome.shares_per_token,
        });
        Ok(outcome)
    }

    // ========================================================================
    // Atomicity and invariants
    // ========================================================================

    /// Run a multi-step operation, rolling the ledger back if it fails.
    ///
    /// `touched` must name every account whose holding `op` may change.
    /// Supply, ratio, rebase progress and the event log are always restored.
    /// Operations must leave allowance and spend bookkeeping until after
    /// their last fallible step.
    pub(crate) fn atomically<T>(
        &mut self,
        touched: &[AccountId],
        op: impl FnOnce(&mut Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let store = self.store.checkpoint(touched);
        let total_supply = self.total_supply;
        let rebase_state = self.rebase.state;
        let events = self.events.len();

        let result = op(self);
        if result.is_err() {
            self.store.restore(store);
            self.total_supply = total_supply;
            self.rebase.state = rebase_state;
            self.events.truncate(events);
        }
        result
    }

    /// Verify the supply accounting.
    ///
    /// The share pool may read below the non-excluded supply by the rounding
    /// of the ratio, never above it.
    pub fn check_invariants(&self) -> LedgerResult<()> {
        let spt = self.store.shares_per_token();
        if spt == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "shares per token is zero".to_string(),
            ));
        }
        let excluded = self.store.excluded_supply();
        let non_excluded = self.total_supply.checked_sub(excluded).ok_or_else(|| {
            LedgerError::InvalidConfiguration(format!(
                "excluded supply {excluded} exceeds total supply {}",
                self.total_supply
            ))
        })?;
        if self.total_supply > self.rebase.config.max_supply {
            return Err(LedgerError::InvalidConfiguration(format!(
                "total supply {} exceeds max supply {}",
                self.total_supply, self.rebase.config.max_supply
            )));
        }

        let pool = self.store.non_excluded_pool_value();
        if pool > non_excluded {
            return Err(LedgerError::InvalidConfiguration(format!(
                "share pool worth {pool} exceeds non-excluded supply {non_excluded}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::tokens;

    fn owner() -> AccountId {
        AccountId::from_low_u64(1)
    }

    fn collector() -> AccountId {
        AccountId::from_low_u64(2)
    }

    fn ledger() -> RebaseLedger {
        RebaseLedger::genesis(GenesisConfig::new(owner(), collector())).unwrap()
    }

    #[test]
    fn test_genesis() {
        let ledger = ledger();
        assert_eq!(ledger.total_supply(), tokens(1_000_000));
        assert_eq!(ledger.balance_of(&owner()), tokens(1_000_000));
        assert_eq!(ledger.balance_of(&collector()), 0);
        assert!(ledger.is_fee_exempt(&owner()));
        assert!(ledger.is_fee_exempt(&collector()));
        assert!(!ledger.initial_distribution_finished());
        assert_eq!(ledger.rebase_state().epoch, 0);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_genesis_rejects_bad_config() {
        let mut config = GenesisConfig::new(owner(), collector());
        config.fees.buy_fee_bps = 10_000;
        assert!(RebaseLedger::genesis(config).is_err());

        let mut config = GenesisConfig::new(owner(), collector());
        config.initial_supply = config.rebase.max_supply + 1;
        assert!(RebaseLedger::genesis(config).is_err());

        let mut config = GenesisConfig::new(owner(), collector());
        config.initial_supply = 0;
        assert!(RebaseLedger::genesis(config).is_err());
    }

    #[test]
    fn test_scheduled_rebase() {
        let mut ledger = ledger();
        ledger.rebase.state.next_rebase = 1_000;

        assert_eq!(
            ledger.rebase(999),
            Err(LedgerError::RebaseNotDue {
                now: 999,
                next_rebase: 1_000
            })
        );

        let outcome = ledger.rebase(1_000).unwrap();
        assert_eq!(ledger.total_supply(), outcome.total_supply);
        assert!(outcome.growth > 0);
        assert_eq!(ledger.rebase_state().next_rebase, 1_000 + 900);
        assert!(matches!(ledger.events().last(), Some(LedgerEvent::Rebase { epoch: 1, .. })));
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_atomically_rolls_back() {
        let mut ledger = ledger();
        let stranger = AccountId::from_low_u64(9);
        let before = ledger.stats();

        let result: LedgerResult<()> = ledger.atomically(&[owner(), stranger], |l| {
            l.apply_rebase(0)?;
            l.store.debit(owner(), tokens(5))?;
            l.store.credit(stranger, tokens(5))?;
            Err(LedgerError::Overflow)
        });

        assert_eq!(result, Err(LedgerError::Overflow));
        assert_eq!(ledger.stats(), before);
        assert_eq!(ledger.balance_of(&owner()), tokens(1_000_000));
        assert!(ledger.store.holding(&stranger).is_none());
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_take_events_drains() {
        let mut ledger = ledger();
        ledger.rebase(0).unwrap();
        assert_eq!(ledger.take_events().len(), 1);
        assert!(ledger.events().is_empty());
    }
}
