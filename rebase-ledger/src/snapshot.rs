//! Serializable ledger snapshots.
//!
//! A snapshot is one state record plus one record per account and one per
//! allowance. Loading recomputes the pool totals from the account records and
//! rejects a snapshot whose stored totals disagree.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
    fee::FeeSchedule,
    ledger::RebaseLedger,
    rebase::{RebaseConfig, RebaseEngine, RebaseState},
    shares::{Holding, ScaledBalanceStore},
    spend_limit::{SpendLimitGuard, WalletLimit},
};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete persisted ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Snapshot format version for compatibility
    pub version: u32,

    pub owner: AccountId,
    pub fee_collector: AccountId,
    pub total_supply: u128,
    pub shares_per_token: u128,
    pub non_excluded_shares: u128,
    pub excluded_supply: u128,
    pub fees: FeeSchedule,
    pub rebase_config: RebaseConfig,
    pub rebase_state: RebaseState,
    pub initial_distribution_finished: bool,
    pub auto_rebase: bool,

    /// Per-account records, in address order.
    pub accounts: Vec<AccountSnapshot>,

    #[serde(default)]
    pub allowances: Vec<AllowanceSnapshot>,
}

/// Everything the ledger knows about one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: AccountId,

    /// `None` for accounts that were configured but never credited.
    #[serde(default)]
    pub holding: Option<Holding>,

    #[serde(default)]
    pub is_automated_market_maker_pair: bool,

    #[serde(default)]
    pub is_fee_exempt: bool,

    #[serde(default)]
    pub spend_limit: Option<WalletLimit>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSnapshot {
    pub owner: AccountId,
    pub spender: AccountId,
    pub amount: u128,
}

impl RebaseLedger {
    /// Capture the full ledger state. The event log is not included.
    pub fn to_snapshot(&self) -> LedgerSnapshot {
        let mut accounts: BTreeMap<AccountId, AccountSnapshot> = BTreeMap::new();
        for (account, holding) in self.store.accounts() {
            record(&mut accounts, account).holding = Some(holding);
        }
        for account in &self.amm_pairs {
            record(&mut accounts, *account).is_automated_market_maker_pair = true;
        }
        for account in &self.fee_exempt {
            record(&mut accounts, *account).is_fee_exempt = true;
        }
        for (account, wallet) in self.spend_limits.iter() {
            record(&mut accounts, account).spend_limit = Some(wallet);
        }

        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            owner: self.owner,
            fee_collector: self.fee_collector,
            total_supply: self.total_supply,
            shares_per_token: self.store.shares_per_token(),
            non_excluded_shares: self.store.non_excluded_shares(),
            excluded_supply: self.store.excluded_supply(),
            fees: self.fees.clone(),
            rebase_config: self.rebase.config.clone(),
            rebase_state: self.rebase.state,
            initial_distribution_finished: self.initial_distribution_finished,
            auto_rebase: self.auto_rebase,
            accounts: accounts.into_values().collect(),
            allowances: self
                .allowances
                .iter()
                .map(|(&(owner, spender), &amount)| AllowanceSnapshot {
                    owner,
                    spender,
                    amount,
                })
                .collect(),
        }
    }

    /// Rebuild a ledger from a snapshot, validating its accounting.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> LedgerResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::InvalidConfiguration(format!(
                "snapshot version mismatch: expected {SNAPSHOT_VERSION}, got {}",
                snapshot.version
            )));
        }
        snapshot.fees.validate()?;
        snapshot.rebase_config.rate.validate()?;

        let mut seen = BTreeSet::new();
        for record in &snapshot.accounts {
            if !seen.insert(record.account) {
                return Err(LedgerError::InvalidConfiguration(format!(
                    "duplicate snapshot record for {}",
                    record.account
                )));
            }
        }

        let store = ScaledBalanceStore::from_holdings(
            snapshot
                .accounts
                .iter()
                .filter_map(|record| record.holding.map(|holding| (record.account, holding))),
            snapshot.shares_per_token,
        )?;
        if store.non_excluded_shares() != snapshot.non_excluded_shares {
            return Err(LedgerError::InvalidConfiguration(format!(
                "account shares sum to {}, snapshot records {}",
                store.non_excluded_shares(),
                snapshot.non_excluded_shares
            )));
        }
        if store.excluded_supply() != snapshot.excluded_supply {
            return Err(LedgerError::InvalidConfiguration(format!(
                "excluded balances sum to {}, snapshot records {}",
                store.excluded_supply(),
                snapshot.excluded_supply
            )));
        }

        let mut spend_limits = SpendLimitGuard::new();
        for record in &snapshot.accounts {
            if let Some(wallet) = record.spend_limit {
                spend_limits.restore(record.account, wallet);
            }
        }

        let ledger = Self {
            owner: snapshot.owner,
            fee_collector: snapshot.fee_collector,
            total_supply: snapshot.total_supply,
            store,
            fees: snapshot.fees,
            spend_limits,
            amm_pairs: snapshot
                .accounts
                .iter()
                .filter(|r| r.is_automated_market_maker_pair)
                .map(|r| r.account)
                .collect(),
            fee_exempt: snapshot
                .accounts
                .iter()
                .filter(|r| r.is_fee_exempt)
                .map(|r| r.account)
                .collect(),
            allowances: snapshot
                .allowances
                .iter()
                .map(|a| ((a.owner, a.spender), a.amount))
                .collect(),
            rebase: RebaseEngine {
                config: snapshot.rebase_config,
                state: snapshot.rebase_state,
            },
            initial_distribution_finished: snapshot.initial_distribution_finished,
            auto_rebase: snapshot.auto_rebase,
            events: Vec::new(),
        };
        ledger.check_invariants()?;
        Ok(ledger)
    }
}

fn record(
    accounts: &mut BTreeMap<AccountId, AccountSnapshot>,
    account: AccountId,
) -> &mut AccountSnapshot {
    accounts.entry(account).or_insert_with(|| AccountSnapshot {
        account,
        holding: None,
        is_automated_market_maker_pair: false,
        is_fee_exempt: false,
        spend_limit: None,
    })
}
