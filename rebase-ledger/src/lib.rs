//! Accounting core of the Evo rebasing token.
//!
//! The ledger periodically inflates its supply through a *rebase* without
//! writing to any holder's record, charges direction-dependent fees on
//! transfers, lets the owner exclude accounts from rebase growth, and
//! enforces per-wallet spend limits.
//!
//! ## Lazy Rebase
//!
//! Non-excluded accounts hold *shares*. Their balance is
//! `shares / shares_per_token`, so a rebase only changes the ratio:
//!
//! | Operation      | Writes                                  | Cost  |
//! |----------------|-----------------------------------------|-------|
//! | Rebase         | `shares_per_token`, `total_supply`      | O(1)  |
//! | Transfer       | sender, recipient, fee collector        | O(log n) |
//! | Exclusion      | one account, pool totals, ratio         | O(log n) |
//!
//! ## Transfer Kinds
//!
//! | Kind   | When                          | Default fee |
//! |--------|-------------------------------|-------------|
//! | Sell   | Recipient is an AMM pair      | 3% (on)     |
//! | Buy    | Sender is an AMM pair         | 3% (on)     |
//! | Normal | Neither side is an AMM pair   | 3% (off)    |
//!
//! ## Key Concepts
//!
//! - **Excluded account**: holds real token units that rebases never touch.
//! - **Fee collector**: receives every fee in the same operation that
//!   charged it.
//! - **Spend limit**: an owner-set cap, per transfer or cumulative.
//!
//! Every operation either commits completely or returns a [`LedgerError`]
//! and leaves the ledger as it was.

pub mod account;
pub mod error;
pub mod event;
pub mod fee;
pub mod ledger;
pub mod rebase;
pub mod shares;
#[cfg(feature = "serde")]
pub mod snapshot;
pub mod spend_limit;
pub mod transfer;
pub mod units;

mod admin;
mod exclusion;

pub use account::{AccountId, AccountIdParseError};
pub use error::{LedgerError, LedgerResult};
pub use event::LedgerEvent;
pub use exclusion::ExclusionTransition;
pub use fee::{FeeRateBps, FeeSchedule, TransferKind};
pub use ledger::{GenesisConfig, LedgerStats, RebaseLedger};
pub use rebase::{RebaseConfig, RebaseEngine, RebaseOutcome, RebaseRate, RebaseState};
pub use shares::{Holding, ScaledBalanceStore};
#[cfg(feature = "serde")]
pub use snapshot::{AccountSnapshot, AllowanceSnapshot, LedgerSnapshot, SNAPSHOT_VERSION};
pub use spend_limit::{SpendLimit, SpendLimitGuard, SpendLimitMode, WalletLimit};
pub use transfer::{TransferReceipt, UNLIMITED_ALLOWANCE};
pub use units::{format_token_amount, parse_token_amount, tokens, DECIMALS, UNIT};
