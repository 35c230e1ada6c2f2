//! Ledger errors.

use thiserror::Error;

use crate::account::AccountId;

/// Error returned by every rejected ledger operation.
///
/// A rejected operation never leaves a partial update behind: the ledger state
/// after an `Err` is the state before the call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: u128, requested: u128 },

    #[error("Insufficient allowance: have {available}, need {requested}")]
    InsufficientAllowance { available: u128, requested: u128 },

    #[error("Spend limit exceeded for {account}: limit {limit}, attempted {attempted}")]
    SpendLimitExceeded {
        account: AccountId,
        limit: u128,
        attempted: u128,
    },

    #[error("Unauthorized: {caller} is not the ledger owner")]
    Unauthorized { caller: AccountId },

    #[error("Rebase not due: now {now}, next rebase at {next_rebase}")]
    RebaseNotDue { now: u64, next_rebase: u64 },

    #[error("Transfers are locked until the initial distribution is finished")]
    TransfersLocked,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Arithmetic overflow")]
    Overflow,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
