//! Events emitted by committed ledger operations.

use crate::{account::AccountId, fee::TransferKind};

/// Record of a state change, appended in commit order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LedgerEvent {
    /// Tokens moved between accounts. `fee` went to the fee collector.
    Transfer {
        sender: AccountId,
        recipient: AccountId,
        net_amount: u128,
        fee: u128,
        kind: TransferKind,
    },

    Approval {
        owner: AccountId,
        spender: AccountId,
        amount: u128,
    },

    /// Supply grew by `growth`.
    Rebase {
        epoch: u64,
        growth: u128,
        total_supply: u128,
        shares_per_token: u128,
    },

    ExclusionChanged {
        account: AccountId,
        excluded: bool,
        balance: u128,
    },

    Burn {
        account: AccountId,
        amount: u128,
    },

    OwnershipTransferred {
        previous: AccountId,
        owner: AccountId,
    },
}
