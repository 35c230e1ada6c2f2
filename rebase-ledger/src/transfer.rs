//! Transfer pipeline.
//!
//! One transfer runs these steps in order, all inside a single rollback
//! scope:
//!
//! 1. Auto-rebase, if enabled and due.
//! 2. Transfer lock: before the initial distribution is finished only the
//!    owner may send.
//! 3. Balance check.
//! 4. Spend-limit check.
//! 5. Fee classification and computation (zero if either side is exempt).
//! 6. Debit the sender, credit the net amount to the recipient and the fee to
//!    the fee collector.
//! 7. Record spend and emit the event.
//!
//! Any failure restores the state from before step 1, including the
//! auto-rebase.

use tracing::debug;

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    fee::TransferKind,
    ledger::RebaseLedger,
    rebase::RebaseOutcome,
};

/// What a committed transfer did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferReceipt {
    pub sender: AccountId,
    pub recipient: AccountId,

    /// Amount debited from the sender.
    pub amount: u128,

    /// Amount credited to the fee collector.
    pub fee: u128,

    /// Amount credited to the recipient.
    pub net_amount: u128,

    pub kind: TransferKind,

    /// Rebase applied at the start of the transfer, if any.
    pub rebase: Option<RebaseOutcome>,
}

/// Allowance value that is never decremented.
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;

impl RebaseLedger {
    /// Move `amount` from `sender` to `recipient`, charging any applicable
    /// fee out of the amount.
    pub fn transfer(
        &mut self,
        sender: AccountId,
        recipient: AccountId,
        amount: u128,
        now: u64,
    ) -> LedgerResult<TransferReceipt> {
        let touched = [sender, recipient, self.fee_collector];
        self.atomically(&touched, |ledger| {
            ledger.execute_transfer(sender, recipient, amount, now)
        })
    }

    /// Transfer on behalf of `sender`, consuming `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: AccountId,
        sender: AccountId,
        recipient: AccountId,
        amount: u128,
        now: u64,
    ) -> LedgerResult<TransferReceipt> {
        let available = self.allowance(&sender, &spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                available,
                requested: amount,
            });
        }

        let receipt = self.transfer(sender, recipient, amount, now)?;

        if available != UNLIMITED_ALLOWANCE {
            self.allowances
                .insert((sender, spender), available - amount);
        }
        Ok(receipt)
    }

    /// Let `spender` move up to `amount` of `owner`'s tokens.
    ///
    /// [`UNLIMITED_ALLOWANCE`] is never decremented.
    pub fn approve(&mut self, owner: AccountId, spender: AccountId, amount: u128) {
        if amount == 0 {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), amount);
        }
        debug!(owner = %owner, spender = %spender, amount, "Allowance set");
        self.events.push(LedgerEvent::Approval {
            owner,
            spender,
            amount,
        });
    }

    /// Destroy `amount` of the holder's own tokens, shrinking total supply.
    pub fn burn(&mut self, holder: AccountId, amount: u128) -> LedgerResult<()> {
        self.atomically(&[holder], |ledger| {
            ledger.store.debit(holder, amount)?;
            ledger.total_supply = ledger
                .total_supply
                .checked_sub(amount)
                .ok_or(LedgerError::Overflow)?;
            debug!(holder = %holder, amount, total_supply = ledger.total_supply, "Burn");
            ledger.events.push(LedgerEvent::Burn {
                account: holder,
                amount,
            });
            Ok(())
        })
    }

    fn execute_transfer(
        &mut self,
        sender: AccountId,
        recipient: AccountId,
        amount: u128,
        now: u64,
    ) -> LedgerResult<TransferReceipt> {
        let rebase = if self.auto_rebase && self.rebase.is_due(now) {
            Some(self.apply_rebase(now)?)
        } else {
            None
        };

        if !self.initial_distribution_finished && sender != self.owner {
            return Err(LedgerError::TransfersLocked);
        }

        let available = self.store.balance_of(&sender);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        self.spend_limits.check(&sender, amount)?;

        let kind = TransferKind::classify(
            self.is_automated_market_maker_pair(&sender),
            self.is_automated_market_maker_pair(&recipient),
        );
        let (fee, net_amount) = if self.is_fee_exempt(&sender) || self.is_fee_exempt(&recipient) {
            (0, amount)
        } else {
            self.fees.compute_fee(kind, amount)
        };

        self.store.debit(sender, amount)?;
        self.store.credit(recipient, net_amount)?;
        if fee > 0 {
            self.store.credit(self.fee_collector, fee)?;
        }

        self.spend_limits.record(&sender, amount);

        debug!(
            sender = %sender,
            recipient = %recipient,
            amount,
            fee,
            kind = %kind,
            "Transfer"
        );
        self.events.push(LedgerEvent::Transfer {
            sender,
            recipient,
            net_amount,
            fee,
            kind,
        });

        Ok(TransferReceipt {
            sender,
            recipient,
            amount,
            fee,
            net_amount,
            kind,
            rebase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::GenesisConfig,
        spend_limit::SpendLimit,
        units::{tokens, UNIT},
    };

    const OWNER: u64 = 1;
    const COLLECTOR: u64 = 2;
    const ALICE: u64 = 10;
    const BOB: u64 = 11;
    const PAIR: u64 = 20;

    fn id(n: u64) -> AccountId {
        AccountId::from_low_u64(n)
    }

    /// Unlocked ledger with 10,000 tokens on Alice and a registered pair.
    fn ledger() -> RebaseLedger {
        let mut config = GenesisConfig::new(id(OWNER), id(COLLECTOR));
        config.initial_distribution_finished = true;
        config.next_rebase = 1_000;
        let mut ledger = RebaseLedger::genesis(config).unwrap();
        ledger.transfer(id(OWNER), id(ALICE), tokens(10_000), 0).unwrap();
        ledger.amm_pairs.insert(id(PAIR));
        ledger.take_events();
        ledger
    }

    #[test]
    fn test_normal_transfer_with_fee() {
        let mut ledger = ledger();
        ledger.fees.fees_on_normal_transfers = true;

        let receipt = ledger.transfer(id(ALICE), id(BOB), tokens(50), 0).unwrap();

        assert_eq!(receipt.kind, TransferKind::Normal);
        assert_eq!(receipt.fee, 3 * UNIT / 2);
        assert_eq!(ledger.balance_of(&id(BOB)), 48 * UNIT + UNIT / 2);
        assert_eq!(ledger.balance_of(&id(ALICE)), tokens(9_950));
        assert_eq!(ledger.balance_of(&id(COLLECTOR)), 3 * UNIT / 2);
        assert_eq!(ledger.events().len(), 1);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_buy_and_sell_classification() {
        let mut ledger = ledger();
        ledger.transfer(id(ALICE), id(PAIR), tokens(1_000), 0).unwrap();
        assert_eq!(ledger.balance_of(&id(PAIR)), tokens(970));

        let receipt = ledger.transfer(id(PAIR), id(BOB), tokens(100), 0).unwrap();
        assert_eq!(receipt.kind, TransferKind::Buy);
        assert_eq!(receipt.net_amount, tokens(97));

        ledger.fees.fees_on_buy = false;
        let receipt = ledger.transfer(id(PAIR), id(BOB), tokens(100), 0).unwrap();
        assert_eq!(receipt.fee, 0);
    }

    #[test]
    fn test_fee_exempt_side_pays_nothing() {
        let mut ledger = ledger();
        let receipt = ledger.transfer(id(OWNER), id(PAIR), tokens(100), 0).unwrap();
        assert_eq!(receipt.kind, TransferKind::Sell);
        assert_eq!(receipt.fee, 0);
        assert_eq!(ledger.balance_of(&id(PAIR)), tokens(100));
    }

    #[test]
    fn test_zero_balance_transfer_fails() {
        let mut ledger = ledger();
        let result = ledger.transfer(id(BOB), id(ALICE), 1, 0);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientBalance {
                available: 0,
                requested: 1
            })
        );
    }

    #[test]
    fn test_zero_amount_transfer_succeeds() {
        let mut ledger = ledger();
        let receipt = ledger.transfer(id(BOB), id(ALICE), 0, 0).unwrap();
        assert_eq!(receipt.net_amount, 0);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn test_transfers_locked_before_distribution() {
        let mut ledger = ledger();
        ledger.initial_distribution_finished = false;

        assert_eq!(
            ledger.transfer(id(ALICE), id(BOB), 1, 0),
            Err(LedgerError::TransfersLocked)
        );
        assert!(ledger.transfer(id(OWNER), id(BOB), 1, 0).is_ok());
    }

    #[test]
    fn test_spend_limit_blocks_without_side_effects() {
        let mut ledger = ledger();
        ledger
            .spend_limits
            .set_limit(id(ALICE), Some(SpendLimit::cumulative(tokens(100))));

        ledger.transfer(id(ALICE), id(BOB), tokens(100), 0).unwrap();
        let result = ledger.transfer(id(ALICE), id(BOB), 1, 0);

        assert!(matches!(result, Err(LedgerError::SpendLimitExceeded { .. })));
        assert_eq!(ledger.balance_of(&id(ALICE)), tokens(9_900));
        assert_eq!(ledger.spent(&id(ALICE)), tokens(100));
    }

    #[test]
    fn test_failed_transfer_rolls_back_auto_rebase() {
        let mut ledger = ledger();
        ledger.auto_rebase = true;
        let supply = ledger.total_supply();

        let result = ledger.transfer(id(BOB), id(ALICE), 1, 5_000);

        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.total_supply(), supply);
        assert_eq!(ledger.rebase_state().epoch, 0);
        assert_eq!(ledger.rebase_state().next_rebase, 1_000);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_auto_rebase_before_transfer() {
        let mut ledger = ledger();
        ledger.auto_rebase = true;

        let receipt = ledger.transfer(id(ALICE), id(BOB), tokens(1), 999).unwrap();
        assert!(receipt.rebase.is_none());

        let receipt = ledger.transfer(id(ALICE), id(BOB), tokens(1), 1_000).unwrap();
        let outcome = receipt.rebase.unwrap();
        assert_eq!(outcome.epoch, 1);
        assert_eq!(ledger.total_supply(), outcome.total_supply);
        assert!(ledger.balance_of(&id(ALICE)) > tokens(9_998));
    }

    #[test]
    fn test_self_transfer() {
        let mut ledger = ledger();
        ledger.fees.fees_on_normal_transfers = true;

        let receipt = ledger.transfer(id(ALICE), id(ALICE), tokens(100), 0).unwrap();
        assert_eq!(ledger.balance_of(&id(ALICE)), tokens(10_000) - receipt.fee);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = ledger();
        ledger.approve(id(ALICE), id(BOB), tokens(60));

        ledger
            .transfer_from(id(BOB), id(ALICE), id(BOB), tokens(50), 0)
            .unwrap();
        assert_eq!(ledger.allowance(&id(ALICE), &id(BOB)), tokens(10));

        let result = ledger.transfer_from(id(BOB), id(ALICE), id(BOB), tokens(11), 0);
        assert_eq!(
            result,
            Err(LedgerError::InsufficientAllowance {
                available: tokens(10),
                requested: tokens(11)
            })
        );

        ledger.approve(id(ALICE), id(BOB), UNLIMITED_ALLOWANCE);
        ledger
            .transfer_from(id(BOB), id(ALICE), id(BOB), tokens(100), 0)
            .unwrap();
        assert_eq!(ledger.allowance(&id(ALICE), &id(BOB)), UNLIMITED_ALLOWANCE);
    }

    #[test]
    fn test_failed_transfer_from_keeps_allowance() {
        let mut ledger = ledger();
        ledger.approve(id(BOB), id(ALICE), tokens(5));

        let result = ledger.transfer_from(id(ALICE), id(BOB), id(ALICE), tokens(5), 0);
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
        assert_eq!(ledger.allowance(&id(BOB), &id(ALICE)), tokens(5));
    }

    #[test]
    fn test_burn_shrinks_supply() {
        let mut ledger = ledger();
        let supply = ledger.total_supply();

        ledger.burn(id(ALICE), tokens(1_000)).unwrap();
        assert_eq!(ledger.total_supply(), supply - tokens(1_000));
        assert_eq!(ledger.balance_of(&id(ALICE)), tokens(9_000));
        ledger.check_invariants().unwrap();

        assert!(matches!(
            ledger.burn(id(BOB), 1),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.total_supply(), supply - tokens(1_000));
    }
}
