//! Owner-gated administration.
//!
//! Every operation here takes the caller and fails with `Unauthorized` unless
//! it is the current owner. Rejected calls change nothing.

use tracing::{info, warn};

use crate::{
    account::AccountId,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    exclusion::ExclusionTransition,
    fee::{validate_rate, FeeRateBps},
    ledger::RebaseLedger,
    rebase::{RebaseOutcome, RebaseRate},
    spend_limit::SpendLimit,
};

impl RebaseLedger {
    /// Fail with `Unauthorized` unless `caller` owns the ledger.
    pub fn ensure_owner(&self, caller: &AccountId) -> LedgerResult<()> {
        if *caller != self.owner {
            warn!(caller = %caller, "Rejected admin call from non-owner");
            return Err(LedgerError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    /// Move an account into or out of rebase participation.
    pub fn set_excluded(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        excluded: bool,
    ) -> LedgerResult<ExclusionTransition> {
        self.ensure_owner(caller)?;
        let transition = self.store.set_excluded(account, excluded, self.total_supply)?;
        if transition.changed {
            info!(account = %account, excluded, balance = transition.balance, "Exclusion changed");
            self.events.push(LedgerEvent::ExclusionChanged {
                account,
                excluded,
                balance: transition.balance,
            });
        }
        Ok(transition)
    }

    pub fn set_fees_on_normal_transfers(
        &mut self,
        caller: &AccountId,
        enabled: bool,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.fees.fees_on_normal_transfers = enabled;
        info!(enabled, "Normal transfer fees toggled");
        Ok(())
    }

    pub fn set_fees_on_buy(&mut self, caller: &AccountId, enabled: bool) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.fees.fees_on_buy = enabled;
        info!(enabled, "Buy fees toggled");
        Ok(())
    }

    pub fn set_fees_on_sell(&mut self, caller: &AccountId, enabled: bool) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.fees.fees_on_sell = enabled;
        info!(enabled, "Sell fees toggled");
        Ok(())
    }

    /// Replace all three fee rates. Each must be below 100%.
    pub fn set_fee_rates(
        &mut self,
        caller: &AccountId,
        buy_fee_bps: FeeRateBps,
        sell_fee_bps: FeeRateBps,
        normal_fee_bps: FeeRateBps,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        validate_rate("buy", buy_fee_bps)?;
        validate_rate("sell", sell_fee_bps)?;
        validate_rate("normal", normal_fee_bps)?;

        self.fees.buy_fee_bps = buy_fee_bps;
        self.fees.sell_fee_bps = sell_fee_bps;
        self.fees.normal_fee_bps = normal_fee_bps;
        info!(buy_fee_bps, sell_fee_bps, normal_fee_bps, "Fee rates updated");
        Ok(())
    }

    pub fn set_fee_exempt(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        exempt: bool,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if exempt {
            self.fee_exempt.insert(account);
        } else {
            self.fee_exempt.remove(&account);
        }
        info!(account = %account, exempt, "Fee exemption changed");
        Ok(())
    }

    /// Route future fees to `collector`. Exemptions are not moved.
    pub fn set_fee_collector(
        &mut self,
        caller: &AccountId,
        collector: AccountId,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        info!(previous = %self.fee_collector, collector = %collector, "Fee collector changed");
        self.fee_collector = collector;
        Ok(())
    }

    pub fn set_automated_market_maker_pair(
        &mut self,
        caller: &AccountId,
        pair: AccountId,
        is_pair: bool,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if is_pair {
            self.amm_pairs.insert(pair);
        } else {
            self.amm_pairs.remove(&pair);
        }
        info!(pair = %pair, is_pair, "AMM pair mark changed");
        Ok(())
    }

    /// Set or clear an account's spend limit. Recorded spend starts over.
    pub fn set_specific_wallet_spend_limit(
        &mut self,
        caller: &AccountId,
        account: AccountId,
        limit: Option<SpendLimit>,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.spend_limits.set_limit(account, limit);
        info!(account = %account, limit = ?limit, "Spend limit changed");
        Ok(())
    }

    pub fn set_rebase_frequency(
        &mut self,
        caller: &AccountId,
        frequency_secs: u64,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        if frequency_secs == 0 {
            return Err(LedgerError::InvalidConfiguration(
                "rebase frequency must be non-zero".to_string(),
            ));
        }
        self.rebase.config.frequency_secs = frequency_secs;
        info!(frequency_secs, "Rebase frequency changed");
        Ok(())
    }

    pub fn set_next_rebase(&mut self, caller: &AccountId, next_rebase: u64) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.rebase.state.next_rebase = next_rebase;
        info!(next_rebase, "Next rebase rescheduled");
        Ok(())
    }

    pub fn set_rebase_rate(&mut self, caller: &AccountId, rate: RebaseRate) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        rate.validate()?;
        self.rebase.config.rate = rate;
        info!(
            numerator = rate.numerator,
            denominator = rate.denominator,
            "Rebase rate changed"
        );
        Ok(())
    }

    pub fn set_auto_rebase(&mut self, caller: &AccountId, enabled: bool) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.auto_rebase = enabled;
        info!(enabled, "Auto-rebase toggled");
        Ok(())
    }

    pub fn set_initial_distribution_finished(
        &mut self,
        caller: &AccountId,
        finished: bool,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        self.initial_distribution_finished = finished;
        info!(finished, "Initial distribution flag changed");
        Ok(())
    }

    /// Rebase now regardless of cadence. Also pushes `next_rebase` to
    /// `now + frequency`.
    pub fn manual_rebase(&mut self, caller: &AccountId, now: u64) -> LedgerResult<RebaseOutcome> {
        self.ensure_owner(caller)?;
        self.apply_rebase(now)
    }

    /// Hand the ledger to a new owner.
    ///
    /// Fee exemption stays with the accounts that have it.
    pub fn transfer_ownership(
        &mut self,
        caller: &AccountId,
        new_owner: AccountId,
    ) -> LedgerResult<()> {
        self.ensure_owner(caller)?;
        let previous = self.owner;
        self.owner = new_owner;
        info!(previous = %previous, owner = %new_owner, "Ownership transferred");
        self.events.push(LedgerEvent::OwnershipTransferred {
            previous,
            owner: new_owner,
        });
        Ok(())
    }
}
