//! Directional transfer fees.
//!
//! A transfer is classified by its counterparties' AMM-pair marks at the time
//! of the transfer:
//!
//! | Recipient is pair | Sender is pair | Kind   |
//! |-------------------|----------------|--------|
//! | yes               | any            | Sell   |
//! | no                | yes            | Buy    |
//! | no                | no             | Normal |
//!
//! Each kind has its own rate and its own on/off toggle. The fee is
//! `floor(amount × rate_bps / 10000)`, always rounding in the payer's favour.

use std::fmt;

use crate::{
    error::{LedgerError, LedgerResult},
    units::BPS_DENOMINATOR,
};

/// Fee rate in basis points (10000 = 100%, 100 = 1%).
pub type FeeRateBps = u32;

/// Direction of a transfer relative to the AMM pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferKind {
    /// Tokens leave an AMM pair.
    Buy,
    /// Tokens enter an AMM pair.
    Sell,
    /// Neither side is an AMM pair.
    Normal,
}

impl TransferKind {
    /// Classify from the counterparties' pair marks; selling wins when both
    /// sides are pairs.
    pub fn classify(sender_is_pair: bool, recipient_is_pair: bool) -> Self {
        if recipient_is_pair {
            TransferKind::Sell
        } else if sender_is_pair {
            TransferKind::Buy
        } else {
            TransferKind::Normal
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferKind::Buy => "buy",
            TransferKind::Sell => "sell",
            TransferKind::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Fee rates and toggles for each transfer kind.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeeSchedule {
    /// Rate charged on buys. Default: 300 bps (3%).
    pub buy_fee_bps: FeeRateBps,

    /// Rate charged on sells. Default: 300 bps (3%).
    pub sell_fee_bps: FeeRateBps,

    /// Rate charged on wallet-to-wallet transfers. Default: 300 bps (3%).
    pub normal_fee_bps: FeeRateBps,

    pub fees_on_buy: bool,
    pub fees_on_sell: bool,
    pub fees_on_normal_transfers: bool,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            buy_fee_bps: 300,
            sell_fee_bps: 300,
            normal_fee_bps: 300,
            fees_on_buy: true,
            fees_on_sell: true,
            fees_on_normal_transfers: false,
        }
    }
}

impl FeeSchedule {
    /// A schedule that never charges.
    pub fn disabled() -> Self {
        Self {
            fees_on_buy: false,
            fees_on_sell: false,
            fees_on_normal_transfers: false,
            ..Default::default()
        }
    }

    /// Reject any rate at or above 100%.
    pub fn validate(&self) -> LedgerResult<()> {
        for (name, rate) in [
            ("buy", self.buy_fee_bps),
            ("sell", self.sell_fee_bps),
            ("normal", self.normal_fee_bps),
        ] {
            validate_rate(name, rate)?;
        }
        Ok(())
    }

    /// The rate that applies to `kind`, or `None` when its toggle is off.
    pub fn active_rate_bps(&self, kind: TransferKind) -> Option<FeeRateBps> {
        match kind {
            TransferKind::Buy if self.fees_on_buy => Some(self.buy_fee_bps),
            TransferKind::Sell if self.fees_on_sell => Some(self.sell_fee_bps),
            TransferKind::Normal if self.fees_on_normal_transfers => Some(self.normal_fee_bps),
            _ => None,
        }
    }

    /// Compute the fee for a transfer of `amount`.
    ///
    /// # Returns
    /// (fee_amount, net_amount_after_fee)
    pub fn compute_fee(&self, kind: TransferKind, amount: u128) -> (u128, u128) {
        let Some(rate_bps) = self.active_rate_bps(kind) else {
            return (0, amount);
        };
        let fee = fee_for(amount, rate_bps);
        (fee, amount - fee)
    }
}

/// `floor(amount × rate_bps / 10000)` without overflowing.
pub fn fee_for(amount: u128, rate_bps: FeeRateBps) -> u128 {
    let rate = rate_bps as u128;
    (amount / BPS_DENOMINATOR) * rate + (amount % BPS_DENOMINATOR) * rate / BPS_DENOMINATOR
}

/// Reject a rate at or above 100%.
pub fn validate_rate(name: &str, rate_bps: FeeRateBps) -> LedgerResult<()> {
    if rate_bps as u128 >= BPS_DENOMINATOR {
        return Err(LedgerError::InvalidConfiguration(format!(
            "{name} fee of {rate_bps} bps must be below {BPS_DENOMINATOR} bps"
        )));
    }
    Ok(())
}
