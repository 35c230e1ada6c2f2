//! Scripted ledger scenarios.
//!
//! A scenario is a TOML file with an optional ledger configuration, an
//! optional label table and a list of steps:
//!
//! ```toml
//! start_time = 0
//!
//! [ledger.rebase]
//! initial_distribution_finished = true
//!
//! [accounts]
//! pair = "0x00000000000000000000000000000000000000aa"
//!
//! [[step]]
//! action = "transfer"
//! from = "owner"
//! to = "alice"
//! amount = "10000"
//!
//! [[step]]
//! action = "expect-balance"
//! account = "alice"
//! amount = "10000"
//! ```
//!
//! Accounts are named by label or by `0x` address. `owner` and `collector`
//! are predefined; other unknown labels get fresh addresses on first use.
//! Amounts are decimal token strings. Admin steps run as the owner unless a
//! step sets `caller`. A step with `expect_error` must fail with that error
//! kind.

use std::{collections::BTreeMap, fs, path::Path, str::FromStr, sync::Arc};

use anyhow::{bail, Context, Result};
use evo_rebase_ledger::{
    format_token_amount, parse_token_amount, AccountId, FeeRateBps, LedgerError, SpendLimit,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    clock::{Clock, ManualClock},
    config::Config,
    ledger::SharedLedger,
};

/// First address handed out to auto-assigned labels.
const LABEL_BASE: u64 = 0x1000;

/// A replayable scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Clock value at genesis
    #[serde(default)]
    pub start_time: u64,

    #[serde(default)]
    pub ledger: Config,

    /// Fixed label-to-address assignments
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountId>,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One scripted operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,

    /// Caller for owner-gated actions (defaults to the owner)
    #[serde(default)]
    pub caller: Option<String>,

    /// The step must fail with this error kind, e.g. "InsufficientBalance"
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Transfer {
        from: String,
        to: String,
        amount: String,
    },
    TransferFrom {
        spender: String,
        from: String,
        to: String,
        amount: String,
    },
    Approve {
        owner: String,
        spender: String,
        amount: String,
    },
    /// Scheduled rebase at the current time
    Rebase,
    ManualRebase,
    AdvanceTime {
        secs: u64,
    },
    SetExcluded {
        account: String,
        excluded: bool,
    },
    SetAmmPair {
        account: String,
        is_pair: bool,
    },
    SetFees {
        #[serde(default)]
        buy: Option<bool>,
        #[serde(default)]
        sell: Option<bool>,
        #[serde(default)]
        normal: Option<bool>,
    },
    SetFeeRates {
        buy_bps: FeeRateBps,
        sell_bps: FeeRateBps,
        normal_bps: FeeRateBps,
    },
    SetFeeExempt {
        account: String,
        exempt: bool,
    },
    SetSpendLimit {
        account: String,
        /// Omit to clear the limit
        #[serde(default)]
        amount: Option<String>,
        #[serde(default)]
        cumulative: bool,
    },
    SetAutoRebase {
        enabled: bool,
    },
    SetInitialDistributionFinished {
        finished: bool,
    },
    TransferOwnership {
        to: String,
    },
    Burn {
        account: String,
        amount: String,
    },
    ExpectBalance {
        account: String,
        amount: String,
        /// Allowed absolute difference
        #[serde(default)]
        tolerance: Option<String>,
    },
}

impl Action {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Transfer { .. } => "transfer",
            Action::TransferFrom { .. } => "transfer-from",
            Action::Approve { .. } => "approve",
            Action::Rebase => "rebase",
            Action::ManualRebase => "manual-rebase",
            Action::AdvanceTime { .. } => "advance-time",
            Action::SetExcluded { .. } => "set-excluded",
            Action::SetAmmPair { .. } => "set-amm-pair",
            Action::SetFees { .. } => "set-fees",
            Action::SetFeeRates { .. } => "set-fee-rates",
            Action::SetFeeExempt { .. } => "set-fee-exempt",
            Action::SetSpendLimit { .. } => "set-spend-limit",
            Action::SetAutoRebase { .. } => "set-auto-rebase",
            Action::SetInitialDistributionFinished { .. } => "set-initial-distribution-finished",
            Action::TransferOwnership { .. } => "transfer-ownership",
            Action::Burn { .. } => "burn",
            Action::ExpectBalance { .. } => "expect-balance",
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario from {}", path.display()))?;
        Self::from_str(&contents)
            .with_context(|| format!("Failed to parse scenario from {}", path.display()))
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Name of an error variant, as used by `expect_error`.
pub fn error_kind(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::InsufficientBalance { .. } => "InsufficientBalance",
        LedgerError::InsufficientAllowance { .. } => "InsufficientAllowance",
        LedgerError::SpendLimitExceeded { .. } => "SpendLimitExceeded",
        LedgerError::Unauthorized { .. } => "Unauthorized",
        LedgerError::RebaseNotDue { .. } => "RebaseNotDue",
        LedgerError::TransfersLocked => "TransfersLocked",
        LedgerError::InvalidConfiguration(_) => "InvalidConfiguration",
        LedgerError::Overflow => "Overflow",
    }
}

/// Label-to-address book.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    labels: BTreeMap<String, AccountId>,
    next: u64,
}

impl AccountBook {
    pub fn new(
        owner: AccountId,
        collector: AccountId,
        fixed: &BTreeMap<String,
        AccountId>,
    ) -> Self {
        let mut labels = fixed.clone();
        labels.entry("owner".to_string()).or_insert(owner);
        labels.entry("collector".to_string()).or_insert(collector);
        Self {
            labels,
            next: LABEL_BASE,
        }
    }

    /// Resolve a label or `0x` address, assigning a fresh address to a new
    /// label.
    pub fn resolve(&mut self, name: &str) -> Result<AccountId> {
        if name.starts_with("0x") || name.starts_with("0X") {
            return AccountId::from_str(name).with_context(|| format!("Bad address '{name}'"));
        }
        if let Some(account) = self.labels.get(name) {
            return Ok(*account);
        }
        let account = AccountId::from_low_u64(self.next);
        self.next += 1;
        self.labels.insert(name.to_string(), account);
        Ok(account)
    }

    /// Label for an address, if it has one.
    pub fn label_of(&self, account: &AccountId) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, a)| *a == account)
            .map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AccountId)> {
        self.labels.iter().map(|(l, a)| (l.as_str(), *a))
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    pub steps: usize,

    /// Steps that failed as the scenario expected
    pub expected_failures: usize,

    /// Labelled balances at the end, in label order
    pub balances: Vec<(String, AccountId, u128)>,

    pub total_supply: u128,
    pub epoch: u64,
}

/// Replays a scenario against a fresh ledger on a manual clock.
pub struct ScenarioRunner {
    ledger: SharedLedger,
    clock: Arc<ManualClock>,
    book: AccountBook,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let genesis = scenario.ledger.genesis()?;
        let clock = Arc::new(ManualClock::new(scenario.start_time));
        let book = AccountBook::new(genesis.owner, genesis.fee_collector, &scenario.accounts);
        let ledger =
            SharedLedger::new(genesis, clock.clone()).context("Failed to create ledger")?;
        Ok(Self {
            ledger,
            clock,
            book,
        })
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn book(&self) -> &AccountBook {
        &self.book
    }

    /// Clock time the replay has reached.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Run every step, stopping at the first unexpected outcome.
    pub fn run(&mut self, scenario: &Scenario) -> Result<ReplayReport> {
        let mut expected_failures = 0;

        for (index, step) in scenario.steps.iter().enumerate() {
            let number = index + 1;
            let name = step.action.name();
            let result = self
                .apply(step)
                .with_context(|| format!("Step {number} ({name}) is malformed"))?;

            match (result, &step.expect_error) {
                (Ok(()), None) => debug!(step = number, action = name, "Step applied"),
                (Err(err), Some(expected)) if error_kind(&err) == expected => {
                    debug!(step = number, action = name, error = %err, "Step failed as expected");
                    expected_failures += 1;
                }
                (Err(err), Some(expected)) => {
                    bail!("Step {number} ({name}) failed with {err}, expected {expected}")
                }
                (Err(err), None) => {
                    return Err(err).with_context(|| format!("Step {number} ({name}) failed"))
                }
                (Ok(()), Some(expected)) => {
                    bail!("Step {number} ({name}) succeeded, expected {expected}")
                }
            }

            if let Action::ExpectBalance {
                account,
                amount,
                tolerance,
            } = &step.action
            {
                self.check_balance(number, account, amount, tolerance.as_deref())?;
            }
        }

        let stats = self.ledger.stats();
        info!(
            steps = scenario.steps.len(),
            expected_failures,
            total_supply = stats.total_supply,
            epoch = stats.epoch,
            "Scenario replayed"
        );

        Ok(ReplayReport {
            steps: scenario.steps.len(),
            expected_failures,
            balances: self
                .book
                .iter()
                .map(|(label, account)| {
                    (label.to_string(), account, self.ledger.balance_of(&account))
                })
                .collect(),
            total_supply: stats.total_supply,
            epoch: stats.epoch,
        })
    }

    /// Apply one step. The outer error is a malformed step; the inner one is
    /// the ledger's verdict.
    fn apply(&mut self, step: &Step) -> Result<Result<(), LedgerError>> {
        let caller = match &step.caller {
            Some(name) => self.book.resolve(name)?,
            None => self.ledger.read(|l| l.owner()),
        };

        let outcome = match &step.action {
            Action::Transfer { from, to, amount } => {
                let (from, to) = (self.book.resolve(from)?, self.book.resolve(to)?);
                let amount = amount_of(amount)?;
                self.ledger.transfer(from, to, amount).map(|_| ())
            }
            Action::TransferFrom {
                spender,
                from,
                to,
                amount,
            } => {
                let spender = self.book.resolve(spender)?;
                let (from, to) = (self.book.resolve(from)?, self.book.resolve(to)?);
                let amount = amount_of(amount)?;
                self.ledger.transfer_from(spender, from, to, amount).map(|_| ())
            }
            Action::Approve {
                owner,
                spender,
                amount,
            } => {
                let (owner, spender) = (self.book.resolve(owner)?, self.book.resolve(spender)?);
                let amount = amount_of(amount)?;
                self.ledger.approve(owner, spender, amount);
                Ok(())
            }
            Action::Rebase => self.ledger.rebase().map(|_| ()),
            Action::ManualRebase => self.ledger.manual_rebase(&caller).map(|_| ()),
            Action::AdvanceTime { secs } => {
                self.clock.advance(*secs);
                Ok(())
            }
            Action::SetExcluded { account, excluded } => {
                let account = self.book.resolve(account)?;
                self.ledger
                    .write(|l| l.set_excluded(&caller, account, *excluded))
                    .map(|_| ())
            }
            Action::SetAmmPair { account, is_pair } => {
                let account = self.book.resolve(account)?;
                self.ledger
                    .write(|l| l.set_automated_market_maker_pair(&caller, account, *is_pair))
            }
            Action::SetFees { buy, sell, normal } => {
                self.ledger.write(|l| -> Result<(), LedgerError> {
                    if let Some(enabled) = buy {
                        l.set_fees_on_buy(&caller, *enabled)?;
                    }
                    if let Some(enabled) = sell {
                        l.set_fees_on_sell(&caller, *enabled)?;
                    }
                    if let Some(enabled) = normal {
                        l.set_fees_on_normal_transfers(&caller, *enabled)?;
                    }
                    Ok(())
                })
            }
            Action::SetFeeRates {
                buy_bps,
                sell_bps,
                normal_bps,
            } => self
                .ledger
                .write(|l| l.set_fee_rates(&caller, *buy_bps, *sell_bps, *normal_bps)),
            Action::SetFeeExempt { account, exempt } => {
                let account = self.book.resolve(account)?;
                self.ledger
                    .write(|l| l.set_fee_exempt(&caller, account, *exempt))
            }
            Action::SetSpendLimit {
                account,
                amount,
                cumulative,
            } => {
                let account = self.book.resolve(account)?;
                let limit = match amount {
                    Some(amount) if *cumulative => Some(SpendLimit::cumulative(amount_of(amount)?)),
                    Some(amount) => Some(SpendLimit::per_transaction(amount_of(amount)?)),
                    None => None,
                };
                self.ledger
                    .write(|l| l.set_specific_wallet_spend_limit(&caller, account, limit))
            }
            Action::SetAutoRebase { enabled } => {
                self.ledger.write(|l| l.set_auto_rebase(&caller, *enabled))
            }
            Action::SetInitialDistributionFinished { finished } => self
                .ledger
                .write(|l| l.set_initial_distribution_finished(&caller, *finished)),
            Action::TransferOwnership { to } => {
                let to = self.book.resolve(to)?;
                self.ledger.write(|l| l.transfer_ownership(&caller, to))
            }
            Action::Burn { account, amount } => {
                let (account, amount) = (self.book.resolve(account)?, amount_of(amount)?);
                self.ledger.burn(account, amount)
            }
            Action::ExpectBalance { .. } => Ok(()),
        };
        Ok(outcome)
    }

    fn check_balance(
        &mut self,
        number: usize,
        account: &str,
        amount: &str,
        tolerance: Option<&str>,
    ) -> Result<()> {
        let id = self.book.resolve(account)?;
        let expected = amount_of(amount)?;
        let tolerance = tolerance.map(amount_of).transpose()?.unwrap_or(0);
        let actual = self.ledger.balance_of(&id);

        if actual.abs_diff(expected) > tolerance {
            bail!(
                "Step {number} (expect-balance): {account} holds {}, expected {}",
                format_token_amount(actual),
                format_token_amount(expected)
            );
        }
        Ok(())
    }
}

fn amount_of(amount: &str) -> Result<u128> {
    parse_token_amount(amount).with_context(|| format!("Bad amount '{amount}'"))
}
