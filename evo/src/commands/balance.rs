use anyhow::{Context, Result};
use evo_rebase_ledger::{format_token_amount, AccountId};
use std::{path::Path, str::FromStr, sync::Arc};

use crate::{clock::SystemClock, ledger::SharedLedger};

/// Show one account's balance from a snapshot file
pub fn run(snapshot_path: &Path, account: &str) -> Result<()> {
    let account =
        AccountId::from_str(account).with_context(|| format!("Bad address '{account}'"))?;
    let ledger = SharedLedger::load_snapshot(snapshot_path, Arc::new(SystemClock))?;

    let (balance, shares, excluded) =
        ledger.read(|l| (l.balance_of(&account), l.shares_of(&account), l.is_excluded(&account)));
    let stats = ledger.stats();

    println!();
    println!("=== Balance ===");
    println!("Account: {account}");
    println!("Balance: {}", format_token_amount(balance));
    if excluded {
        println!("         excluded from rebases");
    } else {
        println!("         {shares} shares");
    }
    println!();
    println!("Rebase epoch: {}", stats.epoch);
    println!("Total supply: {}", format_token_amount(stats.total_supply));
    println!();

    Ok(())
}
