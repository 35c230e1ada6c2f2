use anyhow::Result;
use evo_rebase_ledger::format_token_amount;
use std::path::Path;

use crate::scenario::{Scenario, ScenarioRunner};

/// Replay a scenario and print the resulting balances
pub fn run(scenario_path: &Path, snapshot: Option<&Path>) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let mut runner = ScenarioRunner::new(&scenario)?;
    let report = runner.run(&scenario)?;

    println!();
    println!("=== Replay: {} ===", scenario_path.display());
    println!(
        "Steps: {} ({} failed as expected)",
        report.steps, report.expected_failures
    );
    println!("Rebase epoch: {}", report.epoch);
    println!("Total supply: {}", format_token_amount(report.total_supply));
    println!();
    println!("{:<12} {:<44} {:>32}", "Label", "Account", "Balance");
    println!("{}", "-".repeat(90));
    for (label, account, balance) in &report.balances {
        println!(
            "{:<12} {:<44} {:>32}",
            label,
            account.to_string(),
            format_token_amount(*balance)
        );
    }
    println!();

    if let Some(path) = snapshot {
        runner.ledger().save_snapshot(path)?;
        println!("Snapshot saved to: {}", path.display());
    }

    Ok(())
}
