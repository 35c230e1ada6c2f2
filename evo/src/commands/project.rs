use anyhow::{Context, Result};
use evo_rebase_ledger::{format_token_amount, parse_token_amount, RebaseConfig, RebaseEngine};
use std::path::Path;

use crate::config::Config;

/// Compound a balance over a number of rebases at the configured rate
pub fn run(config_path: &Path, amount: &str, rebases: u32) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let start = parse_token_amount(amount).with_context(|| format!("Bad amount '{amount}'"))?;
    let projected = projection(&config, start, rebases)?;

    let rate = config.rebase.rate();
    let per_day = 86_400 / config.rebase.frequency_secs.max(1);

    println!();
    println!("=== Rebase Projection ===");
    println!(
        "Rate:      {}/{} per rebase ({:.6}%)",
        rate.numerator,
        rate.denominator,
        rate.as_f64() * 100.0
    );
    println!(
        "Frequency: every {}s ({} per day)",
        config.rebase.frequency_secs, per_day
    );
    println!("Start:     {}", format_token_amount(start));
    println!("After {rebases} rebases: {}", format_token_amount(projected));
    println!();

    Ok(())
}

/// Projected balance of a non-excluded holder.
pub fn projection(config: &Config, start: u128, rebases: u32) -> Result<u128> {
    let genesis = config.genesis()?;
    let engine = RebaseEngine::new(
        RebaseConfig {
            max_supply: u128::MAX,
            ..genesis.rebase
        },
        genesis.next_rebase,
    )?;
    Ok(engine.projected_balance(start, rebases)?)
}
