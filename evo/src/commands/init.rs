use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::Config;

/// Run the init command
pub fn run(config_path: &Path, force: bool) -> Result<()> {
    if Config::exists(config_path) && !force {
        bail!(
            "Config already exists at {}\nUse --force to overwrite it.",
            config_path.display()
        );
    }

    let config = Config::default();
    config.save(config_path)?;

    info!("Config initialized at {}", config_path.display());
    println!("\nDefault ledger configuration created.");
    println!("Config saved to: {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Edit [token], [fees] and [rebase] to taste");
    println!("  2. Run 'evo replay <scenario.toml>' to exercise the ledger");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evo").join("config.toml");

        run(&path, false).unwrap();
        assert!(Config::load(&path).is_ok());

        assert!(run(&path, false).is_err());
        run(&path, true).unwrap();
    }
}
