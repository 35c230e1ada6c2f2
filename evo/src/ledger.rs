//! Thread-safe ledger handle.
//!
//! This module wraps `evo_rebase_ledger::RebaseLedger` in a `RwLock` and
//! pairs it with a [`Clock`] so callers never pass timestamps by hand.
//!
//! Every mutation holds the write lock for its whole duration. Queries take
//! the read lock, so a balance is always computed against the ratio it was
//! stored under, never between a rebase and its ratio update.

use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use evo_rebase_ledger::{
    AccountId, GenesisConfig, LedgerResult, LedgerSnapshot, LedgerStats, RebaseLedger,
    RebaseOutcome, TransferReceipt,
};
use parking_lot::RwLock;
use tracing::info;

use crate::clock::Clock;

/// Shared, lock-protected ledger.
#[derive(Clone)]
pub struct SharedLedger {
    inner: Arc<RwLock<RebaseLedger>>,
    clock: Arc<dyn Clock>,
}

impl SharedLedger {
    /// Create a ledger at genesis.
    pub fn new(genesis: GenesisConfig, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        Ok(Self::from_ledger(RebaseLedger::genesis(genesis)?, clock))
    }

    /// Wrap an existing ledger (for loading from persistence).
    pub fn from_ledger(ledger: RebaseLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
            clock,
        }
    }

    /// Current time according to the ledger's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn transfer(
        &self,
        sender: AccountId,
        recipient: AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        let now = self.now();
        self.inner.write().transfer(sender, recipient, amount, now)
    }

    pub fn transfer_from(
        &self,
        spender: AccountId,
        sender: AccountId,
        recipient: AccountId,
        amount: u128,
    ) -> LedgerResult<TransferReceipt> {
        let now = self.now();
        self.inner
            .write()
            .transfer_from(spender, sender, recipient, amount, now)
    }

    pub fn approve(&self, owner: AccountId, spender: AccountId, amount: u128) {
        self.inner.write().approve(owner, spender, amount);
    }

    pub fn burn(&self, holder: AccountId, amount: u128) -> LedgerResult<()> {
        self.inner.write().burn(holder, amount)
    }

    /// Apply a scheduled rebase if one is due now.
    pub fn rebase(&self) -> LedgerResult<RebaseOutcome> {
        let now = self.now();
        self.inner.write().rebase(now)
    }

    /// Owner-forced rebase.
    pub fn manual_rebase(&self, caller: &AccountId) -> LedgerResult<RebaseOutcome> {
        let now = self.now();
        self.inner.write().manual_rebase(caller, now)
    }

    pub fn balance_of(&self, account: &AccountId) -> u128 {
        self.inner.read().balance_of(account)
    }

    pub fn total_supply(&self) -> u128 {
        self.inner.read().total_supply()
    }

    /// Get a statistics snapshot.
    pub fn stats(&self) -> LedgerStats {
        self.inner.read().stats()
    }

    /// Run a read-only query under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&RebaseLedger) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run a mutation under the write lock.
    ///
    /// Used for owner-gated administration, which takes the caller explicitly.
    pub fn write<T>(&self, f: impl FnOnce(&mut RebaseLedger) -> T) -> T {
        f(&mut self.inner.write())
    }

    /// Capture the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().to_snapshot()
    }

    /// Write a JSON snapshot to `path`.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;

        info!(
            path = %path.display(),
            accounts = snapshot.accounts.len(),
            epoch = snapshot.rebase_state.epoch,
            "Snapshot saved"
        );
        Ok(())
    }

    /// Load a ledger from a JSON snapshot, validating its accounting.
    pub fn load_snapshot(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse snapshot from {}", path.display()))?;
        let ledger = RebaseLedger::from_snapshot(snapshot)
            .with_context(|| format!("Invalid snapshot at {}", path.display()))?;
        Ok(Self::from_ledger(ledger, clock))
    }
}

impl std::fmt::Debug for SharedLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SharedLedger")
            .field("total_supply", &stats.total_supply)
            .field("shares_per_token", &stats.shares_per_token)
            .field("excluded_supply", &stats.excluded_supply)
            .field("epoch", &stats.epoch)
            .field("accounts", &stats.accounts)
            .finish()
    }
}
