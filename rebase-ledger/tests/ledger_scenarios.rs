//! End-to-end ledger scenarios.

use evo_rebase_ledger::{
    parse_token_amount, tokens, AccountId, GenesisConfig, LedgerError, LedgerEvent, RebaseLedger,
    RebaseRate, SpendLimit, TransferKind, UNIT,
};

fn id(n: u64) -> AccountId {
    AccountId::from_low_u64(n)
}

const OWNER: u64 = 1;
const COLLECTOR: u64 = 2;
const A: u64 = 10;
const B: u64 = 11;
const C: u64 = 12;
const PAIR: u64 = 20;

/// Ledger unlocked for trading with rebases due from t=1.
fn launched_ledger() -> RebaseLedger {
    let mut ledger = RebaseLedger::genesis(GenesisConfig::new(id(OWNER), id(COLLECTOR))).unwrap();
    let owner = id(OWNER);
    ledger.set_initial_distribution_finished(&owner, true).unwrap();
    ledger.set_next_rebase(&owner, 1).unwrap();
    ledger.set_rebase_frequency(&owner, 1).unwrap();
    ledger
}

#[test]
fn three_percent_fee_then_rebase() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);

    ledger.transfer(owner, id(A), tokens(10_000), 0).unwrap();
    ledger.transfer(owner, id(C), tokens(1_000), 0).unwrap();
    ledger.set_excluded(&owner, id(C), true).unwrap();
    ledger.set_fees_on_normal_transfers(&owner, true).unwrap();

    ledger.transfer(id(A), id(B), tokens(50), 0).unwrap();
    assert_eq!(ledger.balance_of(&id(B)), parse_token_amount("48.5").unwrap());
    assert_eq!(ledger.balance_of(&id(COLLECTOR)), parse_token_amount("1.5").unwrap());

    let owner_before = ledger.balance_of(&owner);
    ledger.manual_rebase(&owner, 10).unwrap();
    let owner_after = ledger.balance_of(&owner);

    let expected = owner_before as f64 * (1.0 + RebaseRate::DEFAULT.as_f64());
    let relative = ((owner_after as f64 - expected) / expected).abs();
    assert!(relative < 1e-12, "relative error {relative}");
    assert_eq!(ledger.balance_of(&id(C)), tokens(1_000));
    ledger.check_invariants().unwrap();
}

#[test]
fn compounding_over_many_rebases() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.transfer(owner, id(A), tokens(10_000), 0).unwrap();

    for now in 1..=100 {
        ledger.rebase(now).unwrap();
    }

    let expected = 10_000.0 * (1.0 + RebaseRate::DEFAULT.as_f64()).powi(100);
    let actual = ledger.balance_of(&id(A)) as f64 / UNIT as f64;
    assert!(((actual - expected) / expected).abs() < 1e-9);
    assert_eq!(ledger.rebase_state().epoch, 100);
    ledger.check_invariants().unwrap();
}

#[test]
fn rebase_cadence_is_enforced() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.set_rebase_frequency(&owner, 900).unwrap();

    ledger.rebase(1).unwrap();
    assert_eq!(
        ledger.rebase(900),
        Err(LedgerError::RebaseNotDue {
            now: 900,
            next_rebase: 901
        })
    );
    ledger.rebase(901).unwrap();
    assert_eq!(ledger.rebase_state().epoch, 2);
}

#[test]
fn buy_sell_asymmetry() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.set_automated_market_maker_pair(&owner, id(PAIR), true).unwrap();
    ledger.set_fee_rates(&owner, 200, 500, 0).unwrap();
    ledger.transfer(owner, id(A), tokens(1_000), 0).unwrap();
    ledger.transfer(owner, id(PAIR), tokens(1_000), 0).unwrap();

    let sell = ledger.transfer(id(A), id(PAIR), tokens(100), 0).unwrap();
    assert_eq!(sell.kind, TransferKind::Sell);
    assert_eq!(sell.fee, tokens(5));

    let buy = ledger.transfer(id(PAIR), id(A), tokens(100), 0).unwrap();
    assert_eq!(buy.kind, TransferKind::Buy);
    assert_eq!(buy.fee, tokens(2));

    ledger.set_fees_on_sell(&owner, false).unwrap();
    let sell = ledger.transfer(id(A), id(PAIR), tokens(100), 0).unwrap();
    assert_eq!(sell.fee, 0);

    // Marks are read at transfer time.
    ledger.set_automated_market_maker_pair(&owner, id(PAIR), false).unwrap();
    let normal = ledger.transfer(id(A), id(PAIR), tokens(100), 0).unwrap();
    assert_eq!(normal.kind, TransferKind::Normal);
}

#[test]
fn exclusion_round_trip_across_rebases() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.transfer(owner, id(C), tokens(5_000), 0).unwrap();

    ledger.set_excluded(&owner, id(C), true).unwrap();
    for now in 1..=10 {
        ledger.rebase(now).unwrap();
    }
    assert_eq!(ledger.balance_of(&id(C)), tokens(5_000));

    ledger.set_excluded(&owner, id(C), false).unwrap();
    let rejoined = ledger.balance_of(&id(C));
    assert!(rejoined.abs_diff(tokens(5_000)) <= 1);

    ledger.rebase(11).unwrap();
    assert!(ledger.balance_of(&id(C)) > tokens(5_000));
    ledger.check_invariants().unwrap();
}

#[test]
fn full_balance_into_excluded_account_after_rebase() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);

    ledger.manual_rebase(&owner, 0).unwrap();
    ledger.set_excluded(&owner, id(C), true).unwrap();

    let balance = ledger.balance_of(&owner);
    assert!(balance <= ledger.total_supply());
    ledger.transfer(owner, id(C), balance, 0).unwrap();

    assert_eq!(ledger.balance_of(&id(C)), balance);
    assert!(ledger.excluded_supply() <= ledger.total_supply());
    ledger.check_invariants().unwrap();

    // The ledger stays usable.
    ledger.set_excluded(&owner, id(A), true).unwrap();
    ledger.burn(id(C), balance).unwrap();
    assert_eq!(ledger.balance_of(&id(C)), 0);
    ledger.check_invariants().unwrap();
}

#[test]
fn spend_limits_in_both_modes() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.transfer(owner, id(A), tokens(1_000), 0).unwrap();
    ledger.transfer(owner, id(B), tokens(1_000), 0).unwrap();

    let limit = SpendLimit::per_transaction(tokens(100));
    ledger
        .set_specific_wallet_spend_limit(&owner, id(A), Some(limit))
        .unwrap();
    ledger
        .set_specific_wallet_spend_limit(&owner, id(B), Some(SpendLimit::cumulative(tokens(100))))
        .unwrap();

    for _ in 0..3 {
        ledger.transfer(id(A), id(C), tokens(100), 0).unwrap();
    }
    assert!(matches!(
        ledger.transfer(id(A), id(C), tokens(100) + 1, 0),
        Err(LedgerError::SpendLimitExceeded { .. })
    ));

    ledger.transfer(id(B), id(C), tokens(60), 0).unwrap();
    ledger.transfer(id(B), id(C), tokens(40), 0).unwrap();
    assert_eq!(
        ledger.transfer(id(B), id(C), 1, 0),
        Err(LedgerError::SpendLimitExceeded {
            account: id(B),
            limit: tokens(100),
            attempted: tokens(100) + 1
        })
    );

    ledger.set_specific_wallet_spend_limit(&owner, id(B), None).unwrap();
    ledger.transfer(id(B), id(C), tokens(500), 0).unwrap();
}

#[test]
fn failed_operations_leave_no_trace() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.set_auto_rebase(&owner, true).unwrap();
    let before = ledger.stats();
    let events = ledger.events().len();

    assert!(ledger.transfer(id(B), id(A), 1, 50).is_err());
    assert!(ledger.set_excluded(&id(B), id(A), true).is_err());
    assert!(ledger.burn(id(B), 1).is_err());

    assert_eq!(ledger.stats(), before);
    assert_eq!(ledger.events().len(), events);
}

#[test]
fn events_record_committed_operations() {
    let mut ledger = launched_ledger();
    let owner = id(OWNER);
    ledger.take_events();

    ledger.transfer(owner, id(A), tokens(10), 0).unwrap();
    ledger.manual_rebase(&owner, 5).unwrap();
    ledger.transfer_ownership(&owner, id(B)).unwrap();

    let events = ledger.take_events();
    assert!(matches!(
        events.as_slice(),
        [
            LedgerEvent::Transfer { fee: 0, .. },
            LedgerEvent::Rebase { epoch: 1, .. },
            LedgerEvent::OwnershipTransferred { .. },
        ]
    ));
}
