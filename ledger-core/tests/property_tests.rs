//! Property-based tests for ledger invariants
//!
//! - Double entry: every reference has exactly one CRDT and one DBIT
//!   row with equal amount, currency, subject and timestamp
//! - Conservation: the sum of all signed balances is zero
//! - Debit limit: a posting succeeds iff balance - amount >= -limit

use ledger_core::config::DemobankConfig;
use ledger_core::ledger::{balance, post_transfer, PostingRequest};
use ledger_core::types::{BankAccountRow, CurrencyAmount, Direction};
use ledger_core::{Error, Tables};
use proptest::collection::vec;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;

fn seeded_tables(users_debt_limit: Decimal) -> Tables {
    let mut t = Tables::default();
    let mut demobank = DemobankConfig::default();
    demobank.users_debt_limit = users_debt_limit;
    t.demobanks.insert("default".into(), demobank);
    for (label, iban) in [("alice", "DE00"), ("bob", "DE01")] {
        t.accounts.insert(
            label.into(),
            BankAccountRow {
                label: label.into(),
                iban: iban.into(),
                bic: "SANDBOXX".into(),
                owner: label.into(),
                demobank: "default".into(),
                last_transaction: None,
                last_fiat_submission: None,
            },
        );
    }
    t
}

fn request(from: &str, to: &str, cents: u64) -> PostingRequest {
    PostingRequest {
        demobank: "default".into(),
        debit_account: from.into(),
        credit_account: to.into(),
        subject: "prop".into(),
        amount: CurrencyAmount::new("EUR", Decimal::new(cents as i64, 2)),
        pmt_inf_id: None,
        end_to_end_id: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_double_entry_pairs(transfers in vec((any::<bool>(), 1u64..100_000u64), 1..25)) {
        // Limit high enough that nothing bounces.
        let mut t = seeded_tables(Decimal::from(10_000_000u64));
        for (i, (flip, cents)) in transfers.iter().enumerate() {
            let (from, to) = if *flip { ("alice", "bob") } else { ("bob", "alice") };
            post_transfer(&mut t, &request(from, to, *cents), i as i64).unwrap();
        }

        // Exactly one CRDT and one DBIT row per reference, equal fields.
        let mut by_ref: HashMap<&str, Vec<_>> = HashMap::new();
        for row in t.transactions.values() {
            by_ref.entry(row.account_servicer_ref.as_str()).or_default().push(row);
        }
        for rows in by_ref.values() {
            prop_assert_eq!(rows.len(), 2);
            let crdt = rows.iter().find(|r| r.direction == Direction::Crdt).unwrap();
            let dbit = rows.iter().find(|r| r.direction == Direction::Dbit).unwrap();
            prop_assert_eq!(crdt.amount, dbit.amount);
            prop_assert_eq!(&crdt.currency, &dbit.currency);
            prop_assert_eq!(&crdt.subject, &dbit.subject);
            prop_assert_eq!(crdt.timestamp_ms, dbit.timestamp_ms);
        }

        // Money conservation across the two accounts.
        let alice = balance(&t, "alice", true).unwrap();
        let bob = balance(&t, "bob", true).unwrap();
        prop_assert_eq!(alice + bob, Decimal::ZERO);
    }

    #[test]
    fn prop_debit_limit_rule(
        limit_cents in 0u64..50_000u64,
        opening_cents in 0u64..50_000u64,
        debit_cents in 1u64..100_000u64,
    ) {
        let mut t = seeded_tables(Decimal::new(limit_cents as i64, 2));
        if opening_cents > 0 {
            // Fund alice from bob; bob is allowed the same limit, so give
            // bob headroom by funding within the limit only when possible.
            t.demobanks.get_mut("default").unwrap().users_debt_limit =
                Decimal::new((opening_cents + limit_cents) as i64, 2);
            post_transfer(&mut t, &request("bob", "alice", opening_cents), 0).unwrap();
            t.demobanks.get_mut("default").unwrap().users_debt_limit =
                Decimal::new(limit_cents as i64, 2);
        }

        let opening = balance(&t, "alice", true).unwrap();
        let outcome = post_transfer(&mut t, &request("alice", "bob", debit_cents), 1);
        let projected = opening - Decimal::new(debit_cents as i64, 2);
        let allowed = projected >= -Decimal::new(limit_cents as i64, 2);

        match outcome {
            Ok(_) => prop_assert!(allowed),
            Err(Error::InsufficientFunds) => prop_assert!(!allowed),
            Err(other) => return Err(TestCaseError::fail(format!("unexpected: {}", other))),
        }
    }
}
