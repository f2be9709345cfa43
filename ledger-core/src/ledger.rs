//! Double-entry posting and balance derivation
//!
//! The table-level functions ([`post_transfer`], [`balance`],
//! [`debit_limit_check`]) run inside a caller-provided transaction so
//! other subsystems can compose them with their own writes. The
//! [`Ledger`] facade wraps them in a store transaction and publishes
//! the posting notification after commit.

use crate::config::DemobankConfig;
use crate::error::{Error, Result};
use crate::store::{Store, Tables};
use crate::types::{CurrencyAmount, Direction, FreshTransactionRow, LedgerTransactionRow};
use message_bus::{NotificationBus, Topic};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Label of the institutional account, which gets the larger debt limit.
pub const ADMIN_ACCOUNT: &str = "admin";

/// One internal wire transfer between two local accounts.
#[derive(Debug, Clone)]
pub struct PostingRequest {
    /// Demobank both accounts belong to
    pub demobank: String,
    /// Label of the account to debit
    pub debit_account: String,
    /// Label of the account to credit
    pub credit_account: String,
    /// Unstructured subject
    pub subject: String,
    /// Amount; currency must match the demobank
    pub amount: CurrencyAmount,
    /// pain.001 payment information id, when applicable
    pub pmt_inf_id: Option<String>,
    /// pain.001 end-to-end id, when applicable
    pub end_to_end_id: Option<String>,
}

/// Current balance of an account.
///
/// Starts from the last statement's CLBD (zero when no statement
/// exists); with `with_pending` every younger ledger row is folded in,
/// +amount on CRDT and -amount on DBIT.
pub fn balance(tables: &Tables, account_label: &str, with_pending: bool) -> Result<Decimal> {
    tables.account(account_label)?;
    let (mut bal, since_ms) = match tables.last_statement(account_label) {
        Some(stmt) => (stmt.balance_clbd, Some(stmt.creation_time_ms)),
        None => (Decimal::ZERO, None),
    };
    if with_pending {
        for tx in tables.transactions_for(account_label) {
            if since_ms.map_or(true, |t0| tx.timestamp_ms > t0) {
                match tx.direction {
                    Direction::Crdt => bal += tx.amount,
                    Direction::Dbit => bal -= tx.amount,
                }
            }
        }
    }
    Ok(bal)
}

/// Reject a debit that would push the account beyond its debt limit.
///
/// Accounts may go negative up to the configured limit: the debit fails
/// only when `balance - amount` is negative and its absolute value
/// exceeds the limit.
pub fn debit_limit_check(
    tables: &Tables,
    account_label: &str,
    amount: Decimal,
    demobank: &DemobankConfig,
) -> Result<()> {
    let max_debt = if account_label == ADMIN_ACCOUNT {
        demobank.bank_debt_limit
    } else {
        demobank.users_debt_limit
    };
    let projected = balance(tables, account_label, true)? - amount;
    if projected < Decimal::ZERO && projected.abs() > max_debt {
        return Err(Error::InsufficientFunds);
    }
    Ok(())
}

/// Post one double-entry transfer; returns the shared
/// account-servicer reference.
///
/// Writes the CRDT/DBIT row pair, two fresh-outbox rows, and both
/// accounts' `last_transaction` pointers, all against the given draft.
pub fn post_transfer(
    tables: &mut Tables,
    req: &PostingRequest,
    timestamp_ms: i64,
) -> Result<String> {
    if req.amount.value <= Decimal::ZERO {
        return Err(Error::ZeroAmount);
    }
    let demobank = tables.demobank(&req.demobank)?.clone();
    if req.amount.currency != demobank.currency {
        return Err(Error::BadCurrency {
            expected: demobank.currency,
            got: req.amount.currency.clone(),
        });
    }
    let debit = tables.account(&req.debit_account)?.clone();
    let credit = tables.account(&req.credit_account)?.clone();
    debit_limit_check(tables, &debit.label, req.amount.value, &demobank)?;

    let reference = new_account_servicer_ref(tables);
    for (account, direction) in [(&debit, Direction::Dbit), (&credit, Direction::Crdt)] {
        let id = tables.alloc_transaction_id();
        tables.transactions.insert(
            id,
            LedgerTransactionRow {
                id,
                creditor_iban: credit.iban.clone(),
                creditor_bic: Some(credit.bic.clone()),
                creditor_name: credit.owner.clone(),
                debtor_iban: debit.iban.clone(),
                debtor_bic: Some(debit.bic.clone()),
                debtor_name: debit.owner.clone(),
                subject: req.subject.clone(),
                amount: req.amount.value,
                currency: req.amount.currency.clone(),
                timestamp_ms,
                account_servicer_ref: reference.clone(),
                pmt_inf_id: req.pmt_inf_id.clone(),
                end_to_end_id: req.end_to_end_id.clone(),
                direction,
                account_label: account.label.clone(),
                demobank: req.demobank.clone(),
            },
        );
        let fresh_id = tables.alloc_fresh_id();
        tables.fresh_transactions.insert(
            fresh_id,
            FreshTransactionRow {
                id: fresh_id,
                transaction_id: id,
                account_label: account.label.clone(),
            },
        );
        tables.account_mut(&account.label)?.last_transaction = Some(id);
    }
    Ok(reference)
}

/// Post the debit half of an outgoing transfer whose creditor is not a
/// local account. Cross-institution settlement is not simulated, so no
/// CRDT row exists for these.
#[allow(clippy::too_many_arguments)]
pub fn post_outgoing_debit(
    tables: &mut Tables,
    demobank_name: &str,
    debit_label: &str,
    creditor_iban: &str,
    creditor_bic: Option<&str>,
    creditor_name: &str,
    subject: &str,
    amount: &CurrencyAmount,
    pmt_inf_id: Option<&str>,
    end_to_end_id: Option<&str>,
    timestamp_ms: i64,
) -> Result<String> {
    if amount.value <= Decimal::ZERO {
        return Err(Error::ZeroAmount);
    }
    let demobank = tables.demobank(demobank_name)?.clone();
    if amount.currency != demobank.currency {
        return Err(Error::BadCurrency {
            expected: demobank.currency,
            got: amount.currency.clone(),
        });
    }
    let debit = tables.account(debit_label)?.clone();
    debit_limit_check(tables, &debit.label, amount.value, &demobank)?;

    let reference = new_account_servicer_ref(tables);
    let id = tables.alloc_transaction_id();
    tables.transactions.insert(
        id,
        LedgerTransactionRow {
            id,
            creditor_iban: creditor_iban.to_string(),
            creditor_bic: creditor_bic.map(str::to_string),
            creditor_name: creditor_name.to_string(),
            debtor_iban: debit.iban.clone(),
            debtor_bic: Some(debit.bic.clone()),
            debtor_name: debit.owner.clone(),
            subject: subject.to_string(),
            amount: amount.value,
            currency: amount.currency.clone(),
            timestamp_ms,
            account_servicer_ref: reference.clone(),
            pmt_inf_id: pmt_inf_id.map(str::to_string),
            end_to_end_id: end_to_end_id.map(str::to_string),
            direction: Direction::Dbit,
            account_label: debit.label.clone(),
            demobank: demobank_name.to_string(),
        },
    );
    let fresh_id = tables.alloc_fresh_id();
    tables.fresh_transactions.insert(
        fresh_id,
        FreshTransactionRow {
            id: fresh_id,
            transaction_id: id,
            account_label: debit.label.clone(),
        },
    );
    tables.account_mut(&debit.label)?.last_transaction = Some(id);
    Ok(reference)
}

/// Generate a fresh 8-character account-servicer reference.
fn new_account_servicer_ref(tables: &Tables) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    loop {
        let candidate: String = (0..8)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        let taken = tables
            .transactions
            .values()
            .any(|t| t.account_servicer_ref == candidate);
        if !taken {
            return candidate;
        }
    }
}

/// Ledger facade: store transaction plus post-commit notification.
pub struct Ledger {
    store: Arc<Store>,
    bus: Arc<NotificationBus>,
}

impl Ledger {
    /// Build the facade over the shared store and bus.
    pub fn new(store: Arc<Store>, bus: Arc<NotificationBus>) -> Self {
        Self { store, bus }
    }

    /// Shared store handle.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Shared bus handle.
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Post a transfer atomically and announce the credit side.
    pub fn post(&self, req: &PostingRequest) -> Result<String> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let reference = self
            .store
            .transact(|tables| post_transfer(tables, req, timestamp_ms))?;
        self.bus.publish(
            &Topic::regio_tx(&req.credit_account),
            Direction::Crdt.code(),
        );
        info!(
            reference = %reference,
            debit = %req.debit_account,
            credit = %req.credit_account,
            amount = %req.amount,
            "posted transfer"
        );
        Ok(reference)
    }

    /// Current balance of an account.
    pub fn balance(&self, account_label: &str, with_pending: bool) -> Result<Decimal> {
        self.store.read(|t| balance(t, account_label, with_pending))
    }
}
