//! In-process transactional store
//!
//! All persisted tables live in one [`Tables`] value. A transaction
//! clones the current snapshot, runs the caller's closure against the
//! clone, and commits it back under an optimistic version check; a
//! concurrent commit in between aborts the attempt and the closure is
//! re-run, up to [`MAX_TX_ATTEMPTS`] times. This gives serializable
//! isolation with total rollback on error.

use crate::config::DemobankConfig;
use crate::error::{Error, Result};
use crate::types::*;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maximum attempts per transaction before giving up on conflicts.
pub const MAX_TX_ATTEMPTS: usize = 10;

/// Every persisted table of the sandbox, one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    next_transaction_id: i64,
    next_fresh_id: i64,
    next_statement_id: i64,
    next_subscriber_id: i64,
    next_submission_id: i64,
    next_order_signature_id: i64,

    /// demobank_configs
    pub demobanks: BTreeMap<String, DemobankConfig>,
    /// demobank_customers, keyed by username
    pub customers: BTreeMap<String, CustomerRow>,
    /// bank_accounts, keyed by unique label
    pub accounts: BTreeMap<String, BankAccountRow>,
    /// bank_account_transactions, keyed by ascending id
    pub transactions: BTreeMap<i64, LedgerTransactionRow>,
    /// bank_account_fresh_transactions (statement outbox)
    pub fresh_transactions: BTreeMap<i64, FreshTransactionRow>,
    /// bank_account_statements
    pub statements: BTreeMap<i64, StatementRow>,
    /// ebics_hosts, keyed by lowercased host id
    pub ebics_hosts: BTreeMap<String, EbicsHostRow>,
    /// ebics_subscribers
    pub ebics_subscribers: BTreeMap<i64, EbicsSubscriberRow>,
    /// ebics_download_transactions, keyed by lowercased transaction id
    pub download_transactions: BTreeMap<String, DownloadTransactionRow>,
    /// ebics_upload_transactions, keyed by lowercased transaction id
    pub upload_transactions: BTreeMap<String, UploadTransactionRow>,
    /// ebics_upload_transaction_chunks, keyed by (transaction id, index)
    pub upload_chunks: BTreeMap<(String, usize), Vec<u8>>,
    /// ebics_order_signatures
    pub order_signatures: BTreeMap<i64, OrderSignatureRow>,
    /// cashout_operations
    pub cashout_operations: BTreeMap<Uuid, CashoutOperationRow>,
    /// cashout_submissions
    pub cashout_submissions: BTreeMap<i64, CashoutSubmissionRow>,
}

impl Tables {
    /// Allocate the next ledger transaction id.
    pub fn alloc_transaction_id(&mut self) -> i64 {
        self.next_transaction_id += 1;
        self.next_transaction_id
    }

    /// Allocate the next fresh-outbox id.
    pub fn alloc_fresh_id(&mut self) -> i64 {
        self.next_fresh_id += 1;
        self.next_fresh_id
    }

    /// Allocate the next statement id.
    pub fn alloc_statement_id(&mut self) -> i64 {
        self.next_statement_id += 1;
        self.next_statement_id
    }

    /// Allocate the next subscriber id.
    pub fn alloc_subscriber_id(&mut self) -> i64 {
        self.next_subscriber_id += 1;
        self.next_subscriber_id
    }

    /// Allocate the next cash-out submission id.
    pub fn alloc_submission_id(&mut self) -> i64 {
        self.next_submission_id += 1;
        self.next_submission_id
    }

    /// Allocate the next order-signature id.
    pub fn alloc_order_signature_id(&mut self) -> i64 {
        self.next_order_signature_id += 1;
        self.next_order_signature_id
    }

    /// Look up a demobank by name.
    pub fn demobank(&self, name: &str) -> Result<&DemobankConfig> {
        self.demobanks
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("demobank {}", name)))
    }

    /// Look up an account by label.
    pub fn account(&self, label: &str) -> Result<&BankAccountRow> {
        self.accounts
            .get(label)
            .ok_or_else(|| Error::NotFound(format!("account {}", label)))
    }

    /// Mutable account lookup.
    pub fn account_mut(&mut self, label: &str) -> Result<&mut BankAccountRow> {
        self.accounts
            .get_mut(label)
            .ok_or_else(|| Error::NotFound(format!("account {}", label)))
    }

    /// Find the account owning `iban`, if it is local.
    pub fn account_by_iban(&self, iban: &str) -> Option<&BankAccountRow> {
        self.accounts.values().find(|a| a.iban == iban)
    }

    /// Look up a host by id, case-insensitively.
    pub fn ebics_host(&self, host_id: &str) -> Result<&EbicsHostRow> {
        self.ebics_hosts
            .get(&host_id.to_lowercase())
            .ok_or_else(|| Error::NotFound(format!("ebics host {}", host_id)))
    }

    /// Find a subscriber by its protocol coordinates.
    pub fn subscriber_by_ids(
        &self,
        host_id: &str,
        partner_id: &str,
        user_id: &str,
        system_id: Option<&str>,
    ) -> Option<&EbicsSubscriberRow> {
        self.ebics_subscribers.values().find(|s| {
            s.host_id.eq_ignore_ascii_case(host_id)
                && s.partner_id == partner_id
                && s.user_id == user_id
                && s.system_id.as_deref() == system_id
        })
    }

    /// Mutable subscriber lookup by row id.
    pub fn subscriber_mut(&mut self, id: i64) -> Result<&mut EbicsSubscriberRow> {
        self.ebics_subscribers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("ebics subscriber {}", id)))
    }

    /// Latest statement of an account, if any.
    pub fn last_statement(&self, account_label: &str) -> Option<&StatementRow> {
        self.statements
            .values()
            .filter(|s| s.account_label == account_label)
            .max_by_key(|s| s.id)
    }

    /// Ledger rows of one account in id order.
    pub fn transactions_for<'a>(
        &'a self,
        account_label: &'a str,
    ) -> impl Iterator<Item = &'a LedgerTransactionRow> + 'a {
        self.transactions
            .values()
            .filter(move |t| t.account_label == account_label)
    }

    /// Fresh-outbox ledger rows of one account in id order.
    pub fn fresh_transactions_for<'a>(
        &'a self,
        account_label: &'a str,
    ) -> impl Iterator<Item = &'a LedgerTransactionRow> + 'a {
        self.fresh_transactions
            .values()
            .filter(move |f| f.account_label == account_label)
            .filter_map(|f| self.transactions.get(&f.transaction_id))
    }
}

struct Versioned {
    version: u64,
    tables: Tables,
}

/// The single shared mutable store.
pub struct Store {
    state: RwLock<Versioned>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Versioned {
                version: 0,
                tables: Tables::default(),
            }),
        }
    }

    /// Run `f` inside a serializable transaction.
    ///
    /// The closure may be re-run on conflict, so it must not carry side
    /// effects beyond the `Tables` draft it receives. An `Err` return
    /// rolls the draft back entirely.
    pub fn transact<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: Fn(&mut Tables) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        for attempt in 0..MAX_TX_ATTEMPTS {
            let (version, mut draft) = {
                let guard = self.state.read();
                (guard.version, guard.tables.clone())
            };
            let out = f(&mut draft)?;
            let mut guard = self.state.write();
            if guard.version == version {
                guard.version += 1;
                guard.tables = draft;
                return Ok(out);
            }
            tracing::debug!(attempt, "serialization conflict, retrying");
        }
        Err(Error::SerializationConflict.into())
    }

    /// Run a read-only closure against the current snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.state.read().tables)
    }
}
