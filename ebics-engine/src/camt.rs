//! CAMT.052/053 rendering and statement materialization
//!
//! Balance chaining: PRCD of a document equals the previous statement's
//! CLBD (zero when none exists), CLBD equals PRCD plus the signed sum
//! of the covered entries. Balances render as their absolute value with
//! `CdtDbtInd` CRDT when the signed value is >= 0, DBIT otherwise.

use crate::error::{EbicsError, Result};
use crate::xml;
use crate::xml::camt::*;
use chrono::{DateTime, Utc};
use ledger_core::types::{BankAccountRow, Direction, LedgerTransactionRow, StatementRow};
use ledger_core::Tables;
use rust_decimal::Decimal;
use tracing::info;

/// Which of the two CAMT flavours to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamtKind {
    /// camt.052 interim report
    Report,
    /// camt.053 end-of-period statement
    Statement,
}

/// Everything needed to render one document.
#[derive(Debug, Clone)]
pub struct CamtRenderInput<'a> {
    /// Report or statement
    pub kind: CamtKind,
    /// Account the document covers
    pub account: &'a BankAccountRow,
    /// Account currency
    pub currency: &'a str,
    /// Pre-range balance (signed)
    pub prcd: Decimal,
    /// Post-range balance (signed)
    pub clbd: Decimal,
    /// Covered entries, chronological
    pub entries: &'a [LedgerTransactionRow],
    /// Document id
    pub document_id: String,
    /// Sequence number
    pub sequence: u64,
    /// Render time, milliseconds since epoch
    pub now_ms: i64,
}

/// Signed sum of per-account entries: +amount on CRDT, -amount on DBIT.
pub fn signed_sum(entries: &[LedgerTransactionRow]) -> Decimal {
    entries.iter().fold(Decimal::ZERO, |acc, tx| match tx.direction {
        Direction::Crdt => acc + tx.amount,
        Direction::Dbit => acc - tx.amount,
    })
}

fn datetime(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

fn balance_block(code: &str, signed: Decimal, currency: &str, now_ms: i64) -> CashBalance {
    let indicator = if signed >= Decimal::ZERO { "CRDT" } else { "DBIT" };
    CashBalance {
        balance_type: BalanceType {
            code_or_proprietary: BalanceTypeCode {
                code: code.to_string(),
            },
        },
        amount: CurrencyAndAmount {
            currency: currency.to_string(),
            amount: signed.abs().to_string(),
        },
        credit_debit_indicator: indicator.to_string(),
        date: DateLeaf {
            date: datetime(now_ms).format("%Y-%m-%d").to_string(),
        },
    }
}

fn entry_block(row: &LedgerTransactionRow, msg_id: &str) -> ReportEntry {
    let date = datetime(row.timestamp_ms).format("%Y-%m-%d").to_string();
    // The other party of the entry, from the owner's point of view.
    let (related_parties, related_agents) = match row.direction {
        Direction::Crdt => (
            RelatedParties {
                debtor: Some(CamtParty {
                    name: Some(row.debtor_name.clone()),
                }),
                debtor_account: Some(RelatedAccount {
                    id: CamtAccountId {
                        iban: row.debtor_iban.clone(),
                    },
                }),
                ..Default::default()
            },
            RelatedAgents {
                debtor_agent: row.debtor_bic.as_ref().map(|bic| CamtAgent {
                    fin_instn_id: CamtFinInstnId {
                        bic: Some(bic.clone()),
                        name: None,
                    },
                }),
                ..Default::default()
            },
        ),
        Direction::Dbit => (
            RelatedParties {
                creditor: Some(CamtParty {
                    name: Some(row.creditor_name.clone()),
                }),
                creditor_account: Some(RelatedAccount {
                    id: CamtAccountId {
                        iban: row.creditor_iban.clone(),
                    },
                }),
                ..Default::default()
            },
            RelatedAgents {
                creditor_agent: row.creditor_bic.as_ref().map(|bic| CamtAgent {
                    fin_instn_id: CamtFinInstnId {
                        bic: Some(bic.clone()),
                        name: None,
                    },
                }),
                ..Default::default()
            },
        ),
    };
    ReportEntry {
        amount: CurrencyAndAmount {
            currency: row.currency.clone(),
            amount: row.amount.to_string(),
        },
        credit_debit_indicator: row.direction.code().to_string(),
        status: "BOOK".to_string(),
        booking_date: DateLeaf { date: date.clone() },
        value_date: DateLeaf { date },
        account_servicer_ref: row.account_servicer_ref.clone(),
        bank_transaction_code: BankTransactionCode::sepa_credit_transfer(),
        entry_details: EntryDetails {
            transaction_details: TransactionDetails {
                references: TransactionReferences {
                    msg_id: Some(msg_id.to_string()),
                    pmt_inf_id: row.pmt_inf_id.clone(),
                    end_to_end_id: row.end_to_end_id.clone(),
                },
                related_parties: Some(related_parties),
                related_agents: Some(related_agents),
                remittance: Some(CamtRemittance {
                    unstructured: vec![row.subject.clone()],
                }),
            },
        },
    }
}

/// Render one CAMT document; the result is re-parsed as a final
/// validation step before being returned.
pub fn render_camt(input: &CamtRenderInput<'_>) -> Result<String> {
    let msg_id = format!("sandbox-{}", input.now_ms);
    let creation = datetime(input.now_ms).to_rfc3339();
    let body = AccountReport {
        id: input.document_id.clone(),
        electronic_seq_nb: Some(input.sequence),
        creation_date_time: creation.clone(),
        account: CamtAccount {
            id: CamtAccountId {
                iban: input.account.iban.clone(),
            },
            currency: Some(input.currency.to_string()),
            owner: Some(CamtParty {
                name: Some(input.account.owner.clone()),
            }),
            servicer: Some(CamtAgent {
                fin_instn_id: CamtFinInstnId {
                    bic: Some(input.account.bic.clone()),
                    name: Some("Sandbox".to_string()),
                },
            }),
        },
        balances: vec![
            balance_block("PRCD", input.prcd, input.currency, input.now_ms),
            balance_block("CLBD", input.clbd, input.currency, input.now_ms),
        ],
        entries: input.entries.iter().map(|e| entry_block(e, &msg_id)).collect(),
    };
    let group_header = CamtGroupHeader {
        msg_id,
        creation_date_time: creation,
    };
    let document = match input.kind {
        CamtKind::Report => CamtDocument {
            xmlns: CAMT_052_NS.to_string(),
            report: Some(BankToCustomerReport {
                group_header,
                reports: vec![body],
            }),
            statement: None,
        },
        CamtKind::Statement => CamtDocument {
            xmlns: CAMT_053_NS.to_string(),
            report: None,
            statement: Some(BankToCustomerStatement {
                group_header,
                statements: vec![body],
            }),
        },
    };
    let rendered = xml::render("Document", &document)?;
    // Outbound validation: a document our own models cannot read back
    // must never leave the bank.
    xml::parse::<CamtDocument>(&rendered)
        .map_err(|e| EbicsError::Internal(format!("generated CAMT failed validation: {}", e)))?;
    Ok(rendered)
}

/// Materialize an end-of-period statement for one account.
///
/// Drains the fresh-transaction outbox, renders the camt.053, persists
/// the statement row continuing the CLBD chain, and clears the outbox.
/// Runs inside the caller's store transaction.
pub fn materialize_statement(
    tables: &mut Tables,
    account_label: &str,
    now_ms: i64,
) -> Result<StatementRow> {
    let account = tables.account(account_label)?.clone();
    let demobank = tables.demobank(&account.demobank)?.clone();
    let prcd = tables
        .last_statement(account_label)
        .map(|s| s.balance_clbd)
        .unwrap_or(Decimal::ZERO);
    let sequence = tables
        .last_statement(account_label)
        .map(|s| s.id as u64 + 1)
        .unwrap_or(1);
    let entries: Vec<LedgerTransactionRow> = tables
        .fresh_transactions_for(account_label)
        .cloned()
        .collect();
    let clbd = prcd + signed_sum(&entries);

    let id = tables.alloc_statement_id();
    let statement_id = format!("sandbox-stmt-{}", id);
    let camt_xml = render_camt(&CamtRenderInput {
        kind: CamtKind::Statement,
        account: &account,
        currency: &demobank.currency,
        prcd,
        clbd,
        entries: &entries,
        document_id: statement_id.clone(),
        sequence,
        now_ms,
    })?;
    let row = StatementRow {
        id,
        statement_id,
        account_label: account_label.to_string(),
        creation_time_ms: now_ms,
        camt_xml,
        balance_clbd: clbd,
    };
    tables.statements.insert(id, row.clone());
    tables
        .fresh_transactions
        .retain(|_, f| f.account_label != account_label);
    info!(
        account = account_label,
        statement = %row.statement_id,
        entries = entries.len(),
        clbd = %clbd,
        "materialized statement"
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::config::DemobankConfig;
    use ledger_core::ledger::{balance, post_transfer, PostingRequest};
    use ledger_core::types::CurrencyAmount;

    fn seeded_tables() -> Tables {
        let mut t = Tables::default();
        t.demobanks.insert("default".into(), DemobankConfig::default());
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

    fn post(t: &mut Tables, from: &str, to: &str, amount: &str, ts: i64) {
        post_transfer(
            t,
            &PostingRequest {
                demobank: "default".into(),
                debit_account: from.into(),
                credit_account: to.into(),
                subject: "camt test".into(),
                amount: CurrencyAmount::new("EUR", amount.parse().unwrap()),
                pmt_inf_id: None,
                end_to_end_id: None,
            },
            ts,
        )
        .unwrap();
    }

    #[test]
    fn test_balance_sign_rule() {
        let block = balance_block("CLBD", Decimal::new(-250, 2), "EUR", 0);
        assert_eq!(block.credit_debit_indicator, "DBIT");
        assert_eq!(block.amount.amount, "2.50");

        let block = balance_block("PRCD", Decimal::ZERO, "EUR", 0);
        assert_eq!(block.credit_debit_indicator, "CRDT");
    }

    #[test]
    fn test_statement_chain_and_outbox_drain() {
        let mut t = seeded_tables();
        // alice: +5.00 then -2.50.
        post(&mut t, "bob", "alice", "5.00", 1000);
        post(&mut t, "alice", "bob", "2.50", 2000);

        let stmt = materialize_statement(&mut t, "alice", 3000).unwrap();
        assert_eq!(stmt.balance_clbd, Decimal::new(250, 2));
        assert!(stmt.camt_xml.contains("<Cd>PRCD</Cd>"));
        assert!(stmt.camt_xml.contains("<Cd>CLBD</Cd>"));
        // alice's outbox is drained, bob's is untouched.
        assert!(t.fresh_transactions_for("alice").next().is_none());
        assert_eq!(t.fresh_transactions_for("bob").count(), 2);

        // Statement balance equals the derived booked balance.
        assert_eq!(balance(&t, "alice", false).unwrap(), stmt.balance_clbd);

        // Next statement chains from this CLBD.
        post(&mut t, "bob", "alice", "1.00", 4000);
        let next = materialize_statement(&mut t, "alice", 5000).unwrap();
        assert_eq!(next.balance_clbd, Decimal::new(350, 2));
        assert!(next.camt_xml.contains(">2.50<"));
    }

    #[test]
    fn test_render_includes_other_party_details() {
        let mut t = seeded_tables();
        post(&mut t, "alice", "bob", "7.00", 1000);
        let entries: Vec<_> = t.fresh_transactions_for("alice").cloned().collect();
        let account = t.account("alice").unwrap().clone();
        let xml_text = render_camt(&CamtRenderInput {
            kind: CamtKind::Report,
            account: &account,
            currency: "EUR",
            prcd: Decimal::ZERO,
            clbd: signed_sum(&entries),
            entries: &entries,
            document_id: "rpt-1".to_string(),
            sequence: 1,
            now_ms: 2000,
        })
        .unwrap();
        // alice's entry is a DBIT; the other party is creditor bob.
        assert!(xml_text.contains("BkToCstmrAcctRpt"));
        assert!(xml_text.contains("<CdtDbtInd>DBIT</CdtDbtInd>"));
        assert!(xml_text.contains("<Nm>bob</Nm>"));
        assert!(xml_text.contains("<IBAN>DE01</IBAN>"));
        assert!(xml_text.contains("camt test"));
    }

    #[test]
    fn test_empty_statement_renders_without_entries() {
        let mut t = seeded_tables();
        let stmt = materialize_statement(&mut t, "alice", 1000).unwrap();
        assert_eq!(stmt.balance_clbd, Decimal::ZERO);
        assert!(!stmt.camt_xml.contains("<Ntry>"));
    }
}
