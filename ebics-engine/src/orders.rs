//! Business order handlers
//!
//! Download handlers return the raw order payload; the engine owns
//! compression, encryption and segmentation. Upload handling is the
//! pain.001 intake behind CCT.

use crate::camt::{render_camt, signed_sum, CamtKind, CamtRenderInput};
use crate::error::{EbicsError, Result, ReturnCode};
use crate::xml;
use crate::xml::order_data::*;
use crate::xml::pain001;
use ledger_core::ledger::{post_outgoing_debit, post_transfer, PostingRequest};
use ledger_core::types::{CurrencyAmount, EbicsSubscriberRow, LedgerTransactionRow};
use ledger_core::Tables;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Order types offered in partner-info documents, with direction.
const OFFERED_ORDERS: &[(&str, &str, &str)] = &[
    ("C52", "Download", "Bank to customer account report"),
    ("C53", "Download", "Bank to customer statement"),
    ("STA", "Download", "Swift daily statement"),
    ("VMK", "Download", "Interim transaction report"),
    ("CCT", "Upload", "Credit transfer initiation"),
    ("CCC", "Upload", "Credit transfer initiation (compressed)"),
];

/// Notifications to publish after the enclosing transaction commits:
/// `(credit account label, payload)`.
pub type PendingNotifications = Vec<(String, String)>;

fn subscriber_account<'t>(
    tables: &'t Tables,
    subscriber: &EbicsSubscriberRow,
) -> Result<&'t ledger_core::types::BankAccountRow> {
    let label = subscriber.bank_account.as_deref().ok_or_else(|| {
        EbicsError::protocol(
            ReturnCode::InvalidUserOrState,
            "subscriber has no bank account",
        )
    })?;
    tables
        .account(label)
        .map_err(|_| EbicsError::protocol(ReturnCode::InvalidUserOrState, "account missing"))
}

/// Produce the payload of a download order.
pub fn download_payload(
    tables: &Tables,
    subscriber: &EbicsSubscriberRow,
    order_type: &str,
    date_range: Option<(i64, i64)>,
    now_ms: i64,
) -> Result<Vec<u8>> {
    match order_type {
        "HTD" => build_htd(tables, subscriber).map(String::into_bytes),
        "HKD" => build_hkd(tables, subscriber).map(String::into_bytes),
        "C52" => build_c52(tables, subscriber, now_ms).map(String::into_bytes),
        "C53" => build_c53(tables, subscriber, date_range),
        // Connectivity test orders with fixed payloads.
        "TSD" => Ok(b"Sandbox TSD dummy payload, have a nice day.".to_vec()),
        "PTK" => Ok(b"PTK protocol log: nothing to report.".to_vec()),
        other => Err(EbicsError::protocol(
            ReturnCode::UnsupportedOrderType,
            format!("order type {}", other),
        )),
    }
}

fn partner_info(tables: &Tables, subscriber: &EbicsSubscriberRow) -> Result<PartnerInfo> {
    let mut accounts = Vec::new();
    if let Some(label) = subscriber.bank_account.as_deref() {
        if let Ok(account) = tables.account(label) {
            let demobank = tables.demobank(&account.demobank)?;
            accounts.push(AccountInfo {
                currency: demobank.currency.clone(),
                id: account.label.clone(),
                account_number: InternationalValue {
                    international: true,
                    value: account.iban.clone(),
                },
                bank_code: InternationalValue {
                    international: true,
                    value: account.bic.clone(),
                },
                account_holder: account.owner.clone(),
            });
        }
    }
    Ok(PartnerInfo {
        address_info: AddressInfo {
            name: Some("Sandbox".to_string()),
        },
        bank_info: BankInfo {
            host_id: subscriber.host_id.clone(),
        },
        account_info: accounts,
        order_info: OFFERED_ORDERS
            .iter()
            .map(|(order_type, direction, description)| OrderInfo {
                order_type: order_type.to_string(),
                transfer_type: direction.to_string(),
                description: description.to_string(),
            })
            .collect(),
    })
}

fn user_info(subscriber: &EbicsSubscriberRow) -> UserInfo {
    let order_types = OFFERED_ORDERS
        .iter()
        .map(|(t, _, _)| *t)
        .collect::<Vec<_>>()
        .join(" ");
    UserInfo {
        user_id: UserIdWithStatus {
            status: 1,
            value: subscriber.user_id.clone(),
        },
        name: None,
        permissions: vec![Permission { order_types }],
    }
}

fn build_htd(tables: &Tables, subscriber: &EbicsSubscriberRow) -> Result<String> {
    xml::render(
        "HTDResponseOrderData",
        &HtdResponseOrderData {
            xmlns: Some(ORDER_DATA_NS.to_string()),
            partner_info: partner_info(tables, subscriber)?,
            user_info: user_info(subscriber),
        },
    )
}

fn build_hkd(tables: &Tables, subscriber: &EbicsSubscriberRow) -> Result<String> {
    // All users of the partner; the sandbox keys subscribers 1:1, so
    // list every subscriber row sharing the partner id.
    let users = tables
        .ebics_subscribers
        .values()
        .filter(|s| s.host_id == subscriber.host_id && s.partner_id == subscriber.partner_id)
        .map(user_info)
        .collect();
    xml::render(
        "HKDResponseOrderData",
        &HkdResponseOrderData {
            xmlns: Some(ORDER_DATA_NS.to_string()),
            partner_info: partner_info(tables, subscriber)?,
            user_info: users,
        },
    )
}

/// C52: interim report over the fresh (not yet reported) transactions.
/// The outbox is not cleared, so the report can be repeated; any date
/// range in the request is ignored, the report always covers "since the
/// last statement".
fn build_c52(tables: &Tables, subscriber: &EbicsSubscriberRow, now_ms: i64) -> Result<String> {
    let account = subscriber_account(tables, subscriber)?;
    let demobank = tables.demobank(&account.demobank)?;
    let prcd = tables
        .last_statement(&account.label)
        .map(|s| s.balance_clbd)
        .unwrap_or(Decimal::ZERO);
    let entries: Vec<LedgerTransactionRow> = tables
        .fresh_transactions_for(&account.label)
        .cloned()
        .collect();
    let clbd = prcd + signed_sum(&entries);
    debug!(account = %account.label, entries = entries.len(), "rendering C52");
    render_camt(&CamtRenderInput {
        kind: CamtKind::Report,
        account,
        currency: &demobank.currency,
        prcd,
        clbd,
        entries: &entries,
        document_id: format!("sandbox-rpt-{}", now_ms),
        sequence: 1,
        now_ms,
    })
}

/// C53: stored statements, filtered by the optional date range;
/// without a range only the latest one. No statements is `090005`.
fn build_c53(
    tables: &Tables,
    subscriber: &EbicsSubscriberRow,
    date_range: Option<(i64, i64)>,
) -> Result<Vec<u8>> {
    let account = subscriber_account(tables, subscriber)?;
    let documents: Vec<String> = match date_range {
        Some((start_ms, end_ms)) => tables
            .statements
            .values()
            .filter(|s| s.account_label == account.label)
            .filter(|s| s.creation_time_ms >= start_ms && s.creation_time_ms < end_ms)
            .map(|s| s.camt_xml.clone())
            .collect(),
        None => tables
            .last_statement(&account.label)
            .map(|s| vec![s.camt_xml.clone()])
            .unwrap_or_default(),
    };
    if documents.is_empty() {
        return Err(EbicsError::protocol(
            ReturnCode::NoDownloadData,
            "no statements in range",
        ));
    }
    Ok(documents.join("\n").into_bytes())
}

/// CCT intake: parse the pain.001 payload and post its transfers.
///
/// Idempotent on `PmtInfId`: an instruction whose id already appears in
/// the ledger is skipped. A creditor IBAN outside this sandbox books
/// only the debit half.
pub fn process_cct(
    tables: &mut Tables,
    payload: &[u8],
    now_ms: i64,
) -> Result<PendingNotifications> {
    let xml_text = String::from_utf8(payload.to_vec())
        .map_err(|e| EbicsError::protocol(ReturnCode::InvalidXml, format!("pain.001: {}", e)))?;
    let document = pain001::parse_pain001(&xml_text)?;
    let transfers = pain001::extract_transfers(&document)?;

    let mut notifications = Vec::new();
    for transfer in &transfers {
        let already_posted = tables
            .transactions
            .values()
            .any(|row| row.pmt_inf_id.as_deref() == Some(transfer.pmt_inf_id.as_str()));
        if already_posted {
            debug!(pmt_inf_id = %transfer.pmt_inf_id, "duplicate pain.001, skipping");
            continue;
        }
        let debtor = tables
            .account_by_iban(&transfer.debtor_iban)
            .cloned()
            .ok_or_else(|| {
                EbicsError::protocol(
                    ReturnCode::ProcessingError,
                    format!("debtor {} is not a local account", transfer.debtor_iban),
                )
            })?;
        let amount = CurrencyAmount::new(transfer.currency.clone(), transfer.amount);
        match tables.account_by_iban(&transfer.creditor_iban).cloned() {
            Some(creditor) => {
                post_transfer(
                    tables,
                    &PostingRequest {
                        demobank: debtor.demobank.clone(),
                        debit_account: debtor.label.clone(),
                        credit_account: creditor.label.clone(),
                        subject: transfer.subject.clone(),
                        amount,
                        pmt_inf_id: Some(transfer.pmt_inf_id.clone()),
                        end_to_end_id: transfer.end_to_end_id.clone(),
                    },
                    now_ms,
                )?;
                notifications.push((creditor.label.clone(), "CRDT".to_string()));
            }
            None => {
                post_outgoing_debit(
                    tables,
                    &debtor.demobank,
                    &debtor.label,
                    &transfer.creditor_iban,
                    transfer.creditor_bic.as_deref(),
                    &transfer.creditor_name,
                    &transfer.subject,
                    &amount,
                    Some(&transfer.pmt_inf_id),
                    transfer.end_to_end_id.as_deref(),
                    now_ms,
                )?;
            }
        }
        info!(
            pmt_inf_id = %transfer.pmt_inf_id,
            debtor = %transfer.debtor_iban,
            creditor = %transfer.creditor_iban,
            amount = %transfer.amount,
            "CCT transfer booked"
        );
    }
    Ok(notifications)
}
