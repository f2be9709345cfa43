//! pain.001 credit-transfer initiation, minimal accepted subset
//!
//! Only the required path is mapped:
//! `Document/CstmrCdtTrfInitn/{GrpHdr/MsgId, PmtInf/...}`. Everything
//! else in the message is ignored. Amounts must match the plain
//! `[0-9]+(\.[0-9]+)?` grammar.

use crate::error::{EbicsError, Result, ReturnCode};
use ledger_core::types::parse_plain_amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Party with just a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyName {
    /// Display name
    #[serde(rename = "Nm", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Account identified by IBAN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashAccount {
    /// Identification wrapper
    #[serde(rename = "Id")]
    pub id: AccountId,
}

/// IBAN leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountId {
    /// The IBAN
    #[serde(rename = "IBAN")]
    pub iban: String,
}

/// Financial institution wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Institution identification
    #[serde(rename = "FinInstnId")]
    pub fin_instn_id: FinInstnId,
}

/// BIC leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinInstnId {
    /// The BIC
    #[serde(rename = "BIC", default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
}

/// Group header subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupHeader {
    /// Message id
    #[serde(rename = "MsgId")]
    pub msg_id: String,
    /// Creation time (unused, kept for round-trips)
    #[serde(rename = "CreDtTm", default, skip_serializing_if = "Option::is_none")]
    pub creation_date_time: Option<String>,
    /// Declared transaction count (unused)
    #[serde(rename = "NbOfTxs", default, skip_serializing_if = "Option::is_none")]
    pub number_of_transactions: Option<String>,
    /// Initiating party (unused)
    #[serde(rename = "InitgPty", default, skip_serializing_if = "Option::is_none")]
    pub initiating_party: Option<PartyName>,
}

/// Amount with currency attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructedAmount {
    /// ISO currency code
    #[serde(rename = "@Ccy")]
    pub currency: String,
    /// Plain decimal amount
    #[serde(rename = "$text")]
    pub amount: String,
}

/// Amount wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountChoice {
    /// Instructed amount
    #[serde(rename = "InstdAmt")]
    pub instructed_amount: InstructedAmount,
}

/// Payment identification subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentId {
    /// End-to-end id
    #[serde(rename = "EndToEndId", default, skip_serializing_if = "Option::is_none")]
    pub end_to_end_id: Option<String>,
}

/// Remittance information subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemittanceInfo {
    /// Unstructured lines
    #[serde(rename = "Ustrd", default, skip_serializing_if = "Vec::is_empty")]
    pub unstructured: Vec<String>,
}

/// One credit-transfer transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransferTransaction {
    /// Payment ids
    #[serde(rename = "PmtId", default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
    /// Amount
    #[serde(rename = "Amt")]
    pub amount: AmountChoice,
    /// Creditor agent
    #[serde(rename = "CdtrAgt", default, skip_serializing_if = "Option::is_none")]
    pub creditor_agent: Option<Agent>,
    /// Creditor party
    #[serde(rename = "Cdtr")]
    pub creditor: PartyName,
    /// Creditor account
    #[serde(rename = "CdtrAcct")]
    pub creditor_account: CashAccount,
    /// Remittance info
    #[serde(rename = "RmtInf", default, skip_serializing_if = "Option::is_none")]
    pub remittance: Option<RemittanceInfo>,
}

/// One payment information block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInformation {
    /// Payment information id (the idempotency key)
    #[serde(rename = "PmtInfId")]
    pub pmt_inf_id: String,
    /// Payment method (unused)
    #[serde(rename = "PmtMtd", default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    /// Debtor party
    #[serde(rename = "Dbtr")]
    pub debtor: PartyName,
    /// Debtor account
    #[serde(rename = "DbtrAcct")]
    pub debtor_account: CashAccount,
    /// Debtor agent
    #[serde(rename = "DbtrAgt")]
    pub debtor_agent: Agent,
    /// Transactions
    #[serde(rename = "CdtTrfTxInf")]
    pub transactions: Vec<CreditTransferTransaction>,
}

/// Initiation body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCreditTransferInitiation {
    /// Group header
    #[serde(rename = "GrpHdr")]
    pub group_header: GroupHeader,
    /// Payment information blocks
    #[serde(rename = "PmtInf")]
    pub payment_information: Vec<PaymentInformation>,
}

/// pain.001 `Document` root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pain001Document {
    /// Namespace attribute
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    pub xmlns: Option<String>,
    /// Initiation
    #[serde(rename = "CstmrCdtTrfInitn")]
    pub initiation: CustomerCreditTransferInitiation,
}

/// A flattened, validated credit-transfer instruction.
#[derive(Debug, Clone)]
pub struct CreditTransferInfo {
    /// Message id of the containing document
    pub msg_id: String,
    /// Payment information id (idempotency key)
    pub pmt_inf_id: String,
    /// Debtor name
    pub debtor_name: String,
    /// Debtor IBAN
    pub debtor_iban: String,
    /// Debtor BIC
    pub debtor_bic: Option<String>,
    /// Creditor name
    pub creditor_name: String,
    /// Creditor IBAN
    pub creditor_iban: String,
    /// Creditor BIC
    pub creditor_bic: Option<String>,
    /// Validated amount
    pub amount: Decimal,
    /// Currency code
    pub currency: String,
    /// Unstructured subject
    pub subject: String,
    /// End-to-end id
    pub end_to_end_id: Option<String>,
}

/// Parse a pain.001 document from its XML text.
pub fn parse_pain001(xml_text: &str) -> Result<Pain001Document> {
    crate::xml::parse(xml_text)
}

/// Flatten a parsed document into validated instructions.
pub fn extract_transfers(doc: &Pain001Document) -> Result<Vec<CreditTransferInfo>> {
    let msg_id = doc.initiation.group_header.msg_id.clone();
    let mut transfers = Vec::new();
    for pmt_inf in &doc.initiation.payment_information {
        let debtor_name = pmt_inf.debtor.name.clone().unwrap_or_default();
        let debtor_iban = pmt_inf.debtor_account.id.iban.clone();
        let debtor_bic = pmt_inf.debtor_agent.fin_instn_id.bic.clone();
        for tx in &pmt_inf.transactions {
            let amount = parse_plain_amount(&tx.amount.instructed_amount.amount)
                .map_err(|e| EbicsError::protocol(ReturnCode::InvalidXml, e.to_string()))?;
            let subject = tx
                .remittance
                .as_ref()
                .and_then(|r| r.unstructured.first().cloned())
                .ok_or_else(|| {
                    EbicsError::protocol(ReturnCode::InvalidXml, "missing RmtInf/Ustrd")
                })?;
            transfers.push(CreditTransferInfo {
                msg_id: msg_id.clone(),
                pmt_inf_id: pmt_inf.pmt_inf_id.clone(),
                debtor_name: debtor_name.clone(),
                debtor_iban: debtor_iban.clone(),
                debtor_bic: debtor_bic.clone(),
                creditor_name: tx.creditor.name.clone().unwrap_or_default(),
                creditor_iban: tx.creditor_account.id.iban.clone(),
                creditor_bic: tx
                    .creditor_agent
                    .as_ref()
                    .and_then(|a| a.fin_instn_id.bic.clone()),
                amount,
                currency: tx.amount.instructed_amount.currency.clone(),
                subject,
                end_to_end_id: tx.payment_id.as_ref().and_then(|p| p.end_to_end_id.clone()),
            });
        }
    }
    if transfers.is_empty() {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidXml,
            "pain.001 without transactions",
        ));
    }
    Ok(transfers)
}

/// Assemble a pain.001 document for one single transfer. Used by the
/// test client and by connectivity checks.
#[allow(clippy::too_many_arguments)]
pub fn build_single_transfer(
    msg_id: &str,
    pmt_inf_id: &str,
    debtor_name: &str,
    debtor_iban: &str,
    debtor_bic: &str,
    creditor_name: &str,
    creditor_iban: &str,
    creditor_bic: Option<&str>,
    amount: &str,
    currency: &str,
    subject: &str,
) -> Pain001Document {
    Pain001Document {
        xmlns: Some("urn:iso:std:iso:20022:tech:xsd:pain.001.001.03".to_string()),
        initiation: CustomerCreditTransferInitiation {
            group_header: GroupHeader {
                msg_id: msg_id.to_string(),
                creation_date_time: None,
                number_of_transactions: Some("1".to_string()),
                initiating_party: Some(PartyName {
                    name: Some(debtor_name.to_string()),
                }),
            },
            payment_information: vec![PaymentInformation {
                pmt_inf_id: pmt_inf_id.to_string(),
                payment_method: Some("TRF".to_string()),
                debtor: PartyName {
                    name: Some(debtor_name.to_string()),
                },
                debtor_account: CashAccount {
                    id: AccountId {
                        iban: debtor_iban.to_string(),
                    },
                },
                debtor_agent: Agent {
                    fin_instn_id: FinInstnId {
                        bic: Some(debtor_bic.to_string()),
                    },
                },
                transactions: vec![CreditTransferTransaction {
                    payment_id: None,
                    amount: AmountChoice {
                        instructed_amount: InstructedAmount {
                            currency: currency.to_string(),
                            amount: amount.to_string(),
                        },
                    },
                    creditor_agent: creditor_bic.map(|bic| Agent {
                        fin_instn_id: FinInstnId {
                            bic: Some(bic.to_string()),
                        },
                    }),
                    creditor: PartyName {
                        name: Some(creditor_name.to_string()),
                    },
                    creditor_account: CashAccount {
                        id: AccountId {
                            iban: creditor_iban.to_string(),
                        },
                    },
                    remittance: Some(RemittanceInfo {
                        unstructured: vec![subject.to_string()],
                    }),
                }],
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Pain001Document {
        build_single_transfer(
            "MSG-1",
            "PMT-1",
            "alice",
            "DE00",
            "SANDBOXX",
            "bob",
            "DE01",
            Some("SANDBOXX"),
            "10.50",
            "EUR",
            "test",
        )
    }

    #[test]
    fn test_roundtrip_and_extract() {
        let rendered = crate::xml::render("Document", &sample()).unwrap();
        let parsed = parse_pain001(&rendered).unwrap();
        let transfers = extract_transfers(&parsed).unwrap();
        assert_eq!(transfers.len(), 1);
        let t = &transfers[0];
        assert_eq!(t.msg_id, "MSG-1");
        assert_eq!(t.pmt_inf_id, "PMT-1");
        assert_eq!(t.debtor_iban, "DE00");
        assert_eq!(t.creditor_iban, "DE01");
        assert_eq!(t.amount, Decimal::new(1050, 2));
        assert_eq!(t.currency, "EUR");
        assert_eq!(t.subject, "test");
    }

    #[test]
    fn test_rejects_signed_amount() {
        let mut doc = sample();
        doc.initiation.payment_information[0].transactions[0]
            .amount
            .instructed_amount
            .amount = "-5".to_string();
        let err = extract_transfers(&doc).unwrap_err();
        assert_eq!(err.return_code(), ReturnCode::InvalidXml);
    }

    #[test]
    fn test_rejects_missing_subject() {
        let mut doc = sample();
        doc.initiation.payment_information[0].transactions[0].remittance = None;
        assert!(extract_transfers(&doc).is_err());
    }

    #[test]
    fn test_rejects_malformed_document() {
        assert!(parse_pain001("<Document><Nothing/></Document>").is_err());
    }
}
