//! CAMT.052/053 document models
//!
//! Serialize-side models for the bank-to-customer report (052) and
//! statement (053). Both share the account/balance/entry shapes; the
//! only difference is the wrapper element.

use serde::{Deserialize, Serialize};

/// Namespace of camt.052.001.02.
pub const CAMT_052_NS: &str = "urn:iso:std:iso:20022:tech:xsd:camt.052.001.02";
/// Namespace of camt.053.001.02.
pub const CAMT_053_NS: &str = "urn:iso:std:iso:20022:tech:xsd:camt.053.001.02";

/// Group header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtGroupHeader {
    /// Message id, `sandbox-<epochMs>`
    #[serde(rename = "MsgId")]
    pub msg_id: String,
    /// ISO-8601 zoned creation time
    #[serde(rename = "CreDtTm")]
    pub creation_date_time: String,
}

/// Account identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtAccountId {
    /// IBAN
    #[serde(rename = "IBAN")]
    pub iban: String,
}

/// Party with a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtParty {
    /// Display name
    #[serde(rename = "Nm", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Institution identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtFinInstnId {
    /// BIC
    #[serde(rename = "BIC", default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    /// Name
    #[serde(rename = "Nm", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Servicer agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtAgent {
    /// Institution identification
    #[serde(rename = "FinInstnId")]
    pub fin_instn_id: CamtFinInstnId,
}

/// Account block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtAccount {
    /// Identification
    #[serde(rename = "Id")]
    pub id: CamtAccountId,
    /// Currency
    #[serde(rename = "Ccy", default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Owner
    #[serde(rename = "Ownr", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<CamtParty>,
    /// Servicer
    #[serde(rename = "Svcr", default, skip_serializing_if = "Option::is_none")]
    pub servicer: Option<CamtAgent>,
}

/// Amount with currency attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyAndAmount {
    /// Currency code
    #[serde(rename = "@Ccy")]
    pub currency: String,
    /// Plain decimal, always the absolute value
    #[serde(rename = "$text")]
    pub amount: String,
}

/// Balance type code wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceTypeCode {
    /// PRCD or CLBD
    #[serde(rename = "Cd")]
    pub code: String,
}

/// Balance type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceType {
    /// Code wrapper
    #[serde(rename = "CdOrPrtry")]
    pub code_or_proprietary: BalanceTypeCode,
}

/// Date leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateLeaf {
    /// ISO date
    #[serde(rename = "Dt")]
    pub date: String,
}

/// One balance block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashBalance {
    /// PRCD/CLBD discriminator
    #[serde(rename = "Tp")]
    pub balance_type: BalanceType,
    /// Absolute amount
    #[serde(rename = "Amt")]
    pub amount: CurrencyAndAmount,
    /// CRDT when the signed balance is >= 0, DBIT otherwise
    #[serde(rename = "CdtDbtInd")]
    pub credit_debit_indicator: String,
    /// Reference date
    #[serde(rename = "Dt")]
    pub date: DateLeaf,
}

/// Bank transaction code family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransactionFamily {
    /// Family code
    #[serde(rename = "Cd")]
    pub code: String,
    /// Sub-family code
    #[serde(rename = "SubFmlyCd")]
    pub sub_family_code: String,
}

/// Bank transaction code domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransactionDomain {
    /// Domain code
    #[serde(rename = "Cd")]
    pub code: String,
    /// Family
    #[serde(rename = "Fmly")]
    pub family: BankTransactionFamily,
}

/// Bank transaction code, fixed to PMNT/ICDT/ESCT here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransactionCode {
    /// Domain block
    #[serde(rename = "Domn")]
    pub domain: BankTransactionDomain,
}

impl BankTransactionCode {
    /// The fixed SEPA credit-transfer code.
    pub fn sepa_credit_transfer() -> Self {
        Self {
            domain: BankTransactionDomain {
                code: "PMNT".to_string(),
                family: BankTransactionFamily {
                    code: "ICDT".to_string(),
                    sub_family_code: "ESCT".to_string(),
                },
            },
        }
    }
}

/// Transaction references inside entry details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionReferences {
    /// Message id
    #[serde(rename = "MsgId", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Payment information id
    #[serde(rename = "PmtInfId", default, skip_serializing_if = "Option::is_none")]
    pub pmt_inf_id: Option<String>,
    /// End-to-end id
    #[serde(rename = "EndToEndId", default, skip_serializing_if = "Option::is_none")]
    pub end_to_end_id: Option<String>,
}

/// Account of a related party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedAccount {
    /// Identification
    #[serde(rename = "Id")]
    pub id: CamtAccountId,
}

/// Related parties: the other side of the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedParties {
    /// Debtor party
    #[serde(rename = "Dbtr", default, skip_serializing_if = "Option::is_none")]
    pub debtor: Option<CamtParty>,
    /// Debtor account
    #[serde(rename = "DbtrAcct", default, skip_serializing_if = "Option::is_none")]
    pub debtor_account: Option<RelatedAccount>,
    /// Creditor party
    #[serde(rename = "Cdtr", default, skip_serializing_if = "Option::is_none")]
    pub creditor: Option<CamtParty>,
    /// Creditor account
    #[serde(rename = "CdtrAcct", default, skip_serializing_if = "Option::is_none")]
    pub creditor_account: Option<RelatedAccount>,
}

/// Related agents: BICs of the other side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedAgents {
    /// Debtor agent
    #[serde(rename = "DbtrAgt", default, skip_serializing_if = "Option::is_none")]
    pub debtor_agent: Option<CamtAgent>,
    /// Creditor agent
    #[serde(rename = "CdtrAgt", default, skip_serializing_if = "Option::is_none")]
    pub creditor_agent: Option<CamtAgent>,
}

/// Remittance info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtRemittance {
    /// Unstructured subject lines
    #[serde(rename = "Ustrd", default, skip_serializing_if = "Vec::is_empty")]
    pub unstructured: Vec<String>,
}

/// Details of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetails {
    /// References
    #[serde(rename = "Refs")]
    pub references: TransactionReferences,
    /// Other-party names and accounts
    #[serde(rename = "RltdPties", default, skip_serializing_if = "Option::is_none")]
    pub related_parties: Option<RelatedParties>,
    /// Other-party agents
    #[serde(rename = "RltdAgts", default, skip_serializing_if = "Option::is_none")]
    pub related_agents: Option<RelatedAgents>,
    /// Subject
    #[serde(rename = "RmtInf", default, skip_serializing_if = "Option::is_none")]
    pub remittance: Option<CamtRemittance>,
}

/// Entry details wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDetails {
    /// Transaction details
    #[serde(rename = "TxDtls")]
    pub transaction_details: TransactionDetails,
}

/// One booked entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Absolute amount
    #[serde(rename = "Amt")]
    pub amount: CurrencyAndAmount,
    /// CRDT when the owner is the creditor, DBIT otherwise
    #[serde(rename = "CdtDbtInd")]
    pub credit_debit_indicator: String,
    /// Always BOOK
    #[serde(rename = "Sts")]
    pub status: String,
    /// Booking date
    #[serde(rename = "BookgDt")]
    pub booking_date: DateLeaf,
    /// Value date
    #[serde(rename = "ValDt")]
    pub value_date: DateLeaf,
    /// Shared posting reference
    #[serde(rename = "AcctSvcrRef")]
    pub account_servicer_ref: String,
    /// Fixed PMNT/ICDT/ESCT
    #[serde(rename = "BkTxCd")]
    pub bank_transaction_code: BankTransactionCode,
    /// Details
    #[serde(rename = "NtryDtls")]
    pub entry_details: EntryDetails,
}

/// Report or statement body (the `Rpt`/`Stmt` element).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountReport {
    /// Report/statement id
    #[serde(rename = "Id")]
    pub id: String,
    /// Sequence number
    #[serde(rename = "ElctrncSeqNb", default, skip_serializing_if = "Option::is_none")]
    pub electronic_seq_nb: Option<u64>,
    /// Creation time
    #[serde(rename = "CreDtTm")]
    pub creation_date_time: String,
    /// Account block
    #[serde(rename = "Acct")]
    pub account: CamtAccount,
    /// PRCD then CLBD
    #[serde(rename = "Bal")]
    pub balances: Vec<CashBalance>,
    /// Entries in chronological order; may be empty
    #[serde(rename = "Ntry", default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<ReportEntry>,
}

/// `BkToCstmrAcctRpt` wrapper (camt.052).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankToCustomerReport {
    /// Group header
    #[serde(rename = "GrpHdr")]
    pub group_header: CamtGroupHeader,
    /// Reports
    #[serde(rename = "Rpt")]
    pub reports: Vec<AccountReport>,
}

/// `BkToCstmrStmt` wrapper (camt.053).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankToCustomerStatement {
    /// Group header
    #[serde(rename = "GrpHdr")]
    pub group_header: CamtGroupHeader,
    /// Statements
    #[serde(rename = "Stmt")]
    pub statements: Vec<AccountReport>,
}

/// CAMT `Document` root holding either wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamtDocument {
    /// Namespace attribute
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    /// camt.052 body
    #[serde(
        rename = "BkToCstmrAcctRpt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub report: Option<BankToCustomerReport>,
    /// camt.053 body
    #[serde(rename = "BkToCstmrStmt", default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<BankToCustomerStatement>,
}
