//! Circuit (cash-out) and account administration handlers
//!
//! Every handler is a plain function returning
//! `ApiResult<T>`; the server binary owns routing, auth extraction and
//! the conversion of [`crate::ApiError`] to wire form. Status mapping
//! follows the conventions of the wire API: 204/202 on success, 409 on
//! conflicts, 412 on failed preconditions, 403 on forbidden, 404 on
//! missing.

use crate::error::{ApiError, ApiResult};
use crate::rates::ConversionConfig;
use crate::tan::{self, TanSender};
use chrono::Utc;
use ledger_core::ledger::{balance, post_transfer, PostingRequest};
use ledger_core::types::{
    BankAccountRow, CashoutOperationRow, CashoutStatus, CurrencyAmount, CustomerRow, TanChannel,
};
use ledger_core::{Store, ADMIN_ACCOUNT};
use message_bus::{NotificationBus, Topic};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Accounts that belong to the institution, not to customers.
const INSTITUTIONAL_USERS: &[&str] = &["admin", "bank"];

/// Account creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountCreateRequest {
    /// Login name; becomes the account label
    pub username: String,
    /// Legal name
    pub name: Option<String>,
    /// Contact e-mail
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Fiat destination, `payto://iban/...`
    pub cashout_address: Option<String>,
}

/// Contact-data update payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatchRequest {
    /// New legal name
    pub name: Option<String>,
    /// New contact e-mail
    pub email: Option<String>,
    /// New contact phone
    pub phone: Option<String>,
    /// New fiat destination
    pub cashout_address: Option<String>,
}

/// Account detail answer.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfoResponse {
    /// Login name
    pub username: String,
    /// Account IBAN
    pub iban: String,
    /// Servicing BIC
    pub bic: String,
    /// Current balance, `CUR:X.Y`
    pub balance: String,
    /// Allowed overdraft, `CUR:X.Y`
    pub debit_threshold: String,
}

/// Cash-out creation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CashoutCreateRequest {
    /// Regional amount to debit, `CUR:X.Y`
    pub amount_debit: String,
    /// Expected fiat credit, `CUR:X.Y`; must match the conversion
    pub amount_credit: String,
    /// Optional subject
    pub subject: Option<String>,
    /// Optional explicit TAN channel
    pub tan_channel: Option<TanChannel>,
}

/// Cash-out creation answer (202).
#[derive(Debug, Clone, Serialize)]
pub struct CashoutCreateResponse {
    /// Operation id for confirm/abort
    pub uuid: Uuid,
}

/// Cash-out confirmation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CashoutConfirmRequest {
    /// The TAN that was delivered out-of-band
    pub tan: String,
}

/// Cash-out detail answer.
#[derive(Debug, Clone, Serialize)]
pub struct CashoutStatusResponse {
    /// Operation id
    pub uuid: Uuid,
    /// PENDING or CONFIRMED
    pub status: CashoutStatus,
    /// Regional debit
    pub amount_debit: String,
    /// Fiat credit
    pub amount_credit: String,
    /// Subject
    pub subject: String,
    /// Creation time, epoch milliseconds
    pub creation_time: i64,
    /// Confirmation time, epoch milliseconds
    pub confirmation_time: Option<i64>,
    /// Channel the TAN went out on
    pub tan_channel: TanChannel,
    /// Owning account
    pub account: String,
}

/// Cash-out listing answer.
#[derive(Debug, Clone, Serialize)]
pub struct CashoutListResponse {
    /// Operation ids
    pub cashouts: Vec<Uuid>,
}

/// Estimate request: exactly one side given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EstimateRequest {
    /// Regional amount, `CUR:X.Y`
    pub amount_debit: Option<String>,
    /// Fiat amount, `CUR:X.Y`
    pub amount_credit: Option<String>,
}

/// Estimate answer: both sides.
#[derive(Debug, Clone, Serialize)]
pub struct EstimateResponse {
    /// Regional amount
    pub amount_debit: String,
    /// Fiat amount
    pub amount_credit: String,
}

/// `/config` answer.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    /// API name
    pub name: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Fiat currency
    pub fiat_currency: String,
    /// Active ratio and fee
    pub ratios_and_fees: crate::rates::RatiosAndFees,
}

/// The Circuit service.
pub struct CircuitApi {
    store: Arc<Store>,
    bus: Arc<NotificationBus>,
    tan_sender: TanSender,
    conversion: ConversionConfig,
    demobank: String,
    test_tan_override: Option<String>,
}

impl CircuitApi {
    /// Assemble the service; the TAN test override is read from the
    /// environment once, here.
    pub fn new(
        store: Arc<Store>,
        bus: Arc<NotificationBus>,
        tan_sender: TanSender,
        conversion: ConversionConfig,
        demobank: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            tan_sender,
            conversion,
            demobank: demobank.into(),
            test_tan_override: std::env::var(tan::TEST_TAN_ENV).ok(),
        }
    }

    /// Replace the TAN override (tests).
    pub fn with_test_tan_override(mut self, tan: Option<String>) -> Self {
        self.test_tan_override = tan;
        self
    }

    fn ensure_not_institutional(username: &str, status: u16) -> ApiResult<()> {
        if INSTITUTIONAL_USERS.contains(&username) {
            let message = format!("{} is an institutional user", username);
            return Err(match status {
                403 => ApiError::forbidden(message),
                _ => ApiError::conflict(message),
            });
        }
        Ok(())
    }

    fn account_info(&self, tables: &ledger_core::Tables, username: &str) -> ApiResult<AccountInfoResponse> {
        let account = tables
            .account(username)
            .map_err(|_| ApiError::not_found(format!("account {}", username)))?;
        let demobank = tables.demobank(&account.demobank)?;
        let current = balance(tables, username, true)?;
        let threshold = if username == ADMIN_ACCOUNT {
            demobank.bank_debt_limit
        } else {
            demobank.users_debt_limit
        };
        Ok(AccountInfoResponse {
            username: username.to_string(),
            iban: account.iban.clone(),
            bic: account.bic.clone(),
            balance: CurrencyAmount::new(demobank.currency.clone(), current).to_string(),
            debit_threshold: CurrencyAmount::new(demobank.currency.clone(), threshold).to_string(),
        })
    }

    /// POST /accounts
    pub fn create_account(&self, request: &AccountCreateRequest) -> ApiResult<AccountInfoResponse> {
        let username = request.username.trim();
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ApiError::bad_request("invalid username"));
        }
        Self::ensure_not_institutional(username, 409)?;
        self.store.transact(|tables| {
            if tables.customers.contains_key(username) || tables.accounts.contains_key(username) {
                return Err(ApiError::conflict(format!("{} already exists", username)));
            }
            let demobank = tables
                .demobank(&self.demobank)
                .map_err(ApiError::from)?
                .clone();
            if !demobank.allow_registrations {
                return Err(ApiError::forbidden("registrations are closed"));
            }
            let iban = random_unused_iban(tables);
            tables.customers.insert(
                username.to_string(),
                CustomerRow {
                    username: username.to_string(),
                    name: request.name.clone(),
                    email: request.email.clone(),
                    phone: request.phone.clone(),
                    cashout_address: request.cashout_address.clone(),
                },
            );
            tables.accounts.insert(
                username.to_string(),
                BankAccountRow {
                    label: username.to_string(),
                    iban,
                    bic: "SANDBOXX".to_string(),
                    owner: username.to_string(),
                    demobank: demobank.name.clone(),
                    last_transaction: None,
                    last_fiat_submission: None,
                },
            );
            info!(username, "account created");
            self.account_info(tables, username)
        })
    }

    /// GET /accounts/{name}
    pub fn get_account(&self, username: &str) -> ApiResult<AccountInfoResponse> {
        self.store.read(|tables| self.account_info(tables, username))
    }

    /// PATCH /accounts/{name}
    pub fn update_account(&self, username: &str, patch: &AccountPatchRequest) -> ApiResult<()> {
        Self::ensure_not_institutional(username, 403)?;
        self.store.transact(|tables| {
            let customer = tables
                .customers
                .get_mut(username)
                .ok_or_else(|| ApiError::not_found(format!("account {}", username)))?;
            if let Some(name) = &patch.name {
                customer.name = Some(name.clone());
            }
            if let Some(email) = &patch.email {
                customer.email = Some(email.clone());
            }
            if let Some(phone) = &patch.phone {
                customer.phone = Some(phone.clone());
            }
            if let Some(address) = &patch.cashout_address {
                customer.cashout_address = Some(address.clone());
            }
            Ok(())
        })
    }

    /// DELETE /accounts/{name}
    ///
    /// Rejected with 412 while the balance is non-zero; deletion
    /// cascades to the account's ledger rows.
    pub fn delete_account(&self, username: &str) -> ApiResult<()> {
        Self::ensure_not_institutional(username, 403)?;
        self.store.transact(|tables| {
            tables
                .account(username)
                .map_err(|_| ApiError::not_found(format!("account {}", username)))?;
            let current = balance(tables, username, true)?;
            if current != Decimal::ZERO {
                return Err(ApiError::precondition_failed(format!(
                    "balance is {}, not zero",
                    current
                )));
            }
            tables.transactions.retain(|_, t| t.account_label != username);
            tables
                .fresh_transactions
                .retain(|_, f| f.account_label != username);
            tables.statements.retain(|_, s| s.account_label != username);
            tables.accounts.remove(username);
            tables.customers.remove(username);
            info!(username, "account deleted");
            Ok(())
        })
    }

    /// POST /cashouts — 202 `{uuid}` on success.
    pub async fn create_cashout(
        &self,
        username: &str,
        request: &CashoutCreateRequest,
    ) -> ApiResult<CashoutCreateResponse> {
        Self::ensure_not_institutional(username, 409)?;
        let amount_debit: CurrencyAmount = request
            .amount_debit
            .parse()
            .map_err(|e: ledger_core::Error| ApiError::bad_request(e.to_string()))?;
        let amount_credit: CurrencyAmount = request
            .amount_credit
            .parse()
            .map_err(|e: ledger_core::Error| ApiError::bad_request(e.to_string()))?;

        // Validate everything before delivering the TAN.
        let (customer, channel, address) = self.store.read(|tables| {
            let customer = tables
                .customers
                .get(username)
                .cloned()
                .ok_or_else(|| ApiError::not_found(format!("account {}", username)))?;
            tables
                .account(username)
                .map_err(|_| ApiError::not_found(format!("account {}", username)))?;
            let demobank = tables.demobank(&self.demobank).map_err(ApiError::from)?;
            if amount_debit.currency != demobank.currency {
                return Err(ApiError::bad_request(format!(
                    "amount_debit must be in {}",
                    demobank.currency
                )));
            }
            if amount_credit.currency != self.conversion.fiat_currency {
                return Err(ApiError::bad_request(format!(
                    "amount_credit must be in {}",
                    self.conversion.fiat_currency
                )));
            }
            if amount_debit.value <= Decimal::ZERO {
                return Err(ApiError::bad_request("amount_debit must be positive"));
            }
            let expected = self.conversion.ratios.credit_from_debit(amount_debit.value);
            if expected != amount_credit.value {
                return Err(ApiError::bad_request(format!(
                    "amount_credit {} does not match the conversion {}",
                    amount_credit.value, expected
                )));
            }
            let current = balance(tables, username, true)?;
            if current - amount_debit.value < -demobank.users_debt_limit {
                return Err(ApiError::precondition_failed("insufficient funds"));
            }
            if customer.cashout_address.is_none() {
                return Err(ApiError::bad_request("no cashout address on file"));
            }
            let channel = match request.tan_channel {
                Some(channel) => channel,
                None if customer.email.is_some() => TanChannel::Email,
                None if customer.phone.is_some() => TanChannel::Sms,
                None => TanChannel::File,
            };
            let address = match channel {
                TanChannel::Email => customer
                    .email
                    .clone()
                    .ok_or_else(|| ApiError::bad_request("no e-mail on file"))?,
                TanChannel::Sms => customer
                    .phone
                    .clone()
                    .ok_or_else(|| ApiError::bad_request("no phone on file"))?,
                TanChannel::File => String::new(),
            };
            Ok((customer, channel, address))
        })?;

        let operation_tan = tan::generate_tan();
        if let Err(e) = self.tan_sender.deliver(channel, &address, &operation_tan).await {
            // No operation row exists yet, so the rollback is implicit.
            return Err(ApiError::internal(format!("TAN delivery failed: {}", e)));
        }

        let uuid = Uuid::new_v4();
        let row = CashoutOperationRow {
            uuid,
            amount_debit,
            amount_credit,
            sell_ratio: self.conversion.ratios.sell_ratio,
            sell_fee: self.conversion.ratios.sell_fee,
            subject: request
                .subject
                .clone()
                .unwrap_or_else(|| format!("cash-out of {}", username)),
            creation_time_ms: Utc::now().timestamp_millis(),
            confirmation_time_ms: None,
            tan_channel: channel,
            account: username.to_string(),
            cashout_address: customer.cashout_address.clone().unwrap_or_default(),
            tan: operation_tan,
            status: CashoutStatus::Pending,
        };
        self.store.transact(|tables| {
            tables.cashout_operations.insert(uuid, row.clone());
            Ok::<_, ApiError>(())
        })?;
        info!(%uuid, username, channel = ?channel, "cash-out created");
        Ok(CashoutCreateResponse { uuid })
    }

    /// POST /cashouts/{uuid}/confirm — 204 on success.
    pub fn confirm_cashout(
        &self,
        username: &str,
        uuid: Uuid,
        request: &CashoutConfirmRequest,
    ) -> ApiResult<()> {
        let subject = self.store.transact(|tables| {
            let operation = tables
                .cashout_operations
                .get(&uuid)
                .cloned()
                .ok_or_else(|| ApiError::not_found(format!("cash-out {}", uuid)))?;
            if operation.account != username {
                return Err(ApiError::forbidden("not your cash-out"));
            }
            if operation.status == CashoutStatus::Confirmed {
                return Err(ApiError::precondition_failed("already confirmed"));
            }
            let expected = self
                .test_tan_override
                .as_deref()
                .unwrap_or(operation.tan.as_str());
            if request.tan != expected {
                return Err(ApiError::forbidden("wrong TAN"));
            }

            post_transfer(
                tables,
                &PostingRequest {
                    demobank: self.demobank.clone(),
                    debit_account: operation.account.clone(),
                    credit_account: ADMIN_ACCOUNT.to_string(),
                    subject: operation.subject.clone(),
                    amount: operation.amount_debit.clone(),
                    pmt_inf_id: None,
                    end_to_end_id: Some(uuid.to_string()),
                },
                Utc::now().timestamp_millis(),
            )
            .map_err(ApiError::from)?;

            let row = tables
                .cashout_operations
                .get_mut(&uuid)
                .ok_or_else(|| ApiError::internal("operation vanished"))?;
            row.status = CashoutStatus::Confirmed;
            row.confirmation_time_ms = Some(Utc::now().timestamp_millis());
            Ok(row.subject.clone())
        })?;
        self.bus.publish(&Topic::regio_tx(ADMIN_ACCOUNT), "CRDT");
        info!(%uuid, username, subject = %subject, "cash-out confirmed");
        Ok(())
    }

    /// POST /cashouts/{uuid}/abort — 204 on success.
    pub fn abort_cashout(&self, username: &str, uuid: Uuid) -> ApiResult<()> {
        self.store.transact(|tables| {
            let operation = tables
                .cashout_operations
                .get(&uuid)
                .ok_or_else(|| ApiError::not_found(format!("cash-out {}", uuid)))?;
            if operation.account != username {
                return Err(ApiError::forbidden("not your cash-out"));
            }
            if operation.status == CashoutStatus::Confirmed {
                return Err(ApiError::precondition_failed("already confirmed"));
            }
            tables.cashout_operations.remove(&uuid);
            info!(%uuid, username, "cash-out aborted");
            Ok(())
        })
    }

    /// GET /cashouts/{uuid}
    pub fn get_cashout(&self, username: &str, uuid: Uuid) -> ApiResult<CashoutStatusResponse> {
        self.store.read(|tables| {
            let operation = tables
                .cashout_operations
                .get(&uuid)
                .ok_or_else(|| ApiError::not_found(format!("cash-out {}", uuid)))?;
            if operation.account != username {
                return Err(ApiError::forbidden("not your cash-out"));
            }
            Ok(CashoutStatusResponse {
                uuid: operation.uuid,
                status: operation.status,
                amount_debit: operation.amount_debit.to_string(),
                amount_credit: operation.amount_credit.to_string(),
                subject: operation.subject.clone(),
                creation_time: operation.creation_time_ms,
                confirmation_time: operation.confirmation_time_ms,
                tan_channel: operation.tan_channel,
                account: operation.account.clone(),
            })
        })
    }

    /// GET /cashouts
    pub fn list_cashouts(&self, username: Option<&str>) -> CashoutListResponse {
        self.store.read(|tables| CashoutListResponse {
            cashouts: tables
                .cashout_operations
                .values()
                .filter(|op| username.map_or(true, |u| op.account == u))
                .map(|op| op.uuid)
                .collect(),
        })
    }

    /// POST /cashouts/estimates
    pub fn estimate(&self, request: &EstimateRequest) -> ApiResult<EstimateResponse> {
        let ratios = &self.conversion.ratios;
        let (debit, credit) = match (&request.amount_debit, &request.amount_credit) {
            (Some(debit), None) => {
                let amount: CurrencyAmount = debit
                    .parse()
                    .map_err(|e: ledger_core::Error| ApiError::bad_request(e.to_string()))?;
                let credit = ratios.credit_from_debit(amount.value);
                (amount.value, credit)
            }
            (None, Some(credit)) => {
                let amount: CurrencyAmount = credit
                    .parse()
                    .map_err(|e: ledger_core::Error| ApiError::bad_request(e.to_string()))?;
                let debit = ratios.debit_from_credit(amount.value);
                (debit, amount.value)
            }
            _ => {
                return Err(ApiError::bad_request(
                    "provide exactly one of amount_debit, amount_credit",
                ))
            }
        };
        let regional_currency = self
            .store
            .read(|tables| tables.demobank(&self.demobank).map(|d| d.currency.clone()))?;
        Ok(EstimateResponse {
            amount_debit: CurrencyAmount::new(regional_currency, debit).to_string(),
            amount_credit: CurrencyAmount::new(self.conversion.fiat_currency.clone(), credit)
                .to_string(),
        })
    }

    /// GET /config
    pub fn config(&self) -> ConfigResponse {
        ConfigResponse {
            name: "circuit",
            version: env!("CARGO_PKG_VERSION"),
            fiat_currency: self.conversion.fiat_currency.clone(),
            ratios_and_fees: self.conversion.ratios.clone(),
        }
    }
}

fn random_unused_iban(tables: &ledger_core::Tables) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let digits: String = (0..18).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
        let candidate = format!("DE{}", digits);
        if tables.account_by_iban(&candidate).is_none() {
            return candidate;
        }
    }
}
