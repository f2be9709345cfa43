//! Cash-out lifecycle scenarios against the Circuit handlers
//!
//! Covers creation with TAN delivery, confirmation with the regional
//! posting, aborts, and the monitor leg towards the fiat connector.

use async_trait::async_trait;
use cashout_service::api::{
    AccountCreateRequest, CashoutConfirmRequest, CashoutCreateRequest, EstimateRequest,
};
use cashout_service::nexus::ConnectorError;
use cashout_service::{
    ApiError, CircuitApi, ConversionConfig, ConversionMonitor, FiatConnector, MonitorConfig,
    PaymentInitiation, TanSender,
};
use ledger_core::config::DemobankConfig;
use ledger_core::ledger::{balance, post_transfer, PostingRequest};
use ledger_core::types::{BankAccountRow, CashoutStatus, CurrencyAmount, Direction, TanChannel};
use ledger_core::Store;
use message_bus::NotificationBus;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::Duration;

struct RecordingConnector {
    calls: Mutex<Vec<PaymentInitiation>>,
}

#[async_trait]
impl FiatConnector for RecordingConnector {
    async fn submit_payment_initiation(
        &self,
        initiation: &PaymentInitiation,
    ) -> Result<String, ConnectorError> {
        self.calls.lock().push(initiation.clone());
        Ok("{}".to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn seeded_store() -> Arc<Store> {
    let store = Arc::new(Store::new());
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            tables
                .demobanks
                .insert("default".into(), DemobankConfig::default());
            tables.accounts.insert(
                "admin".into(),
                BankAccountRow {
                    label: "admin".into(),
                    iban: "DE98".into(),
                    bic: "SANDBOXX".into(),
                    owner: "admin".into(),
                    demobank: "default".into(),
                    last_transaction: None,
                    last_fiat_submission: None,
                },
            );
            Ok(())
        })
        .unwrap();
    store
}

fn api(store: Arc<Store>, bus: Arc<NotificationBus>) -> CircuitApi {
    let tan_file = std::env::temp_dir().join(format!(
        "cashout-flow-tan-{}-{}",
        std::process::id(),
        rand_suffix()
    ));
    CircuitApi::new(
        store,
        bus,
        TanSender::new(None, None, tan_file),
        ConversionConfig::default(),
        "default",
    )
    .with_test_tan_override(Some("ABCDE".to_string()))
}

fn rand_suffix() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos() as u64
}

fn fund(store: &Store, username: &str, amount: &str) {
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            post_transfer(
                tables,
                &PostingRequest {
                    demobank: "default".into(),
                    debit_account: "admin".into(),
                    credit_account: username.into(),
                    subject: "signup".into(),
                    amount: CurrencyAmount::new("EUR", amount.parse().unwrap()),
                    pmt_inf_id: None,
                    end_to_end_id: None,
                },
                1_000,
            )?;
            Ok(())
        })
        .unwrap();
}

fn alice_request() -> AccountCreateRequest {
    AccountCreateRequest {
        username: "alice".to_string(),
        name: Some("Alice Example".to_string()),
        email: None,
        phone: None,
        cashout_address: Some("payto://iban/CH99".to_string()),
    }
}

fn cashout_request() -> CashoutCreateRequest {
    CashoutCreateRequest {
        amount_debit: "EUR:20".to_string(),
        amount_credit: "CHF:19.00".to_string(),
        subject: Some("savings".to_string()),
        tan_channel: Some(TanChannel::File),
    }
}

#[tokio::test]
async fn test_cashout_lifecycle_end_to_end() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus.clone());

    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "100");

    // Create: 202 with a uuid, operation pending.
    let created = api.create_cashout("alice", &cashout_request()).await.unwrap();
    let detail = api.get_cashout("alice", created.uuid).unwrap();
    assert_eq!(detail.status, CashoutStatus::Pending);
    assert_eq!(detail.amount_debit, "EUR:20");
    assert_eq!(detail.amount_credit, "CHF:19.00");

    // Confirm with the (overridden) TAN: ledger moves 20 EUR to admin.
    api.confirm_cashout(
        "alice",
        created.uuid,
        &CashoutConfirmRequest {
            tan: "ABCDE".to_string(),
        },
    )
    .unwrap();

    let detail = api.get_cashout("alice", created.uuid).unwrap();
    assert_eq!(detail.status, CashoutStatus::Confirmed);
    assert!(detail.confirmation_time.is_some());

    store.read(|tables| {
        assert_eq!(balance(tables, "alice", true).unwrap(), Decimal::from(80));
        assert_eq!(balance(tables, "admin", true).unwrap(), Decimal::from(-80));
        let pair: Vec<_> = tables
            .transactions
            .values()
            .filter(|t| t.subject == "savings")
            .collect();
        assert_eq!(pair.len(), 2);
        assert!(pair
            .iter()
            .any(|t| t.direction == Direction::Dbit && t.account_label == "alice"));
        assert!(pair
            .iter()
            .any(|t| t.direction == Direction::Crdt && t.account_label == "admin"));
    });

    // The monitor picks the admin credit up and submits CHF:19.00.
    let connector = Arc::new(RecordingConnector {
        calls: Mutex::new(Vec::new()),
    });
    let monitor = ConversionMonitor::new(
        store.clone(),
        bus,
        connector.clone(),
        ConversionConfig::default(),
        MonitorConfig {
            account_label: "admin".to_string(),
            poll_interval: Duration::from_millis(1),
            wait_timeout: Duration::from_millis(20),
            advance_watermark_on_error: true,
        },
    );
    // Two credits exist on admin (signup counter-entry is a debit, the
    // cash-out is the credit); only CRDT rows are submitted.
    let submitted = monitor.step().await.unwrap();
    assert_eq!(submitted, 1);
    let calls = connector.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount, "CHF:19.00");
    assert_eq!(calls[0].subject, "savings");
}

#[tokio::test]
async fn test_confirm_with_wrong_tan_is_forbidden() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);
    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "100");

    let created = api.create_cashout("alice", &cashout_request()).await.unwrap();
    let err = api
        .confirm_cashout(
            "alice",
            created.uuid,
            &CashoutConfirmRequest {
                tan: "WRONG".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.status, 403);
    assert_eq!(
        api.get_cashout("alice", created.uuid).unwrap().status,
        CashoutStatus::Pending
    );
}

#[tokio::test]
async fn test_insufficient_funds_is_precondition_failure() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);
    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "5");

    // users_debt_limit default is 1000, so shrink it to the scenario.
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            tables.demobanks.get_mut("default").unwrap().users_debt_limit = Decimal::from(10);
            Ok(())
        })
        .unwrap();

    let request = CashoutCreateRequest {
        amount_debit: "EUR:20".to_string(),
        amount_credit: "CHF:19.00".to_string(),
        subject: None,
        tan_channel: Some(TanChannel::File),
    };
    let err = api.create_cashout("alice", &request).await.unwrap_err();
    assert_eq!(err.status, 412);

    // Ledger untouched: only the signup posting exists.
    assert_eq!(store.read(|tables| tables.transactions.len()), 2);
}

#[tokio::test]
async fn test_abort_then_confirm_is_not_found() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);
    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "100");

    let created = api.create_cashout("alice", &cashout_request()).await.unwrap();
    api.abort_cashout("alice", created.uuid).unwrap();

    let err = api
        .confirm_cashout(
            "alice",
            created.uuid,
            &CashoutConfirmRequest {
                tan: "ABCDE".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.status, 404);
}

#[tokio::test]
async fn test_confirmed_cashout_cannot_be_aborted_or_reconfirmed() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);
    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "100");

    let created = api.create_cashout("alice", &cashout_request()).await.unwrap();
    let confirm = CashoutConfirmRequest {
        tan: "ABCDE".to_string(),
    };
    api.confirm_cashout("alice", created.uuid, &confirm).unwrap();

    assert_eq!(
        api.abort_cashout("alice", created.uuid).unwrap_err().status,
        412
    );
    assert_eq!(
        api.confirm_cashout("alice", created.uuid, &confirm)
            .unwrap_err()
            .status,
        412
    );
}

#[tokio::test]
async fn test_mismatched_conversion_is_rejected() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);
    api.create_account(&alice_request()).unwrap();
    fund(&store, "alice", "100");

    let request = CashoutCreateRequest {
        amount_debit: "EUR:20".to_string(),
        amount_credit: "CHF:18.00".to_string(),
        subject: None,
        tan_channel: Some(TanChannel::File),
    };
    let err = api.create_cashout("alice", &request).await.unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test]
async fn test_estimates_follow_configured_rate() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store, bus);

    let estimate = api
        .estimate(&EstimateRequest {
            amount_debit: Some("EUR:20".to_string()),
            amount_credit: None,
        })
        .unwrap();
    assert_eq!(estimate.amount_credit, "CHF:19.00");

    let estimate = api
        .estimate(&EstimateRequest {
            amount_debit: None,
            amount_credit: Some("CHF:19".to_string()),
        })
        .unwrap();
    assert_eq!(estimate.amount_debit, "EUR:20.00");

    assert!(api.estimate(&EstimateRequest::default()).is_err());
}

#[test]
fn test_account_admin_surface() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store.clone(), bus);

    // Institutional names are conflicts on creation.
    let err = api
        .create_account(&AccountCreateRequest {
            username: "admin".to_string(),
            name: None,
            email: None,
            phone: None,
            cashout_address: None,
        })
        .unwrap_err();
    assert_eq!(err.status, 409);

    let info = api.create_account(&alice_request()).unwrap();
    assert!(info.iban.starts_with("DE"));
    assert_eq!(info.balance, "EUR:0");

    // Duplicate username conflicts.
    assert_eq!(api.create_account(&alice_request()).unwrap_err().status, 409);

    // Deleting a funded account needs a zero balance first.
    fund(&store, "alice", "10");
    assert_eq!(api.delete_account("alice").unwrap_err().status, 412);
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            post_transfer(
                tables,
                &PostingRequest {
                    demobank: "default".into(),
                    debit_account: "alice".into(),
                    credit_account: "admin".into(),
                    subject: "drain".into(),
                    amount: CurrencyAmount::new("EUR", Decimal::from(10)),
                    pmt_inf_id: None,
                    end_to_end_id: None,
                },
                2_000,
            )?;
            Ok(())
        })
        .unwrap();
    api.delete_account("alice").unwrap();
    assert_eq!(api.get_account("alice").unwrap_err().status, 404);
    assert_eq!(api.delete_account("admin").unwrap_err().status, 403);
}

#[test]
fn test_config_advertises_conversion_settings() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    let api = api(store, bus);
    let config = api.config();
    assert_eq!(config.fiat_currency, "CHF");
    assert_eq!(config.ratios_and_fees.sell_ratio, Decimal::new(95, 2));
}

#[tokio::test]
async fn test_tan_delivery_failure_rolls_back() {
    let store = seeded_store();
    let bus = Arc::new(NotificationBus::new());
    // An EMAIL channel without a configured command fails delivery.
    let api = CircuitApi::new(
        store.clone(),
        bus,
        TanSender::new(None, None, std::env::temp_dir().join("unused-tan")),
        ConversionConfig::default(),
        "default",
    )
    .with_test_tan_override(Some("ABCDE".to_string()));
    api.create_account(&AccountCreateRequest {
        username: "alice".to_string(),
        name: None,
        email: Some("alice@example.com".to_string()),
        phone: None,
        cashout_address: Some("payto://iban/CH99".to_string()),
    })
    .unwrap();
    fund(&store, "alice", "100");

    let request = CashoutCreateRequest {
        amount_debit: "EUR:20".to_string(),
        amount_credit: "CHF:19.00".to_string(),
        subject: None,
        tan_channel: Some(TanChannel::Email),
    };
    let err: ApiError = api.create_cashout("alice", &request).await.unwrap_err();
    assert_eq!(err.status, 500);
    // Rolled back: no operation row exists.
    assert!(store.read(|tables| tables.cashout_operations.is_empty()));
}
