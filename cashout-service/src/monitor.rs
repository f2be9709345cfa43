//! Conversion monitor: regional credits out to the fiat rail
//!
//! One long-running task per drained account (default "admin"). Each
//! iteration sleeps first (success, idle and error paths alike, so the
//! loop can never spin), subscribes to the account's REGIO_TX channel,
//! then optimistically queries for credits above the watermark; when
//! nothing is pending it blocks on the subscription up to the wait
//! timeout. Failed submissions are recorded and, by default, skipped
//! over so one broken row cannot wedge the queue; operators reconcile
//! out-of-band.

use crate::nexus::{FiatConnector, PaymentInitiation};
use crate::rates::ConversionConfig;
use chrono::Utc;
use ledger_core::types::{CashoutSubmissionRow, Direction, LedgerTransactionRow};
use ledger_core::Store;
use message_bus::{NotificationBus, Topic};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Monitor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Account whose credits are drained
    pub account_label: String,
    /// Fixed sleep at the top of every iteration
    pub poll_interval: Duration,
    /// How long to block on the notification channel when idle
    pub wait_timeout: Duration,
    /// Whether a failed submission still advances the watermark
    /// (skip-and-alert). Turning this off retries the row forever.
    pub advance_watermark_on_error: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            account_label: ledger_core::ADMIN_ACCOUNT.to_string(),
            poll_interval: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(30),
            advance_watermark_on_error: true,
        }
    }
}

/// The background conversion worker.
pub struct ConversionMonitor {
    store: Arc<Store>,
    bus: Arc<NotificationBus>,
    connector: Arc<dyn FiatConnector>,
    conversion: ConversionConfig,
    config: MonitorConfig,
}

impl ConversionMonitor {
    /// Assemble a monitor over the shared store and bus.
    pub fn new(
        store: Arc<Store>,
        bus: Arc<NotificationBus>,
        connector: Arc<dyn FiatConnector>,
        conversion: ConversionConfig,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            bus,
            connector,
            conversion,
            config,
        }
    }

    /// Run forever. Errors are logged, never propagated; cancellation
    /// happens at the await points.
    pub async fn run(self) {
        info!(
            account = %self.config.account_label,
            connector = self.connector.name(),
            "conversion monitor started"
        );
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            if let Err(e) = self.step().await {
                error!(error = %e, "conversion monitor iteration failed");
            }
        }
    }

    /// One iteration: find new credits and submit them in id order.
    /// Returns how many rows were submitted (successfully or not).
    pub async fn step(&self) -> Result<usize, ledger_core::Error> {
        // Listen before querying so a posting between the query and the
        // wait cannot be lost.
        let handle = self.bus.listen(Topic::regio_tx(&self.config.account_label));
        let mut rows = self.pending_rows();
        if rows.is_empty() {
            if let Some(payload) = self.bus.wait(&handle, self.config.wait_timeout).await {
                if payload == Direction::Crdt.code() {
                    rows = self.pending_rows();
                }
            }
        }
        self.bus.unlisten(&handle);

        let count = rows.len();
        for row in rows {
            let advanced = self.submit_row(&row).await?;
            if !advanced {
                // Keep the watermark ascending: do not leapfrog a row
                // that is configured to be retried.
                break;
            }
        }
        Ok(count)
    }

    fn pending_rows(&self) -> Vec<LedgerTransactionRow> {
        let label = self.config.account_label.clone();
        self.store.read(|tables| {
            let watermark = tables
                .accounts
                .get(&label)
                .and_then(|a| a.last_fiat_submission)
                .unwrap_or(0);
            tables
                .transactions_for(&label)
                .filter(|row| row.direction == Direction::Crdt && row.id > watermark)
                .cloned()
                .collect()
        })
    }

    /// Submit one row; returns whether the watermark moved past it.
    async fn submit_row(&self, row: &LedgerTransactionRow) -> Result<bool, ledger_core::Error> {
        let fiat_amount = self.conversion.ratios.credit_from_debit(row.amount);
        let initiation = PaymentInitiation {
            uid: row.account_servicer_ref.clone(),
            iban: row.creditor_iban.clone(),
            bic: row.debtor_bic.clone().unwrap_or_default(),
            amount: format!("{}:{}", self.conversion.fiat_currency, fiat_amount),
            subject: row.subject.clone(),
            name: row.creditor_name.clone(),
        };
        let outcome = self.connector.submit_payment_initiation(&initiation).await;
        let (response_body, is_submitted, has_errors, advance) = match outcome {
            Ok(body) => {
                info!(uid = %initiation.uid, amount = %initiation.amount, "fiat submission accepted");
                (Some(body), true, false, true)
            }
            Err(e) => {
                warn!(uid = %initiation.uid, error = %e, "fiat submission failed");
                (
                    e.response_body,
                    false,
                    true,
                    self.config.advance_watermark_on_error,
                )
            }
        };
        let now_ms = Utc::now().timestamp_millis();
        let label = self.config.account_label.clone();
        let row_id = row.id;
        self.store.transact(move |tables| {
            let id = tables.alloc_submission_id();
            tables.cashout_submissions.insert(
                id,
                CashoutSubmissionRow {
                    id,
                    transaction_id: row_id,
                    submission_time_ms: now_ms,
                    response_body: response_body.clone(),
                    is_submitted,
                    has_errors,
                },
            );
            if advance {
                tables.account_mut(&label)?.last_fiat_submission = Some(row_id);
            }
            Ok(())
        })?;
        Ok(advance)
    }
}
