//! EBICS envelope dispatcher and three-phase order state machine
//!
//! One inbound POST body, one response document. The root element
//! selects the handler; `ebicsRequest` runs the
//! INITIALISATION → TRANSFER → RECEIPT machine inside a single
//! serializable store transaction (conflicts retry, errors roll back),
//! and notifications fan out only after commit.

use crate::camt;
use crate::crypto;
use crate::error::{EbicsError, Result, ReturnCode};
use crate::keys::{self, HostKeys};
use crate::orders::{self, PendingNotifications};
use crate::transport;
use crate::xml;
use crate::xml::envelope::*;
use crate::xml::order_data::UserSignatureData;
use crate::xml::signature;
use chrono::{Days, NaiveDate, Utc};
use ledger_core::types::{
    DownloadTransactionRow, EbicsHostRow, EbicsSubscriberRow, OrderSignatureRow, StatementRow,
    SubscriberState, UploadTransactionRow,
};
use ledger_core::{Store, Tables};
use message_bus::{NotificationBus, Topic};
use rsa::RsaPublicKey;
use std::sync::Arc;
use tracing::{info, warn};

const SHA256_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// The bank-side EBICS engine.
pub struct EbicsEngine {
    store: Arc<Store>,
    bus: Arc<NotificationBus>,
}

/// What a successfully processed business phase contributes to the
/// response envelope.
struct BusinessOutcome {
    static_header: ResponseStaticHeader,
    segment_number: Option<SegmentNumber>,
    order_id: Option<String>,
    data_transfer: Option<ResponseDataTransfer>,
    notifications: PendingNotifications,
}

impl EbicsEngine {
    /// Build the engine over the shared store and bus.
    pub fn new(store: Arc<Store>, bus: Arc<NotificationBus>) -> Self {
        Self { store, bus }
    }

    /// Shared store handle.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Provision a host with three freshly generated key pairs.
    pub fn create_host(&self, host_id: &str) -> Result<()> {
        let row = EbicsHostRow {
            host_id: host_id.to_string(),
            signature_key_der: crypto::private_key_to_der(&crypto::generate_key()?)?,
            encryption_key_der: crypto::private_key_to_der(&crypto::generate_key()?)?,
            authentication_key_der: crypto::private_key_to_der(&crypto::generate_key()?)?,
        };
        self.store.transact(|tables| {
            let key = host_id.to_lowercase();
            if tables.ebics_hosts.contains_key(&key) {
                return Err(EbicsError::Ledger(ledger_core::Error::Duplicate(format!(
                    "ebics host {}",
                    host_id
                ))));
            }
            tables.ebics_hosts.insert(key, row.clone());
            Ok(())
        })?;
        info!(host_id, "EBICS host created");
        Ok(())
    }

    /// Provision a subscriber in state NEW.
    pub fn create_subscriber(
        &self,
        host_id: &str,
        partner_id: &str,
        user_id: &str,
        system_id: Option<&str>,
        bank_account: Option<&str>,
    ) -> Result<i64> {
        let id = self.store.transact(|tables| {
            tables.ebics_host(host_id)?;
            if tables
                .subscriber_by_ids(host_id, partner_id, user_id, system_id)
                .is_some()
            {
                return Err(EbicsError::Ledger(ledger_core::Error::Duplicate(format!(
                    "subscriber {}/{}",
                    partner_id, user_id
                ))));
            }
            let id = tables.alloc_subscriber_id();
            tables.ebics_subscribers.insert(
                id,
                EbicsSubscriberRow {
                    id,
                    host_id: host_id.to_string(),
                    partner_id: partner_id.to_string(),
                    user_id: user_id.to_string(),
                    system_id: system_id.map(str::to_string),
                    state: SubscriberState::New,
                    next_order_id: 0,
                    signature_key: None,
                    encryption_key: None,
                    authentication_key: None,
                    bank_account: bank_account.map(str::to_string),
                },
            );
            Ok(id)
        })?;
        info!(host_id, partner_id, user_id, "EBICS subscriber created");
        Ok(id)
    }

    /// The host authentication and encryption public keys, for clients
    /// that bootstrap out-of-band.
    pub fn host_public_keys(&self, host_id: &str) -> Result<(RsaPublicKey, RsaPublicKey)> {
        let host = self
            .store
            .read(|tables| HostKeys::load(tables, host_id))?;
        Ok((
            host.authentication.to_public_key(),
            host.encryption.to_public_key(),
        ))
    }

    /// Materialize an end-of-period statement for one account
    /// (operator/cron entry point).
    pub fn materialize_statement(&self, account_label: &str) -> Result<StatementRow> {
        let now_ms = Utc::now().timestamp_millis();
        self.store
            .transact(|tables| camt::materialize_statement(tables, account_label, now_ms))
    }

    /// Handle one EBICS POST body, returning the response document.
    ///
    /// An `Err` here means the response could not be signed (unknown
    /// host, unparseable envelope) and maps to plain HTTP 400.
    pub fn handle_request(&self, body: &str) -> Result<String> {
        match xml::root_local_name(body)?.as_str() {
            "ebicsHEVRequest" => self.handle_hev(body),
            "ebicsUnsecuredRequest" => self.handle_unsecured(body),
            "ebicsNoPubKeyDigestsRequest" => self.handle_npkd(body),
            "ebicsRequest" => self.handle_business(body),
            other => Err(EbicsError::BadEnvelope(format!(
                "unsupported root element {}",
                other
            ))),
        }
    }

    fn handle_hev(&self, body: &str) -> Result<String> {
        let request: HevRequest = xml::parse(body)
            .map_err(|e| EbicsError::BadEnvelope(format!("HEV request: {}", e)))?;
        let known = self
            .store
            .read(|tables| tables.ebics_host(&request.host_id).is_ok());
        let response = if known {
            HevResponse::supported(ReturnCode::Ok.code(), ReturnCode::Ok.report_text())
        } else {
            HevResponse {
                xmlns: HEV_NS.to_string(),
                system_return_code: SystemReturnCode {
                    return_code: ReturnCode::InvalidHost.code().to_string(),
                    report_text: ReturnCode::InvalidHost.report_text().to_string(),
                },
                versions: Vec::new(),
            }
        };
        xml::render("ebicsHEVResponse", &response)
    }

    fn handle_unsecured(&self, body: &str) -> Result<String> {
        let request: EbicsUnsecuredRequest = xml::parse(body)
            .map_err(|e| EbicsError::BadEnvelope(format!("unsecured request: {}", e)))?;
        let host = self
            .store
            .read(|tables| HostKeys::load(tables, &request.header.static_.host_id))?;
        let order_type = request.header.static_.order_details.order_type.clone();
        let outcome: Result<()> = match order_type.as_str() {
            "INI" => self.store.transact(|t| keys::process_ini(t, &request)),
            "HIA" => self.store.transact(|t| keys::process_hia(t, &request)),
            other => Err(EbicsError::protocol(
                ReturnCode::UnsupportedOrderType,
                format!("unsecured order {}", other),
            )),
        };
        let code = match &outcome {
            Ok(()) => ReturnCode::Ok,
            Err(e) => {
                warn!(order_type = %order_type, error = %e, "key management order failed");
                e.return_code()
            }
        };
        self.finalize_key_mgmt(&host, code, None, None)
    }

    fn handle_npkd(&self, body: &str) -> Result<String> {
        let request: EbicsNpkdRequest = xml::parse(body)
            .map_err(|e| EbicsError::BadEnvelope(format!("HPB request: {}", e)))?;
        let host = self
            .store
            .read(|tables| HostKeys::load(tables, &request.header.static_.host_id))?;
        if request.header.static_.order_details.order_type != "HPB" {
            return self.finalize_key_mgmt(&host, ReturnCode::UnsupportedOrderType, None, None);
        }
        let outcome = self
            .store
            .read(|tables| keys::process_hpb(tables, &request, &host));
        match outcome {
            Ok(data_transfer) => self.finalize_key_mgmt(
                &host,
                ReturnCode::Ok,
                Some(keys::HPB_ORDER_ID.to_string()),
                Some(data_transfer),
            ),
            Err(e) => {
                warn!(error = %e, "HPB failed");
                self.finalize_key_mgmt(&host, e.return_code(), None, None)
            }
        }
    }

    fn handle_business(&self, body: &str) -> Result<String> {
        let request: EbicsRequest = xml::parse(body)
            .map_err(|e| EbicsError::BadEnvelope(format!("ebicsRequest: {}", e)))?;
        let host = self
            .store
            .read(|tables| HostKeys::load(tables, &request.header.static_.host_id))?;
        let now_ms = Utc::now().timestamp_millis();
        let phase = request.header.mutable.transaction_phase;

        let outcome: Result<BusinessOutcome> = self
            .store
            .transact(|tables| process_business(tables, &request, &host, now_ms));

        let response = match outcome {
            Ok(outcome) => {
                for (label, payload) in &outcome.notifications {
                    self.bus.publish(&Topic::regio_tx(label), payload);
                }
                EbicsResponse {
                    xmlns: EBICS_NS.to_string(),
                    version: "H004".to_string(),
                    revision: "1".to_string(),
                    header: ResponseHeader {
                        authenticate: true,
                        static_: outcome.static_header,
                        mutable: ResponseMutableHeader {
                            transaction_phase: phase,
                            segment_number: outcome.segment_number,
                            order_id: outcome.order_id,
                            return_code: ReturnCode::Ok.code().to_string(),
                            report_text: ReturnCode::Ok.report_text().to_string(),
                        },
                    },
                    auth_signature: signature::unsigned(),
                    body: ResponseBody {
                        data_transfer: outcome.data_transfer,
                        return_code: BodyReturnCode {
                            authenticate: true,
                            value: ReturnCode::Ok.code().to_string(),
                        },
                    },
                }
            }
            Err(e) => {
                let code = e.return_code();
                warn!(phase = ?phase, code = code.code(), error = %e, "ebicsRequest failed");
                EbicsResponse {
                    xmlns: EBICS_NS.to_string(),
                    version: "H004".to_string(),
                    revision: "1".to_string(),
                    header: ResponseHeader {
                        authenticate: true,
                        static_: ResponseStaticHeader::default(),
                        mutable: ResponseMutableHeader {
                            transaction_phase: phase,
                            segment_number: None,
                            order_id: None,
                            return_code: code.code().to_string(),
                            report_text: code.report_text().to_string(),
                        },
                    },
                    auth_signature: signature::unsigned(),
                    body: ResponseBody {
                        data_transfer: None,
                        return_code: BodyReturnCode {
                            authenticate: true,
                            value: code.code().to_string(),
                        },
                    },
                }
            }
        };
        self.finalize_business(&host, response)
    }

    fn finalize_business(&self, host: &HostKeys, mut response: EbicsResponse) -> Result<String> {
        let header_canonical = xml::element("header", &response.header)?;
        response.auth_signature = signature::sign_header(&header_canonical, &host.authentication)?;
        xml::render("ebicsResponse", &response)
    }

    fn finalize_key_mgmt(
        &self,
        host: &HostKeys,
        code: ReturnCode,
        order_id: Option<String>,
        data_transfer: Option<KeyMgmtDataTransfer>,
    ) -> Result<String> {
        let mut response = EbicsKeyManagementResponse {
            xmlns: EBICS_NS.to_string(),
            version: "H004".to_string(),
            revision: "1".to_string(),
            header: KeyMgmtHeader {
                authenticate: true,
                static_: EmptyElement {},
                mutable: KeyMgmtMutableHeader {
                    order_id,
                    return_code: code.code().to_string(),
                    report_text: code.report_text().to_string(),
                },
            },
            auth_signature: signature::unsigned(),
            body: KeyMgmtBody {
                data_transfer,
                return_code: BodyReturnCode {
                    authenticate: true,
                    value: code.code().to_string(),
                },
            },
        };
        let header_canonical = xml::element("header", &response.header)?;
        response.auth_signature = signature::sign_header(&header_canonical, &host.authentication)?;
        xml::render("ebicsKeyManagementResponse", &response)
    }
}

fn resolve_subscriber(tables: &Tables, request: &EbicsRequest) -> Result<EbicsSubscriberRow> {
    let static_ = &request.header.static_;
    if let Some(tid) = &static_.transaction_id {
        let key = tid.to_lowercase();
        let subscriber_id = tables
            .download_transactions
            .get(&key)
            .map(|d| d.subscriber_id)
            .or_else(|| tables.upload_transactions.get(&key).map(|u| u.subscriber_id))
            .ok_or_else(|| {
                EbicsError::protocol(ReturnCode::InvalidUserOrState, "unknown transaction id")
            })?;
        tables
            .ebics_subscribers
            .get(&subscriber_id)
            .cloned()
            .ok_or_else(|| {
                EbicsError::protocol(ReturnCode::InvalidUserOrState, "dangling transaction")
            })
    } else {
        let partner_id = static_.partner_id.as_deref().ok_or_else(|| {
            EbicsError::protocol(ReturnCode::InvalidRequest, "missing PartnerID")
        })?;
        let user_id = static_
            .user_id
            .as_deref()
            .ok_or_else(|| EbicsError::protocol(ReturnCode::InvalidRequest, "missing UserID"))?;
        tables
            .subscriber_by_ids(
                &static_.host_id,
                partner_id,
                user_id,
                static_.system_id.as_deref(),
            )
            .cloned()
            .ok_or_else(|| {
                EbicsError::protocol(ReturnCode::InvalidUserOrState, "unknown subscriber")
            })
    }
}

fn parse_date_range(details: &BusinessOrderDetails) -> Result<Option<(i64, i64)>> {
    let Some(params) = &details.standard_order_params else {
        return Ok(None);
    };
    let Some(range) = &params.date_range else {
        return Ok(None);
    };
    let parse = |value: &str| {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
            EbicsError::protocol(ReturnCode::InvalidRequest, format!("date range: {}", e))
        })
    };
    let start = parse(&range.start)?;
    let end = parse(&range.end)?;
    let to_ms = |date: NaiveDate| {
        date.and_hms_opt(0, 0, 0)
            .expect("midnight exists")
            .and_utc()
            .timestamp_millis()
    };
    // End date is inclusive: filter strictly below the next midnight.
    let end_exclusive = end.checked_add_days(Days::new(1)).unwrap_or(end);
    Ok(Some((to_ms(start), to_ms(end_exclusive))))
}

fn process_business(
    tables: &mut Tables,
    request: &EbicsRequest,
    host: &HostKeys,
    now_ms: i64,
) -> Result<BusinessOutcome> {
    let subscriber = resolve_subscriber(tables, request)?;
    if !matches!(
        subscriber.state,
        SubscriberState::Initialized | SubscriberState::Ready
    ) {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidUserOrState,
            "subscriber not initialized",
        ));
    }
    let auth_key = keys::subscriber_public_key(&subscriber.authentication_key)?;
    let header_canonical = xml::element("header", &request.header)?;
    signature::verify_header(&request.auth_signature, &header_canonical, &auth_key)?;

    match request.header.mutable.transaction_phase {
        TransactionPhase::Initialisation => {
            handle_initialisation(tables, request, host, &subscriber, now_ms)
        }
        TransactionPhase::Transfer => handle_transfer(tables, request, host, &subscriber, now_ms),
        TransactionPhase::Receipt => handle_receipt(tables, request),
    }
}

fn handle_initialisation(
    tables: &mut Tables,
    request: &EbicsRequest,
    host: &HostKeys,
    subscriber: &EbicsSubscriberRow,
    now_ms: i64,
) -> Result<BusinessOutcome> {
    let static_ = &request.header.static_;
    let details = static_.order_details.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing OrderDetails")
    })?;
    match static_.num_segments {
        None => handle_download_init(tables, details, subscriber, now_ms),
        Some(declared) => {
            handle_upload_init(tables, request, details, host, subscriber, declared)
        }
    }
}

fn handle_download_init(
    tables: &mut Tables,
    details: &BusinessOrderDetails,
    subscriber: &EbicsSubscriberRow,
    now_ms: i64,
) -> Result<BusinessOutcome> {
    let date_range = parse_date_range(details)?;
    let payload = orders::download_payload(
        tables,
        subscriber,
        &details.order_type,
        date_range,
        now_ms,
    )?;
    let packed = transport::deflate(&payload)?;
    let subscriber_enc = keys::subscriber_public_key(&subscriber.encryption_key)?;
    let encrypted = crypto::e002_encrypt(&subscriber_enc, &packed)?;
    let encoded = transport::b64_encode(&encrypted.ciphertext);
    let num_segments = transport::segment_count(encoded.len());
    let transaction_id = transport::new_transaction_id();

    tables.download_transactions.insert(
        transaction_id.to_lowercase(),
        DownloadTransactionRow {
            transaction_id: transaction_id.clone(),
            host_id: subscriber.host_id.clone(),
            subscriber_id: subscriber.id,
            order_type: details.order_type.clone(),
            num_segments,
            segment_size: transport::SEGMENT_SIZE,
            encoded_response: encoded.clone(),
            transaction_key_enc: encrypted.transaction_key_enc.clone(),
            receipt_received: false,
        },
    );
    let first_segment = transport::nth_segment(&encoded, 1)?.to_string();
    info!(
        order_type = %details.order_type,
        transaction_id = %transaction_id,
        num_segments,
        "download initialised"
    );
    Ok(BusinessOutcome {
        static_header: ResponseStaticHeader {
            transaction_id: Some(transaction_id),
            num_segments: Some(num_segments),
        },
        segment_number: Some(SegmentNumber {
            last_segment: num_segments == 1,
            value: 1,
        }),
        order_id: None,
        data_transfer: Some(ResponseDataTransfer {
            data_encryption_info: Some(DataEncryptionInfo {
                authenticate: true,
                encryption_pub_key_digest: PubKeyDigest {
                    version: "E002".to_string(),
                    algorithm: Some(SHA256_URI.to_string()),
                    value: transport::b64_encode(&crypto::public_key_digest(&subscriber_enc)),
                },
                transaction_key: transport::b64_encode(&encrypted.transaction_key_enc),
            }),
            order_data: first_segment,
        }),
        notifications: Vec::new(),
    })
}

fn handle_upload_init(
    tables: &mut Tables,
    request: &EbicsRequest,
    details: &BusinessOrderDetails,
    host: &HostKeys,
    subscriber: &EbicsSubscriberRow,
    declared_segments: usize,
) -> Result<BusinessOutcome> {
    if declared_segments == 0 {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidRequest,
            "NumSegments must be positive",
        ));
    }
    let order_id = transport::order_id_from_counter(subscriber.next_order_id)?;
    tables.subscriber_mut(subscriber.id)?.next_order_id = subscriber.next_order_id + 1;

    let data_transfer = request.body.data_transfer.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing DataTransfer")
    })?;
    let encryption_info = data_transfer.data_encryption_info.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing DataEncryptionInfo")
    })?;
    let signature_data = data_transfer.signature_data.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing SignatureData")
    })?;

    let wrapped_key = transport::b64_decode(&encryption_info.transaction_key)?;
    let compressed = crypto::e002_decrypt(
        &host.encryption,
        &wrapped_key,
        &transport::b64_decode(signature_data)?,
    )?;
    let signature_xml = String::from_utf8(transport::inflate(&compressed)?).map_err(|e| {
        EbicsError::protocol(ReturnCode::InvalidXml, format!("UserSignatureData: {}", e))
    })?;
    let signatures: UserSignatureData = xml::parse(&signature_xml)?;
    if signatures.signatures.is_empty() {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidXml,
            "no order signatures supplied",
        ));
    }
    for entry in &signatures.signatures {
        let id = tables.alloc_order_signature_id();
        tables.order_signatures.insert(
            id,
            OrderSignatureRow {
                id,
                order_id: order_id.clone(),
                order_type: details.order_type.clone(),
                partner_id: entry.partner_id.clone(),
                user_id: entry.user_id.clone(),
                signature_version: entry.signature_version.clone(),
                signature_value: transport::b64_decode(&entry.signature_value)?,
            },
        );
    }

    let transaction_id = transport::new_transaction_id();
    tables.upload_transactions.insert(
        transaction_id.to_lowercase(),
        UploadTransactionRow {
            transaction_id: transaction_id.clone(),
            host_id: subscriber.host_id.clone(),
            subscriber_id: subscriber.id,
            order_type: details.order_type.clone(),
            order_id: order_id.clone(),
            num_segments: declared_segments,
            last_seen_segment: 0,
            transaction_key_enc: wrapped_key,
        },
    );
    info!(
        order_type = %details.order_type,
        order_id = %order_id,
        transaction_id = %transaction_id,
        declared_segments,
        "upload initialised"
    );
    Ok(BusinessOutcome {
        static_header: ResponseStaticHeader {
            transaction_id: Some(transaction_id),
            num_segments: None,
        },
        segment_number: None,
        order_id: Some(order_id),
        data_transfer: None,
        notifications: Vec::new(),
    })
}

fn handle_transfer(
    tables: &mut Tables,
    request: &EbicsRequest,
    host: &HostKeys,
    subscriber: &EbicsSubscriberRow,
    now_ms: i64,
) -> Result<BusinessOutcome> {
    let static_ = &request.header.static_;
    let transaction_id = static_.transaction_id.as_deref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing TransactionID")
    })?;
    let key = transaction_id.to_lowercase();
    let segment = request
        .header
        .mutable
        .segment_number
        .as_ref()
        .ok_or_else(|| {
            EbicsError::protocol(ReturnCode::InvalidRequest, "missing SegmentNumber")
        })?;

    if let Some(download) = tables.download_transactions.get(&key).cloned() {
        let data = transport::nth_segment(&download.encoded_response, segment.value)?.to_string();
        return Ok(BusinessOutcome {
            static_header: ResponseStaticHeader {
                transaction_id: Some(download.transaction_id.clone()),
                num_segments: Some(download.num_segments),
            },
            segment_number: Some(SegmentNumber {
                last_segment: segment.value == download.num_segments,
                value: segment.value,
            }),
            order_id: None,
            data_transfer: Some(ResponseDataTransfer {
                data_encryption_info: None,
                order_data: data,
            }),
            notifications: Vec::new(),
        });
    }

    let Some(upload) = tables.upload_transactions.get(&key).cloned() else {
        return Err(EbicsError::protocol(
            ReturnCode::InvalidUserOrState,
            "unknown transaction id",
        ));
    };
    if upload.num_segments != 1 || segment.value != 1 {
        return Err(EbicsError::protocol(
            ReturnCode::ProcessingError,
            "multi-segment uploads are not implemented",
        ));
    }
    let order_data = request
        .body
        .data_transfer
        .as_ref()
        .and_then(|dt| dt.order_data.as_ref())
        .ok_or_else(|| EbicsError::protocol(ReturnCode::InvalidRequest, "missing OrderData"))?;
    let ciphertext = transport::b64_decode(order_data)?;
    tables
        .upload_chunks
        .insert((key.clone(), segment.value), ciphertext.clone());

    let transaction_key = crypto::e002_unwrap_key(&host.encryption, &upload.transaction_key_enc)?;
    let payload = transport::inflate(&crypto::e002_decrypt_with_key(&transaction_key, &ciphertext)?)?;

    // Every stored A006 signature must verify over the assembled payload.
    let signature_key = keys::subscriber_public_key(&subscriber.signature_key)?;
    let order_signatures: Vec<OrderSignatureRow> = tables
        .order_signatures
        .values()
        .filter(|s| s.order_id == upload.order_id && s.order_type == upload.order_type)
        .cloned()
        .collect();
    if order_signatures.is_empty() {
        return Err(EbicsError::protocol(
            ReturnCode::AuthorisationFailed,
            "no signature on record for this order",
        ));
    }
    for entry in &order_signatures {
        crypto::verify_sha256(&signature_key, &payload, &entry.signature_value).map_err(|_| {
            EbicsError::protocol(ReturnCode::AuthorisationFailed, "order signature invalid")
        })?;
    }

    if let Some(row) = tables.upload_transactions.get_mut(&key) {
        row.last_seen_segment = segment.value;
    }

    let notifications = match upload.order_type.as_str() {
        "CCT" => orders::process_cct(tables, &payload, now_ms)?,
        other => {
            return Err(EbicsError::protocol(
                ReturnCode::UnsupportedOrderType,
                format!("upload order {}", other),
            ))
        }
    };
    Ok(BusinessOutcome {
        static_header: ResponseStaticHeader {
            transaction_id: Some(upload.transaction_id.clone()),
            num_segments: None,
        },
        segment_number: Some(SegmentNumber {
            last_segment: true,
            value: segment.value,
        }),
        order_id: None,
        data_transfer: None,
        notifications,
    })
}

fn handle_receipt(tables: &mut Tables, request: &EbicsRequest) -> Result<BusinessOutcome> {
    let static_ = &request.header.static_;
    let transaction_id = static_.transaction_id.as_deref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing TransactionID")
    })?;
    let key = transaction_id.to_lowercase();
    let Some(download) = tables.download_transactions.get_mut(&key) else {
        // Uploads have no receipt phase.
        return Err(EbicsError::protocol(
            ReturnCode::InvalidUserOrState,
            "receipt is only valid for downloads",
        ));
    };
    let receipt = request.body.transfer_receipt.as_ref().ok_or_else(|| {
        EbicsError::protocol(ReturnCode::InvalidRequest, "missing TransferReceipt")
    })?;
    download.receipt_received = receipt.receipt_code == 0;
    info!(
        transaction_id = %download.transaction_id,
        receipt_code = receipt.receipt_code,
        "receipt recorded"
    );
    Ok(BusinessOutcome {
        static_header: ResponseStaticHeader {
            transaction_id: Some(download.transaction_id.clone()),
            num_segments: None,
        },
        segment_number: None,
        order_id: None,
        data_transfer: None,
        notifications: Vec::new(),
    })
}
