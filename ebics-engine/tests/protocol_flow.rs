//! End-to-end protocol flows against the engine
//!
//! A miniature EBICS client lives in this file: it generates subscriber
//! key pairs, builds real envelopes (signed and encrypted the same way
//! a production client would) and drives the engine through key
//! initialisation, uploads and downloads.

use ebics_engine::crypto;
use ebics_engine::transport;
use ebics_engine::xml;
use ebics_engine::xml::envelope::*;
use ebics_engine::xml::order_data::*;
use ebics_engine::xml::pain001;
use ebics_engine::xml::signature;
use ebics_engine::EbicsEngine;
use ledger_core::config::DemobankConfig;
use ledger_core::ledger::balance;
use ledger_core::types::{BankAccountRow, Direction, SubscriberState};
use ledger_core::{Store, Tables};
use message_bus::NotificationBus;
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_decimal::Decimal;
use std::sync::Arc;

const HOST: &str = "SANDBOX";
const PARTNER: &str = "PARTNER1";
const USER: &str = "USER1";

struct TestClient {
    signature_key: RsaPrivateKey,
    encryption_key: RsaPrivateKey,
    authentication_key: RsaPrivateKey,
}

impl TestClient {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signature_key: RsaPrivateKey::new(&mut rng, 1024).unwrap(),
            encryption_key: RsaPrivateKey::new(&mut rng, 1024).unwrap(),
            authentication_key: RsaPrivateKey::new(&mut rng, 1024).unwrap(),
        }
    }

    fn key_value(key: &RsaPublicKey) -> PubKeyValue {
        let (modulus, exponent) = crypto::public_key_components(key);
        PubKeyValue {
            rsa_key_value: RsaKeyValue {
                modulus: transport::b64_encode(&modulus),
                exponent: transport::b64_encode(&exponent),
            },
            timestamp: None,
        }
    }

    fn packed_order_data<T: serde::Serialize>(root: &str, doc: &T) -> String {
        let xml_text = xml::render(root, doc).unwrap();
        transport::b64_encode(&transport::deflate(xml_text.as_bytes()).unwrap())
    }

    fn unsecured(&self, order_type: &str, order_data: String) -> String {
        let request = EbicsUnsecuredRequest {
            xmlns: Some(EBICS_NS.to_string()),
            version: Some("H004".to_string()),
            revision: Some("1".to_string()),
            header: UnsecuredHeader {
                authenticate: true,
                static_: UnsecuredStaticHeader {
                    host_id: HOST.to_string(),
                    partner_id: PARTNER.to_string(),
                    user_id: USER.to_string(),
                    system_id: None,
                    product: None,
                    order_details: OrderDetails {
                        order_type: order_type.to_string(),
                        order_attribute: "DZNNN".to_string(),
                    },
                    security_medium: "0000".to_string(),
                },
                mutable: Some(EmptyElement {}),
            },
            body: UnsecuredBody {
                data_transfer: UnsecuredDataTransfer { order_data },
            },
        };
        xml::render("ebicsUnsecuredRequest", &request).unwrap()
    }

    fn ini_request(&self) -> String {
        let doc = SignaturePubKeyOrderData {
            xmlns: Some(ORDER_DATA_NS.to_string()),
            signature_pub_key_info: SignaturePubKeyInfo {
                pub_key_value: Self::key_value(&self.signature_key.to_public_key()),
                signature_version: "A006".to_string(),
            },
            partner_id: PARTNER.to_string(),
            user_id: USER.to_string(),
        };
        self.unsecured("INI", Self::packed_order_data("SignaturePubKeyOrderData", &doc))
    }

    fn hia_request(&self) -> String {
        let doc = HiaRequestOrderData {
            xmlns: Some(ORDER_DATA_NS.to_string()),
            authentication_pub_key_info: AuthenticationPubKeyInfo {
                pub_key_value: Self::key_value(&self.authentication_key.to_public_key()),
                authentication_version: "X002".to_string(),
            },
            encryption_pub_key_info: EncryptionPubKeyInfo {
                pub_key_value: Self::key_value(&self.encryption_key.to_public_key()),
                encryption_version: "E002".to_string(),
            },
            partner_id: PARTNER.to_string(),
            user_id: USER.to_string(),
        };
        self.unsecured("HIA", Self::packed_order_data("HIARequestOrderData", &doc))
    }

    fn hpb_request(&self) -> String {
        let header = NpkdHeader {
            authenticate: true,
            static_: NpkdStaticHeader {
                host_id: HOST.to_string(),
                nonce: Some("0011223344556677".to_string()),
                timestamp: Some("2026-08-01T00:00:00Z".to_string()),
                partner_id: PARTNER.to_string(),
                user_id: USER.to_string(),
                system_id: None,
                product: None,
                order_details: OrderDetails {
                    order_type: "HPB".to_string(),
                    order_attribute: "DZHNN".to_string(),
                },
                security_medium: "0000".to_string(),
            },
            mutable: Some(EmptyElement {}),
        };
        let header_canonical = xml::element("header", &header).unwrap();
        let auth_signature =
            signature::sign_header(&header_canonical, &self.authentication_key).unwrap();
        let request = EbicsNpkdRequest {
            xmlns: Some(EBICS_NS.to_string()),
            version: Some("H004".to_string()),
            revision: Some("1".to_string()),
            header,
            auth_signature,
            body: EmptyElement {},
        };
        xml::render("ebicsNoPubKeyDigestsRequest", &request).unwrap()
    }

    fn signed_business(
        &self,
        static_: RequestStaticHeader,
        mutable: RequestMutableHeader,
        body: RequestBody,
        signing_key: &RsaPrivateKey,
    ) -> String {
        let header = RequestHeader {
            authenticate: true,
            static_,
            mutable,
        };
        let header_canonical = xml::element("header", &header).unwrap();
        let auth_signature = signature::sign_header(&header_canonical, signing_key).unwrap();
        let request = EbicsRequest {
            xmlns: Some(EBICS_NS.to_string()),
            version: Some("H004".to_string()),
            revision: Some("1".to_string()),
            header,
            auth_signature,
            body,
        };
        xml::render("ebicsRequest", &request).unwrap()
    }

    fn init_static(&self) -> RequestStaticHeader {
        RequestStaticHeader {
            host_id: HOST.to_string(),
            nonce: Some("00aa00aa00aa00aa".to_string()),
            timestamp: Some("2026-08-01T00:00:00Z".to_string()),
            partner_id: Some(PARTNER.to_string()),
            user_id: Some(USER.to_string()),
            system_id: None,
            product: None,
            order_details: None,
            bank_pub_key_digests: None,
            security_medium: Some("0000".to_string()),
            num_segments: None,
            transaction_id: None,
        }
    }

    fn download_init(&self, order_type: &str, date_range: Option<(&str, &str)>) -> String {
        let mut static_ = self.init_static();
        static_.order_details = Some(BusinessOrderDetails {
            order_type: order_type.to_string(),
            order_attribute: "DZHNN".to_string(),
            standard_order_params: Some(StandardOrderParams {
                date_range: date_range.map(|(start, end)| DateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                }),
            }),
        });
        self.signed_business(
            static_,
            RequestMutableHeader {
                transaction_phase: TransactionPhase::Initialisation,
                segment_number: None,
            },
            RequestBody::default(),
            &self.authentication_key,
        )
    }

    fn transfer_request(&self, transaction_id: &str, segment: usize, last: bool) -> String {
        let static_ = RequestStaticHeader {
            host_id: HOST.to_string(),
            transaction_id: Some(transaction_id.to_string()),
            ..empty_static()
        };
        self.signed_business(
            static_,
            RequestMutableHeader {
                transaction_phase: TransactionPhase::Transfer,
                segment_number: Some(SegmentNumber {
                    last_segment: last,
                    value: segment,
                }),
            },
            RequestBody::default(),
            &self.authentication_key,
        )
    }

    fn receipt_request(&self, transaction_id: &str, receipt_code: i32) -> String {
        let static_ = RequestStaticHeader {
            host_id: HOST.to_string(),
            transaction_id: Some(transaction_id.to_string()),
            ..empty_static()
        };
        self.signed_business(
            static_,
            RequestMutableHeader {
                transaction_phase: TransactionPhase::Receipt,
                segment_number: None,
            },
            RequestBody {
                data_transfer: None,
                transfer_receipt: Some(TransferReceipt {
                    authenticate: true,
                    receipt_code,
                }),
            },
            &self.authentication_key,
        )
    }

    fn upload_init_cct(
        &self,
        host_encryption: &RsaPublicKey,
        transaction_key: &[u8; 16],
        payload: &[u8],
    ) -> String {
        let order_signature = crypto::sign_sha256(&self.signature_key, payload);
        let signatures = UserSignatureData {
            xmlns: Some(SIGNATURE_NS.to_string()),
            signatures: vec![OrderSignatureData {
                signature_version: "A006".to_string(),
                signature_value: transport::b64_encode(&order_signature),
                partner_id: PARTNER.to_string(),
                user_id: USER.to_string(),
            }],
        };
        let signature_xml = xml::render("UserSignatureData", &signatures).unwrap();
        let packed = transport::deflate(signature_xml.as_bytes()).unwrap();
        let encrypted = crypto::e002_encrypt_with_key(transaction_key, &packed).unwrap();
        let wrapped = crypto::wrap_transaction_key(host_encryption, transaction_key).unwrap();

        let mut static_ = self.init_static();
        static_.order_details = Some(BusinessOrderDetails {
            order_type: "CCT".to_string(),
            order_attribute: "OZHNN".to_string(),
            standard_order_params: Some(StandardOrderParams { date_range: None }),
        });
        static_.num_segments = Some(1);
        self.signed_business(
            static_,
            RequestMutableHeader {
                transaction_phase: TransactionPhase::Initialisation,
                segment_number: None,
            },
            RequestBody {
                data_transfer: Some(RequestDataTransfer {
                    data_encryption_info: Some(DataEncryptionInfo {
                        authenticate: true,
                        encryption_pub_key_digest: PubKeyDigest {
                            version: "E002".to_string(),
                            algorithm: None,
                            value: transport::b64_encode(&crypto::public_key_digest(
                                host_encryption,
                            )),
                        },
                        transaction_key: transport::b64_encode(&wrapped),
                    }),
                    signature_data: Some(transport::b64_encode(&encrypted)),
                    order_data: None,
                }),
                transfer_receipt: None,
            },
            &self.authentication_key,
        )
    }

    fn upload_transfer(
        &self,
        transaction_id: &str,
        transaction_key: &[u8; 16],
        payload: &[u8],
    ) -> String {
        let packed = transport::deflate(payload).unwrap();
        let encrypted = crypto::e002_encrypt_with_key(transaction_key, &packed).unwrap();
        let static_ = RequestStaticHeader {
            host_id: HOST.to_string(),
            transaction_id: Some(transaction_id.to_string()),
            ..empty_static()
        };
        self.signed_business(
            static_,
            RequestMutableHeader {
                transaction_phase: TransactionPhase::Transfer,
                segment_number: Some(SegmentNumber {
                    last_segment: true,
                    value: 1,
                }),
            },
            RequestBody {
                data_transfer: Some(RequestDataTransfer {
                    data_encryption_info: None,
                    signature_data: None,
                    order_data: Some(transport::b64_encode(&encrypted)),
                }),
                transfer_receipt: None,
            },
            &self.authentication_key,
        )
    }

    /// Download a full order payload: init, every remaining segment,
    /// receipt. Returns the decrypted, inflated payload bytes.
    fn download(&self, engine: &EbicsEngine, order_type: &str) -> Vec<u8> {
        let response: EbicsResponse =
            xml::parse(&engine.handle_request(&self.download_init(order_type, None)).unwrap())
                .unwrap();
        assert_eq!(response.header.mutable.return_code, "000000");
        let transaction_id = response.header.static_.transaction_id.clone().unwrap();
        let num_segments = response.header.static_.num_segments.unwrap();
        let data = response.body.data_transfer.unwrap();
        let wrapped =
            transport::b64_decode(&data.data_encryption_info.unwrap().transaction_key).unwrap();
        let mut encoded = data.order_data;
        for segment in 2..=num_segments {
            let reply: EbicsResponse = xml::parse(
                &engine
                    .handle_request(&self.transfer_request(
                        &transaction_id,
                        segment,
                        segment == num_segments,
                    ))
                    .unwrap(),
            )
            .unwrap();
            assert_eq!(reply.header.mutable.return_code, "000000");
            encoded.push_str(&reply.body.data_transfer.unwrap().order_data);
        }
        let receipt: EbicsResponse = xml::parse(
            &engine
                .handle_request(&self.receipt_request(&transaction_id, 0))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(receipt.header.mutable.return_code, "000000");

        let ciphertext = transport::b64_decode(&encoded).unwrap();
        let packed = crypto::e002_decrypt(&self.encryption_key, &wrapped, &ciphertext).unwrap();
        transport::inflate(&packed).unwrap()
    }
}

fn empty_static() -> RequestStaticHeader {
    RequestStaticHeader {
        host_id: String::new(),
        nonce: None,
        timestamp: None,
        partner_id: None,
        user_id: None,
        system_id: None,
        product: None,
        order_details: None,
        bank_pub_key_digests: None,
        security_medium: None,
        num_segments: None,
        transaction_id: None,
    }
}

fn seed_bank(tables: &mut Tables) {
    tables
        .demobanks
        .insert("default".into(), DemobankConfig::default());
    for (label, iban) in [("alice", "DE00"), ("bob", "DE01")] {
        tables.accounts.insert(
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
}

fn setup() -> (EbicsEngine, Arc<Store>, TestClient) {
    let store = Arc::new(Store::new());
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            seed_bank(tables);
            Ok(())
        })
        .unwrap();
    let engine = EbicsEngine::new(store.clone(), Arc::new(NotificationBus::new()));
    engine.create_host(HOST).unwrap();
    engine
        .create_subscriber(HOST, PARTNER, USER, None, Some("alice"))
        .unwrap();
    (engine, store, TestClient::new())
}

fn initialize(engine: &EbicsEngine, client: &TestClient) {
    let ini: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.ini_request()).unwrap()).unwrap();
    assert_eq!(ini.header.mutable.return_code, "000000");
    let hia: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.hia_request()).unwrap()).unwrap();
    assert_eq!(hia.header.mutable.return_code, "000000");
}

fn subscriber_state(store: &Store) -> SubscriberState {
    store.read(|tables| {
        tables
            .subscriber_by_ids(HOST, PARTNER, USER, None)
            .unwrap()
            .state
    })
}

fn cct_payload(pmt_inf_id: &str, amount: &str) -> Vec<u8> {
    let doc = pain001::build_single_transfer(
        "MSG-1",
        pmt_inf_id,
        "alice",
        "DE00",
        "SANDBOXX",
        "bob",
        "DE01",
        Some("SANDBOXX"),
        amount,
        "EUR",
        "test",
    );
    xml::render("Document", &doc).unwrap().into_bytes()
}

#[test]
fn test_key_initialisation_walk() {
    let (engine, store, client) = setup();

    assert_eq!(subscriber_state(&store), SubscriberState::New);
    let ini: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.ini_request()).unwrap()).unwrap();
    assert_eq!(ini.header.mutable.return_code, "000000");
    assert_eq!(subscriber_state(&store), SubscriberState::PartiallyIni);

    let hia: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.hia_request()).unwrap()).unwrap();
    assert_eq!(hia.header.mutable.return_code, "000000");
    assert_eq!(subscriber_state(&store), SubscriberState::Initialized);

    // HPB hands back the host keys, E002-encrypted for the subscriber.
    let hpb: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.hpb_request()).unwrap()).unwrap();
    assert_eq!(hpb.header.mutable.return_code, "000000");
    assert_eq!(hpb.header.mutable.order_id.as_deref(), Some("OR01"));
    let transfer = hpb.body.data_transfer.unwrap();
    let wrapped =
        transport::b64_decode(&transfer.data_encryption_info.transaction_key).unwrap();
    let ciphertext = transport::b64_decode(&transfer.order_data).unwrap();
    let packed = crypto::e002_decrypt(&client.encryption_key, &wrapped, &ciphertext).unwrap();
    let order_data = String::from_utf8(transport::inflate(&packed).unwrap()).unwrap();
    let doc: HpbResponseOrderData = xml::parse(&order_data).unwrap();

    let (expected_auth, expected_enc) = engine.host_public_keys(HOST).unwrap();
    let got_auth = crypto::public_key_from_components(
        &transport::b64_decode(&doc.authentication_pub_key_info.pub_key_value.rsa_key_value.modulus)
            .unwrap(),
        &transport::b64_decode(
            &doc.authentication_pub_key_info.pub_key_value.rsa_key_value.exponent,
        )
        .unwrap(),
    )
    .unwrap();
    let got_enc = crypto::public_key_from_components(
        &transport::b64_decode(&doc.encryption_pub_key_info.pub_key_value.rsa_key_value.modulus)
            .unwrap(),
        &transport::b64_decode(&doc.encryption_pub_key_info.pub_key_value.rsa_key_value.exponent)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(got_auth, expected_auth);
    assert_eq!(got_enc, expected_enc);
}

#[test]
fn test_second_ini_is_rejected() {
    let (engine, _store, client) = setup();
    initialize(&engine, &client);
    let repeat: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.ini_request()).unwrap()).unwrap();
    assert_eq!(repeat.header.mutable.return_code, "091002");
}

#[test]
fn test_hpb_before_initialized_is_rejected() {
    let (engine, _store, client) = setup();
    let response: EbicsKeyManagementResponse =
        xml::parse(&engine.handle_request(&client.hpb_request()).unwrap()).unwrap();
    assert_eq!(response.header.mutable.return_code, "091002");
}

#[test]
fn test_business_order_before_initialized_is_rejected() {
    let (engine, _store, client) = setup();
    let response: EbicsResponse =
        xml::parse(&engine.handle_request(&client.download_init("HTD", None)).unwrap()).unwrap();
    assert_eq!(response.header.mutable.return_code, "091002");
}

#[test]
fn test_transfer_with_unknown_transaction_is_rejected() {
    let (engine, _store, client) = setup();
    initialize(&engine, &client);
    let response: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.transfer_request("00DEAD00BEEF00DEAD00BEEF00DEAD00", 1, true))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(response.header.mutable.return_code, "091002");
}

#[test]
fn test_tampered_envelope_signature_is_rejected() {
    let (engine, _store, client) = setup();
    initialize(&engine, &client);
    // Sign with a key that is not the stored authentication key.
    let intruder = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let mut static_ = client.init_static();
    static_.order_details = Some(BusinessOrderDetails {
        order_type: "HTD".to_string(),
        order_attribute: "DZHNN".to_string(),
        standard_order_params: None,
    });
    let request = client.signed_business(
        static_,
        RequestMutableHeader {
            transaction_phase: TransactionPhase::Initialisation,
            segment_number: None,
        },
        RequestBody::default(),
        &intruder,
    );
    let response: EbicsResponse = xml::parse(&engine.handle_request(&request).unwrap()).unwrap();
    assert_eq!(response.header.mutable.return_code, "091302");
}

#[test]
fn test_cct_upload_books_double_entry() {
    let (engine, store, client) = setup();
    initialize(&engine, &client);
    let (_, host_enc) = engine.host_public_keys(HOST).unwrap();

    let payload = cct_payload("PMT-1", "10.50");
    let transaction_key = crypto::generate_transaction_key();
    let init: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.upload_init_cct(&host_enc, &transaction_key, &payload))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(init.header.mutable.return_code, "000000");
    assert_eq!(init.header.mutable.order_id.as_deref(), Some("A000"));
    let transaction_id = init.header.static_.transaction_id.unwrap();

    let transfer: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.upload_transfer(&transaction_id, &transaction_key, &payload))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(transfer.header.mutable.return_code, "000000");

    store.read(|tables| {
        let rows: Vec<_> = tables.transactions.values().collect();
        assert_eq!(rows.len(), 2);
        let debit = rows.iter().find(|r| r.direction == Direction::Dbit).unwrap();
        let credit = rows.iter().find(|r| r.direction == Direction::Crdt).unwrap();
        assert_eq!(debit.account_label, "alice");
        assert_eq!(credit.account_label, "bob");
        assert_eq!(debit.amount, Decimal::new(1050, 2));
        assert_eq!(debit.currency, "EUR");
        assert_eq!(debit.subject, "test");
        assert_eq!(debit.account_servicer_ref, credit.account_servicer_ref);
        assert_eq!(balance(tables, "alice", true).unwrap(), Decimal::new(-1050, 2));
        assert_eq!(balance(tables, "bob", true).unwrap(), Decimal::new(1050, 2));
    });

    // A second upload of the same PmtInfId books nothing new.
    let transaction_key = crypto::generate_transaction_key();
    let init: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.upload_init_cct(&host_enc, &transaction_key, &payload))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(init.header.mutable.order_id.as_deref(), Some("A001"));
    let transaction_id = init.header.static_.transaction_id.unwrap();
    let transfer: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.upload_transfer(&transaction_id, &transaction_key, &payload))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(transfer.header.mutable.return_code, "000000");
    assert_eq!(store.read(|tables| tables.transactions.len()), 2);
}

#[test]
fn test_receipt_for_upload_is_rejected() {
    let (engine, _store, client) = setup();
    initialize(&engine, &client);
    let (_, host_enc) = engine.host_public_keys(HOST).unwrap();
    let payload = cct_payload("PMT-9", "1");
    let transaction_key = crypto::generate_transaction_key();
    let init: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.upload_init_cct(&host_enc, &transaction_key, &payload))
            .unwrap(),
    )
    .unwrap();
    let transaction_id = init.header.static_.transaction_id.unwrap();

    let receipt: EbicsResponse = xml::parse(
        &engine
            .handle_request(&client.receipt_request(&transaction_id, 0))
            .unwrap(),
    )
    .unwrap();
    assert_eq!(receipt.header.mutable.return_code, "091002");
}

#[test]
fn test_c53_empty_then_statement_flow() {
    let (engine, store, client) = setup();
    initialize(&engine, &client);

    // No statements yet: C53 answers 090005.
    let response: EbicsResponse =
        xml::parse(&engine.handle_request(&client.download_init("C53", None)).unwrap()).unwrap();
    assert_eq!(response.header.mutable.return_code, "090005");

    // Post 5.00 CRDT then 2.50 DBIT for alice, then materialize.
    store
        .transact::<_, ledger_core::Error, _>(|tables| {
            use ledger_core::ledger::{post_transfer, PostingRequest};
            use ledger_core::types::CurrencyAmount;
            post_transfer(
                tables,
                &PostingRequest {
                    demobank: "default".into(),
                    debit_account: "bob".into(),
                    credit_account: "alice".into(),
                    subject: "first".into(),
                    amount: CurrencyAmount::new("EUR", "5.00".parse().unwrap()),
                    pmt_inf_id: None,
                    end_to_end_id: None,
                },
                1_000,
            )?;
            post_transfer(
                tables,
                &PostingRequest {
                    demobank: "default".into(),
                    debit_account: "alice".into(),
                    credit_account: "bob".into(),
                    subject: "second".into(),
                    amount: CurrencyAmount::new("EUR", "2.50".parse().unwrap()),
                    pmt_inf_id: None,
                    end_to_end_id: None,
                },
                2_000,
            )?;
            Ok(())
        })
        .unwrap();
    let statement = engine.materialize_statement("alice").unwrap();
    assert_eq!(statement.balance_clbd, Decimal::new(250, 2));

    // C53 without a range returns the latest statement.
    let payload = client.download(&engine, "C53");
    let document = String::from_utf8(payload).unwrap();
    assert!(document.contains("BkToCstmrStmt"));
    assert!(document.contains("<Cd>PRCD</Cd>"));
    assert!(document.contains("<Cd>CLBD</Cd>"));
    assert!(document.contains(">2.50<"));
    assert_eq!(document.matches("<Ntry>").count(), 2);

    // Receipt flag was recorded on the download transaction.
    let receipt_seen = store.read(|tables| {
        tables
            .download_transactions
            .values()
            .any(|d| d.order_type == "C53" && d.receipt_received)
    });
    assert!(receipt_seen);
}

#[test]
fn test_htd_download_roundtrip() {
    let (engine, _store, client) = setup();
    initialize(&engine, &client);
    let payload = client.download(&engine, "HTD");
    let document: HtdResponseOrderData =
        xml::parse(&String::from_utf8(payload).unwrap()).unwrap();
    assert_eq!(document.partner_info.account_info.len(), 1);
    assert_eq!(document.partner_info.account_info[0].account_number.value, "DE00");
    assert_eq!(document.user_info.user_id.value, USER);
}
