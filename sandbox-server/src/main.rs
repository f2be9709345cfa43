//! Sandbox bank server binary
//!
//! Wires the shared store and notification bus into the EBICS engine,
//! the Circuit cash-out API and the conversion monitor, and exposes
//! them over HTTP. All business logic lives in the library crates; this
//! file is routing, auth extraction and error-to-wire conversion.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cashout_service::api::{
    AccountCreateRequest, AccountPatchRequest, CashoutConfirmRequest, CashoutCreateRequest,
    EstimateRequest,
};
use cashout_service::{
    ApiError, CircuitApi, ConversionConfig, ConversionMonitor, MonitorConfig, NexusClient,
    TanSender,
};
use ebics_engine::{EbicsEngine, EbicsError};
use ledger_core::config::DemobankConfig;
use ledger_core::types::BankAccountRow;
use ledger_core::{Store, ADMIN_ACCOUNT};
use message_bus::NotificationBus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Everything the server reads from the environment.
#[derive(Debug, Clone)]
struct ServerConfig {
    port: u16,
    host_id: String,
    demobank: String,
    auth_enabled: bool,
    email_tan_command: Option<String>,
    sms_tan_command: Option<String>,
    tan_file: PathBuf,
    nexus_base_url: Option<String>,
    nexus_username: String,
    nexus_password: String,
    nexus_account: String,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            port: std::env::var("SERVICE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5016),
            host_id: std::env::var("EBICS_HOST_ID").unwrap_or_else(|_| "SANDBOX".to_string()),
            demobank: std::env::var("SANDBOX_DEMOBANK").unwrap_or_else(|_| "default".to_string()),
            auth_enabled: std::env::var("SANDBOX_AUTH_DISABLED").is_err(),
            email_tan_command: std::env::var("EMAIL_TAN_CMD").ok(),
            sms_tan_command: std::env::var("SMS_TAN_CMD").ok(),
            tan_file: PathBuf::from(cashout_service::tan::DEFAULT_TAN_FILE),
            nexus_base_url: std::env::var("NEXUS_BASE_URL").ok(),
            nexus_username: std::env::var("NEXUS_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            nexus_password: std::env::var("NEXUS_PASSWORD").unwrap_or_default(),
            nexus_account: std::env::var("NEXUS_ACCOUNT").unwrap_or_else(|_| "admin".to_string()),
        }
    }
}

struct AppState {
    engine: EbicsEngine,
    circuit: CircuitApi,
    auth_enabled: bool,
}

/// Basic-auth username extraction. Password checking is delegated to
/// the (external) auth layer; the sandbox only needs the identity.
fn basic_auth_username(request: &HttpRequest) -> Option<String> {
    let header = request.headers().get("Authorization")?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    if username.is_empty() {
        None
    } else {
        Some(username.to_string())
    }
}

fn require_username(state: &AppState, request: &HttpRequest) -> Result<String, HttpResponse> {
    if !state.auth_enabled {
        return Err(HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({"error": {"kind": "auth-disabled"}})));
    }
    basic_auth_username(request).ok_or_else(|| {
        HttpResponse::Unauthorized().json(serde_json::json!({"error": {"kind": "unauthorized"}}))
    })
}

fn api_error_response(err: ApiError) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(err.status)
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    // 5xx details stay in the logs, not on the wire.
    let message = if err.status >= 500 {
        error!(kind = err.kind, message = %err.message, "internal error");
        String::new()
    } else {
        err.message.clone()
    };
    HttpResponse::build(status)
        .json(serde_json::json!({"error": {"kind": err.kind, "message": message}}))
}

async fn ebics_endpoint(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let Ok(body) = std::str::from_utf8(&body) else {
        return HttpResponse::BadRequest().body("envelope is not UTF-8");
    };
    match state.engine.handle_request(body) {
        Ok(document) => HttpResponse::Ok()
            .content_type("application/xml")
            .body(document),
        Err(EbicsError::UnknownHost(host)) => {
            HttpResponse::BadRequest().body(format!("unknown EBICS host {}", host))
        }
        Err(EbicsError::BadEnvelope(reason)) => {
            HttpResponse::BadRequest().body(format!("invalid EBICS envelope: {}", reason))
        }
        Err(e) => {
            error!(error = %e, "EBICS handler failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn create_account(
    state: web::Data<AppState>,
    payload: web::Json<AccountCreateRequest>,
) -> impl Responder {
    match state.circuit.create_account(&payload) {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(e) => api_error_response(e),
    }
}

async fn get_account(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.circuit.get_account(&path) {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(e) => api_error_response(e),
    }
}

async fn patch_account(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AccountPatchRequest>,
) -> impl Responder {
    match state.circuit.update_account(&path, &payload) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => api_error_response(e),
    }
}

async fn delete_account(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.circuit.delete_account(&path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => api_error_response(e),
    }
}

async fn create_cashout(
    state: web::Data<AppState>,
    request: HttpRequest,
    payload: web::Json<CashoutCreateRequest>,
) -> impl Responder {
    let username = match require_username(&state, &request) {
        Ok(username) => username,
        Err(response) => return response,
    };
    match state.circuit.create_cashout(&username, &payload).await {
        Ok(created) => HttpResponse::Accepted().json(created),
        Err(e) => api_error_response(e),
    }
}

async fn confirm_cashout(
    state: web::Data<AppState>,
    request: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<CashoutConfirmRequest>,
) -> impl Responder {
    let username = match require_username(&state, &request) {
        Ok(username) => username,
        Err(response) => return response,
    };
    match state.circuit.confirm_cashout(&username, *path, &payload) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => api_error_response(e),
    }
}

async fn abort_cashout(
    state: web::Data<AppState>,
    request: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let username = match require_username(&state, &request) {
        Ok(username) => username,
        Err(response) => return response,
    };
    match state.circuit.abort_cashout(&username, *path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => api_error_response(e),
    }
}

async fn get_cashout(
    state: web::Data<AppState>,
    request: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let username = match require_username(&state, &request) {
        Ok(username) => username,
        Err(response) => return response,
    };
    match state.circuit.get_cashout(&username, *path) {
        Ok(detail) => HttpResponse::Ok().json(detail),
        Err(e) => api_error_response(e),
    }
}

async fn list_cashouts(state: web::Data<AppState>, request: HttpRequest) -> impl Responder {
    let username = match require_username(&state, &request) {
        Ok(username) => username,
        Err(response) => return response,
    };
    HttpResponse::Ok().json(state.circuit.list_cashouts(Some(&username)))
}

async fn estimate(
    state: web::Data<AppState>,
    payload: web::Json<EstimateRequest>,
) -> impl Responder {
    match state.circuit.estimate(&payload) {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => api_error_response(e),
    }
}

async fn get_config(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.circuit.config())
}

/// Operator endpoint: close the current period of one account into a
/// persisted camt.053 statement.
async fn materialize_statement(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match state.engine.materialize_statement(&path) {
        Ok(statement) => HttpResponse::Ok().json(serde_json::json!({
            "statement_id": statement.statement_id,
            "balance_clbd": statement.balance_clbd.to_string(),
        })),
        Err(e) => {
            error!(error = %e, "statement materialization failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Demobank, admin account and EBICS host must exist before traffic.
fn provision(store: &Arc<Store>, engine: &EbicsEngine, config: &ServerConfig) -> anyhow::Result<()> {
    store.transact::<_, ledger_core::Error, _>(|tables| {
        if !tables.demobanks.contains_key(&config.demobank) {
            let mut demobank = DemobankConfig::default();
            demobank.name = config.demobank.clone();
            tables.demobanks.insert(config.demobank.clone(), demobank);
        }
        if !tables.accounts.contains_key(ADMIN_ACCOUNT) {
            tables.accounts.insert(
                ADMIN_ACCOUNT.to_string(),
                BankAccountRow {
                    label: ADMIN_ACCOUNT.to_string(),
                    iban: "DE9800000000000000".to_string(),
                    bic: "SANDBOXX".to_string(),
                    owner: ADMIN_ACCOUNT.to_string(),
                    demobank: config.demobank.clone(),
                    last_transaction: None,
                    last_fiat_submission: None,
                },
            );
        }
        Ok(())
    })?;
    if engine.host_public_keys(&config.host_id).is_err() {
        engine.create_host(&config.host_id)?;
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(port = config.port, host_id = %config.host_id, "sandbox server starting");

    let store = Arc::new(Store::new());
    let bus = Arc::new(NotificationBus::new());
    let engine = EbicsEngine::new(store.clone(), bus.clone());
    provision(&store, &engine, &config)?;

    let tan_sender = TanSender::new(
        config.email_tan_command.clone(),
        config.sms_tan_command.clone(),
        config.tan_file.clone(),
    );
    let conversion = ConversionConfig::default();
    let circuit = CircuitApi::new(
        store.clone(),
        bus.clone(),
        tan_sender,
        conversion.clone(),
        config.demobank.clone(),
    );

    // The conversion monitor runs on its own task so the 30 s LISTEN
    // wait never blocks an HTTP worker.
    if let Some(base_url) = &config.nexus_base_url {
        let connector = Arc::new(NexusClient::new(
            base_url.clone(),
            config.nexus_username.clone(),
            config.nexus_password.clone(),
            config.nexus_account.clone(),
        ));
        let monitor = ConversionMonitor::new(
            store.clone(),
            bus.clone(),
            connector,
            conversion,
            MonitorConfig::default(),
        );
        tokio::spawn(monitor.run());
        info!(nexus = %base_url, "conversion monitor spawned");
    } else {
        info!("no NEXUS_BASE_URL configured, conversion monitor disabled");
    }

    let state = web::Data::new(AppState {
        engine,
        circuit,
        auth_enabled: config.auth_enabled,
    });
    let bind_address = format!("0.0.0.0:{}", config.port);
    info!(%bind_address, "listening");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/ebicsweb", web::post().to(ebics_endpoint))
            .route("/accounts", web::post().to(create_account))
            .route("/accounts/{name}", web::get().to(get_account))
            .route("/accounts/{name}", web::patch().to(patch_account))
            .route("/accounts/{name}", web::delete().to(delete_account))
            .route(
                "/accounts/{name}/statements",
                web::post().to(materialize_statement),
            )
            .route("/cashouts", web::post().to(create_cashout))
            .route("/cashouts", web::get().to(list_cashouts))
            .route("/cashouts/estimates", web::post().to(estimate))
            .route("/cashouts/{uuid}", web::get().to(get_cashout))
            .route("/cashouts/{uuid}/confirm", web::post().to(confirm_cashout))
            .route("/cashouts/{uuid}/abort", web::post().to(abort_cashout))
            .route("/config", web::get().to(get_config))
    })
    .bind(&bind_address)?
    .run()
    .await?;
    Ok(())
}
