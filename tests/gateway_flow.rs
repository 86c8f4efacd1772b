use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use paybridge::audit::{AuditStore, MemoryAuditStore};
use paybridge::callback::CallbackVerifier;
use paybridge::envelope;
use paybridge::instrument::{Instrument, InstrumentProfile, InstrumentRegistry};
use paybridge::pipeline::{TransactionPipeline, TxnIdGenerator};
use paybridge::server::{self, AppState};
use paybridge::signing::SigningContext;
use paybridge::transport::{GatewayTransport, TransportConfig};

const SECRET: &str = "flow-test-secret";
const KEY_VERSION: &str = "1";

/// In-process stand-in for the provider gateway. Counts every attempt and
/// can be told to serve outages or a fixed business rejection first, so
/// the retry and classification paths are exercised over real HTTP.
struct GatewayFixture {
    signing: SigningContext,
    /// 503s to serve before the first real answer.
    outages: AtomicU32,
    /// `(status, code, message)` rejection served instead of success.
    rejection: Option<(u16, &'static str, &'static str)>,
    attempts: AtomicU32,
}

impl GatewayFixture {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            signing: SigningContext::new(SECRET, KEY_VERSION),
            outages: AtomicU32::new(0),
            rejection: None,
            attempts: AtomicU32::new(0),
        })
    }

    fn with_outages(n: u32) -> Arc<Self> {
        Arc::new(Self {
            signing: SigningContext::new(SECRET, KEY_VERSION),
            outages: AtomicU32::new(n),
            rejection: None,
            attempts: AtomicU32::new(0),
        })
    }

    fn with_rejection(status: u16, code: &'static str, message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            signing: SigningContext::new(SECRET, KEY_VERSION),
            outages: AtomicU32::new(0),
            rejection: Some((status, code, message)),
            attempts: AtomicU32::new(0),
        })
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn take_outage(&self) -> bool {
        self.outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn verified(&self, headers: &HeaderMap, message: &str) -> bool {
        headers
            .get("X-VERIFY")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|sig| self.signing.verify(message, sig))
    }
}

fn gateway_ok(data: Value) -> Response {
    Json(json!({
        "success": true,
        "code": "SUCCESS",
        "message": "ok",
        "data": data
    }))
    .into_response()
}

fn gateway_fault(status: u16, code: &str, message: &str) -> Response {
    (
        StatusCode::from_u16(status).unwrap(),
        Json(json!({"success": false, "code": code, "message": message})),
    )
        .into_response()
}

async fn gateway_init(
    State(fixture): State<Arc<GatewayFixture>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    fixture.attempts.fetch_add(1, Ordering::SeqCst);
    if fixture.take_outage() {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance window").into_response();
    }
    if let Some((status, code, message)) = fixture.rejection {
        return gateway_fault(status, code, message);
    }

    let envelope: Value = serde_json::from_str(&body).unwrap();
    let b64 = envelope["request"].as_str().unwrap();
    if !fixture.verified(&headers, &format!("{b64}/v3/qr/dynamic/init")) {
        return gateway_fault(401, "UNAUTHORIZED", "signature mismatch");
    }
    if headers.get("X-PROVIDER-ID").is_none() || headers.get("X-CALLBACK-URL").is_none() {
        return gateway_fault(400, "BAD_REQUEST", "missing identity headers");
    }

    let wire: Value = serde_json::from_slice(&BASE64.decode(b64).unwrap()).unwrap();
    gateway_ok(json!({
        "transactionId": wire["transactionId"],
        "providerReferenceId": "AX-20260822-000042",
        "amount": wire["amount"],
        "qrString": "00020126580014example.payaxis0136test-qr-payload"
    }))
}

async fn gateway_refund(
    State(fixture): State<Arc<GatewayFixture>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    fixture.attempts.fetch_add(1, Ordering::SeqCst);
    if let Some((status, code, message)) = fixture.rejection {
        return gateway_fault(status, code, message);
    }

    let envelope: Value = serde_json::from_str(&body).unwrap();
    let b64 = envelope["request"].as_str().unwrap();
    if !fixture.verified(&headers, &format!("{b64}/v3/credit/refund")) {
        return gateway_fault(401, "UNAUTHORIZED", "signature mismatch");
    }

    let wire: Value = serde_json::from_slice(&BASE64.decode(b64).unwrap()).unwrap();
    if wire.get("originalTransactionId").is_none() {
        return gateway_fault(400, "BAD_REQUEST", "missing original transaction id");
    }
    gateway_ok(json!({
        "transactionId": wire["transactionId"],
        "amount": wire["amount"],
        "paymentState": "REFUNDED",
        "responseCode": "SUCCESS"
    }))
}

async fn gateway_cancel(
    State(fixture): State<Arc<GatewayFixture>>,
    Path((merchant_id, txn_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    fixture.attempts.fetch_add(1, Ordering::SeqCst);
    if let Some((status, code, message)) = fixture.rejection {
        return gateway_fault(status, code, message);
    }

    let path = format!("/v3/transaction/{merchant_id}/{txn_id}/cancel");
    if !fixture.verified(&headers, &path) {
        return gateway_fault(401, "UNAUTHORIZED", "signature mismatch");
    }
    gateway_ok(json!({
        "transactionId": txn_id,
        "merchantId": merchant_id,
        "paymentState": "CANCELLED",
        "responseCode": "SUCCESS"
    }))
}

async fn gateway_status(
    State(fixture): State<Arc<GatewayFixture>>,
    Path((merchant_id, txn_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    fixture.attempts.fetch_add(1, Ordering::SeqCst);
    if fixture.take_outage() {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance window").into_response();
    }
    if let Some((status, code, message)) = fixture.rejection {
        return gateway_fault(status, code, message);
    }

    let path = format!("/v3/transaction/{merchant_id}/{txn_id}/status");
    if !fixture.verified(&headers, &path) {
        return gateway_fault(401, "UNAUTHORIZED", "signature mismatch");
    }
    gateway_ok(json!({
        "transactionId": txn_id,
        "merchantId": merchant_id,
        "amount": 19900,
        "paymentState": "COMPLETED",
        "responseCode": "SUCCESS",
        "paymentModes": [{"mode": "CARD", "amount": 19900}]
    }))
}

async fn spawn_gateway(fixture: Arc<GatewayFixture>) -> String {
    let app = axum::Router::new()
        .route("/v3/qr/dynamic/init", post(gateway_init))
        .route("/v3/credit/refund", post(gateway_refund))
        .route(
            "/v3/transaction/{merchant_id}/{txn_id}/cancel",
            post(gateway_cancel),
        )
        .route(
            "/v3/transaction/{merchant_id}/{txn_id}/status",
            get(gateway_status),
        )
        .with_state(fixture);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_registry() -> Arc<InstrumentRegistry> {
    Arc::new(InstrumentRegistry::new(Instrument::ALL.map(|kind| {
        InstrumentProfile {
            kind,
            signing: SigningContext::new(SECRET, KEY_VERSION),
            provider_id: format!("PAYAXIS-TEST-{}", kind.as_str().to_uppercase()),
            callback_url: format!("https://merchant.example/api/v1/callback/{kind}"),
        }
    })))
}

/// Serve the bridge against the given gateway origin; backoff is shrunk so
/// retry tests finish in milliseconds. Returns the bridge origin and a
/// handle on its audit store.
async fn spawn_bridge(gateway_url: &str) -> (String, Arc<MemoryAuditStore>) {
    let config = TransportConfig {
        base_url: gateway_url.to_string(),
        connect_timeout_secs: 5,
        read_timeout_secs: 5,
        request_timeout_secs: 5,
        max_attempts: 3,
        backoff_base_ms: 5,
        backoff_cap_ms: 50,
        pool_max_idle: 4,
        pool_idle_timeout_secs: 30,
    };
    let transport = Arc::new(GatewayTransport::new(&config).unwrap());
    let registry = test_registry();
    let audit = Arc::new(MemoryAuditStore::new());
    let pipeline = Arc::new(TransactionPipeline::new(
        registry.clone(),
        transport,
        audit.clone() as Arc<dyn AuditStore>,
        TxnIdGenerator::default(),
        3,
    ));
    let callbacks = Arc::new(CallbackVerifier::new(
        registry.clone(),
        audit.clone() as Arc<dyn AuditStore>,
    ));
    let state = Arc::new(AppState {
        pipeline,
        callbacks,
        registry,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, server::router(state)).await.unwrap();
    });
    (format!("http://{addr}"), audit)
}

fn init_body(amount: &str) -> Value {
    json!({
        "merchant_id": "M-100",
        "order_id": "ORD-2026-1",
        "amount": amount,
        "message": "table 4",
        "expires_in": 300
    })
}

#[tokio::test]
async fn init_round_trip_produces_a_qr_payload() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture.clone()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{bridge}/api/v1/pay/dqr/init"))
        .json(&init_body("120.50"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let raw = resp.text().await.unwrap();
    // The locally drawn id is the only transaction_id key in the body.
    assert_eq!(raw.matches("\"transaction_id\"").count(), 1);

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["code"], "SUCCESS");

    let data = &body["data"];
    let txn_id = data["transaction_id"].as_str().unwrap();
    assert!(txn_id.starts_with("DQR"), "unexpected id {txn_id}");
    // Amount went out in minor units and came back lifted to major.
    assert_eq!(data["amount"], "120.50");
    assert!(data["qr_string"].as_str().unwrap().contains("payaxis"));
    assert_eq!(fixture.attempts(), 1);
}

#[tokio::test]
async fn transient_gateway_outage_is_retried_to_success() {
    let fixture = GatewayFixture::with_outages(2);
    let gateway = spawn_gateway(fixture.clone()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{bridge}/api/v1/pay/dqr/init"))
        .json(&init_body("75.00"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(fixture.attempts(), 3, "two outages then one success");
}

#[tokio::test]
async fn duplicate_rejection_passes_through_without_retry() {
    let fixture = GatewayFixture::with_rejection(400, "DUPLICATE_TXN", "already processed");
    let gateway = spawn_gateway(fixture.clone()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{bridge}/api/v1/pay/dqr/init"))
        .json(&init_body("10.00"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "DUPLICATE_TXN");
    assert_eq!(fixture.attempts(), 1, "4xx must not be replayed");
}

#[tokio::test]
async fn unknown_transaction_status_maps_to_not_found() {
    let fixture = GatewayFixture::with_rejection(404, "TRANSACTION_NOT_FOUND", "no such txn");
    let gateway = spawn_gateway(fixture.clone()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{bridge}/api/v1/pay/dqr/status/M-100/DQRMISSING"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "TXN_NOT_FOUND");
    assert_eq!(fixture.attempts(), 1);
}

#[tokio::test]
async fn cancel_is_authorized_by_a_bare_path_signature() {
    let gateway = spawn_gateway(GatewayFixture::new()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    // The fixture rejects any signature not computed over the bare
    // resource path, so a 200 here proves the signing scheme.
    let resp = client
        .post(format!("{bridge}/api/v1/pay/dqr/cancel"))
        .json(&json!({"merchant_id": "M-100", "transaction_id": "DQRCXL1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["payment_state"], "CANCELLED");
}

#[tokio::test]
async fn status_lifts_gateway_amounts_to_major_units() {
    let gateway = spawn_gateway(GatewayFixture::new()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{bridge}/api/v1/pay/dqr/status/M-100/DQRDONE7"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let data = &body["data"];
    assert_eq!(data["payment_state"], "COMPLETED");
    assert_eq!(data["amount"], "199.00");
    assert_eq!(data["payment_modes"][0]["amount"], "199.00");
}

#[tokio::test]
async fn refund_draws_a_fresh_id_and_references_the_original() {
    let gateway = spawn_gateway(GatewayFixture::new()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    // The fixture replies 400 unless the wire request carries
    // originalTransactionId, so a 200 proves the reference went out.
    let resp = client
        .post(format!("{bridge}/api/v1/pay/dqr/refund"))
        .json(&json!({
            "merchant_id": "M-100",
            "transaction_id": "DQRORIG42",
            "amount": "50.00",
            "message": "order returned"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let refund_id = body["data"]["refund_transaction_id"].as_str().unwrap();
    assert!(refund_id.starts_with("DQR"));
    assert_ne!(refund_id, "DQRORIG42");
    assert_eq!(body["data"]["payment_state"], "REFUNDED");
    assert_eq!(body["data"]["amount"], "50.00");
}

#[tokio::test]
async fn signed_callback_is_verified_and_recorded() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture).await;
    let (bridge, audit) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let report = json!({
        "success": true,
        "code": "PAYMENT_SUCCESS",
        "message": "completed",
        "data": {
            "transactionId": "DQRCB90001",
            "merchantId": "M-100",
            "providerReferenceId": "AX-778",
            "amount": 12050,
            "paymentState": "COMPLETED",
            "responseCode": "SUCCESS",
            "paymentModes": [{"mode": "WALLET", "amount": 12050}]
        }
    });
    let b64 = envelope::encode(&report).unwrap();
    let signature = SigningContext::new(SECRET, KEY_VERSION).sign(&b64);

    let resp = client
        .post(format!("{bridge}/api/v1/callback/dqr"))
        .header("X-VERIFY", signature)
        .json(&json!({"response": b64}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["transaction_id"], "DQRCB90001");

    let attempts = audit.callback_attempts(Instrument::DynamicQr);
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].valid);
}

#[tokio::test]
async fn tampered_callback_is_rejected_but_still_recorded() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture).await;
    let (bridge, audit) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let report = json!({"success": true, "code": "PAYMENT_SUCCESS", "message": "completed"});
    let b64 = envelope::encode(&report).unwrap();
    let signature = SigningContext::new("some-other-secret", KEY_VERSION).sign(&b64);

    let resp = client
        .post(format!("{bridge}/api/v1/callback/dqr"))
        .header("X-VERIFY", signature)
        .json(&json!({"response": b64}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "SIGNATURE_INVALID");

    // Rejected attempts still land in the audit trail.
    let attempts = audit.callback_attempts(Instrument::DynamicQr);
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].valid);
}

#[tokio::test]
async fn callback_without_a_wrapper_is_a_bad_request() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture).await;
    let (bridge, audit) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{bridge}/api/v1/callback/dqr"))
        .header("Content-Type", "application/json")
        .body("definitely not a wrapper")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "MALFORMED_CALLBACK");

    // The delivery lands in the audit trail even though it never parsed.
    let attempts = audit.callback_attempts(Instrument::DynamicQr);
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].valid);
    assert_eq!(attempts[0].raw_body, "definitely not a wrapper");
}

#[tokio::test]
async fn unknown_instrument_is_rejected_before_dispatch() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture.clone()).await;
    let (bridge, _) = spawn_bridge(&gateway).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{bridge}/api/v1/pay/upi/init"))
        .json(&init_body("10.00"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "UNKNOWN_INSTRUMENT");
    assert_eq!(fixture.attempts(), 0);
}

#[tokio::test]
async fn health_reports_configured_instruments() {
    let fixture = GatewayFixture::new();
    let gateway = spawn_gateway(fixture).await;
    let (bridge, _) = spawn_bridge(&gateway).await;

    let resp = reqwest::get(format!("{bridge}/api/v1/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["instruments"], 5);
}
