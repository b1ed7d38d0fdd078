//! HTTP contract tests for the payment gate middleware.

use alloy_primitives::{B256, address};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::routing::get;
use http::{Request, StatusCode};
use q402::codec;
use q402::networks::NetworkRegistry;
use q402::proto::{
    PaymentRequiredResponse, SettleReceipt, SettlementStatus, SignedPaymentPayload, TokenAmount,
    U64String, select_payment_details,
};
use q402_evm::client::create_payment_header;
use q402_evm::facilitator::{Settler, SettlerError};
use q402_evm::server::PaymentOptionConfig;
use q402_http::{PaymentGateLayer, X_PAYMENT, X_PAYMENT_RESPONSE};
use tower::ServiceExt;

struct OkSettler;

#[async_trait]
impl Settler for OkSettler {
    async fn submit(&self, _payload: &SignedPaymentPayload) -> Result<SettleReceipt, SettlerError> {
        Ok(SettleReceipt {
            tx_hash: B256::repeat_byte(0xEF),
            block_number: U64String::from(7),
            status: SettlementStatus::Confirmed,
        })
    }
}

struct BrokenSettler;

#[async_trait]
impl Settler for BrokenSettler {
    async fn submit(&self, _payload: &SignedPaymentPayload) -> Result<SettleReceipt, SettlerError> {
        Err(SettlerError::Submission("rpc unreachable".into()))
    }
}

fn accepts() -> Vec<PaymentOptionConfig> {
    vec![PaymentOptionConfig {
        network_id: "bsc-testnet".into(),
        token: None,
        amount: TokenAmount::from(1_000_000u64),
        to: address!("0x1111111111111111111111111111111111111111"),
        implementation_contract: address!("0x2222222222222222222222222222222222222222"),
    }]
}

fn app<S: Settler + 'static>(settler: S) -> Router {
    let layer = PaymentGateLayer::new(NetworkRegistry::default(), accepts(), settler);
    Router::new()
        .route("/premium", get(|| async { "premium data" }))
        .route_layer(layer)
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unpaid_request_gets_a_fresh_offer() {
    let app = app(OkSettler);
    let response = app
        .oneshot(Request::get("/premium").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["x402Version"], 1);
    assert_eq!(json["accepts"][0]["networkId"], "bsc-testnet");
    assert_eq!(json["accepts"][0]["amount"], "1000000");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn undecodable_header_is_a_bad_request() {
    let app = app(OkSettler);
    let response = app
        .oneshot(
            Request::get("/premium")
                .header(X_PAYMENT, "@@not-base64@@")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["x402Version"], 1);
    assert_eq!(json["accepts"].as_array().unwrap().len(), 0);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn paid_request_runs_and_carries_a_receipt() {
    let app = app(OkSettler);

    // First round trip: fetch the offer.
    let response = app
        .clone()
        .oneshot(Request::get("/premium").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let offer: PaymentRequiredResponse =
        serde_json::from_value(body_json(response.into_body()).await).unwrap();
    let details = select_payment_details(&offer, "bsc-testnet").unwrap();

    // Second round trip: pay.
    let signer = PrivateKeySigner::random();
    let header = create_payment_header(&signer, details).await.unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::get("/premium")
                .header(X_PAYMENT, &header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let receipt_header = response
        .headers()
        .get(X_PAYMENT_RESPONSE)
        .unwrap()
        .to_str()
        .unwrap();
    let receipt: SettleReceipt = codec::decode_envelope(receipt_header).unwrap();
    assert_eq!(receipt.status, SettlementStatus::Confirmed);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"premium data");

    // Third round trip: the same proof is a replay.
    let response = app
        .oneshot(
            Request::get("/premium")
                .header(X_PAYMENT, &header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error"], "replayed");
    // The 402 still carries a fresh offer to retry with.
    assert!(!json["accepts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn settlement_failure_is_a_distinct_402() {
    let app = app(BrokenSettler);

    let response = app
        .clone()
        .oneshot(Request::get("/premium").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let offer: PaymentRequiredResponse =
        serde_json::from_value(body_json(response.into_body()).await).unwrap();
    let details = select_payment_details(&offer, "bsc-testnet").unwrap();

    let signer = PrivateKeySigner::random();
    let header = create_payment_header(&signer, details).await.unwrap();
    let response = app
        .oneshot(
            Request::get("/premium")
                .header(X_PAYMENT, &header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response.into_body()).await;
    assert_eq!(json["error"], "settlement_failed");
}
