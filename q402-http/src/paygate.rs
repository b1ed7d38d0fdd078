//! Core payment gate logic.
//!
//! The [`Paygate`] struct handles the full payment lifecycle for one
//! request: extracting the `X-PAYMENT` header, verifying the proof,
//! running the inner handler, settling, and attaching the
//! `X-PAYMENT-RESPONSE` receipt. Requests without a valid payment get a
//! 402 carrying a freshly minted offer in the JSON body.

use std::convert::Infallible;
use std::sync::Arc;

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use q402::codec;
use q402::proto::{
    InvalidReason, PaymentRequiredResponse, SettleReceipt, VerifyResponse, X402Version1,
};
use q402_evm::facilitator::{DelegatedFacilitator, Settler};
use q402_evm::server::{PaymentOptionConfig, PaymentRequiredBuilder};
use tower::Service;
use tracing::{debug, error};

use crate::error::PaygateError;

/// Request header carrying the signed payment proof.
pub const X_PAYMENT: &str = "x-payment";

/// Response header carrying the settlement receipt envelope.
pub const X_PAYMENT_RESPONSE: &str = "x-payment-response";

/// Payment gate for one protected route.
///
/// Cheap to clone; the facilitator and offer builder are shared.
pub struct Paygate<S> {
    /// Verifies proofs and drives settlement.
    pub facilitator: Arc<DelegatedFacilitator<S>>,
    /// Mints fresh offers for 402 bodies.
    pub builder: Arc<PaymentRequiredBuilder>,
    /// The payment options this route accepts.
    pub accepts: Arc<Vec<PaymentOptionConfig>>,
}

impl<S> Clone for Paygate<S> {
    fn clone(&self) -> Self {
        Self {
            facilitator: Arc::clone(&self.facilitator),
            builder: Arc::clone(&self.builder),
            accepts: Arc::clone(&self.accepts),
        }
    }
}

impl<S> std::fmt::Debug for Paygate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paygate").finish_non_exhaustive()
    }
}

impl<S> Paygate<S>
where
    S: Settler,
{
    /// Handles an incoming request, enforcing payment.
    ///
    /// Returns a 402 or 400 response if payment fails; otherwise the inner
    /// service's response with the settlement receipt attached.
    ///
    /// # Errors
    ///
    /// This method is infallible (`Infallible` error type); every failure
    /// becomes an HTTP response.
    pub async fn handle_request<ReqBody, ResBody, I>(
        self,
        inner: I,
        req: http::Request<ReqBody>,
    ) -> Result<Response, Infallible>
    where
        I: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
        I::Response: IntoResponse,
        I::Error: IntoResponse,
        I::Future: Send,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(self.error_into_response(&err)),
        }
    }

    /// The fallible half of [`Self::handle_request`].
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] when the payment is missing, malformed,
    /// rejected, or fails to settle.
    pub async fn handle_request_fallible<ReqBody, ResBody, I>(
        &self,
        mut inner: I,
        req: http::Request<ReqBody>,
    ) -> Result<Response, PaygateError>
    where
        I: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
        I::Response: IntoResponse,
        I::Error: IntoResponse,
        I::Future: Send,
    {
        let header = extract_payment_header(req.headers()).ok_or(PaygateError::MissingHeader)?;
        let payload = self
            .facilitator
            .decode_header(header)
            .map_err(|e| PaygateError::MalformedHeader(e.to_string()))?;

        match self.facilitator.verify(&payload) {
            VerifyResponse::Valid { payer } => {
                debug!(%payer, "payment accepted");
            }
            VerifyResponse::Invalid { reason, message } => {
                return Err(PaygateError::Rejected {
                    reason,
                    message: message.unwrap_or_else(|| reason.as_str().to_owned()),
                });
            }
        }

        let response = match inner.call(req).await {
            Ok(response) => response,
            Err(err) => return Ok(err.into_response()),
        };
        if response.status().is_client_error() || response.status().is_server_error() {
            // The handler refused the request; don't take the money.
            return Ok(response.into_response());
        }

        let receipt = self
            .facilitator
            .settle(&payload)
            .await
            .map_err(|e| PaygateError::Settlement(e.to_string()))?;

        let mut response = response.into_response();
        response
            .headers_mut()
            .insert(X_PAYMENT_RESPONSE, receipt_to_header(&receipt)?);
        Ok(response)
    }

    /// Converts a [`PaygateError`] into the HTTP response the protocol
    /// prescribes: 400 for undecodable headers, 402 with a fresh offer for
    /// everything else.
    fn error_into_response(&self, err: &PaygateError) -> Response {
        match err {
            PaygateError::MissingHeader => self.payment_required(None),
            PaygateError::MalformedHeader(detail) => {
                let body = PaymentRequiredResponse {
                    x402_version: X402Version1,
                    accepts: vec![],
                    error: Some(detail.clone()),
                };
                json_response(StatusCode::BAD_REQUEST, &body)
            }
            PaygateError::Rejected { reason, .. } => {
                self.payment_required(Some(reason.as_str().to_owned()))
            }
            PaygateError::Settlement(_) => {
                self.payment_required(Some(InvalidReason::SettlementFailed.as_str().to_owned()))
            }
        }
    }

    /// Builds a 402 response with a freshly minted offer.
    fn payment_required(&self, error: Option<String>) -> Response {
        let mut body = match self.builder.build_payment_required(&self.accepts) {
            Ok(body) => body,
            Err(build_err) => {
                // Misconfigured options; still answer 402, with no offers.
                error!(error = %build_err, "failed to build payment offer");
                PaymentRequiredResponse {
                    x402_version: X402Version1,
                    accepts: vec![],
                    error: Some(build_err.as_invalid_reason().as_str().to_owned()),
                }
            }
        };
        if error.is_some() {
            body.error = error;
        }
        json_response(StatusCode::PAYMENT_REQUIRED, &body)
    }
}

/// Extracts the `X-PAYMENT` header value as a string.
fn extract_payment_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_PAYMENT).and_then(|v| v.to_str().ok())
}

/// Envelope-encodes a settlement receipt into a header value.
fn receipt_to_header(receipt: &SettleReceipt) -> Result<HeaderValue, PaygateError> {
    let envelope =
        codec::encode_envelope(receipt).map_err(|e| PaygateError::Settlement(e.to_string()))?;
    HeaderValue::from_str(&envelope).map_err(|e| PaygateError::Settlement(e.to_string()))
}

/// Builds a JSON response without panicking on serialization failure.
fn json_response(status: StatusCode, body: &PaymentRequiredResponse) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "failed to serialize 402 body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
