//! Tower layer wiring for the payment gate.
//!
//! [`PaymentGateLayer`] drops the gate into an axum `Router` via
//! `route_layer`, so unpaid requests never reach the handler.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use q402::networks::NetworkRegistry;
use q402_evm::facilitator::{DelegatedFacilitator, Settler};
use q402_evm::server::{PaymentOptionConfig, PaymentRequiredBuilder};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::paygate::Paygate;

/// Layer that protects a route with q402 payment enforcement.
pub struct PaymentGateLayer<S> {
    gate: Paygate<S>,
}

impl<S> Clone for PaymentGateLayer<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<S> std::fmt::Debug for PaymentGateLayer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateLayer").finish_non_exhaustive()
    }
}

impl<S> PaymentGateLayer<S> {
    /// Creates a payment gate accepting the given options, verifying and
    /// settling through the given settler.
    ///
    /// The registry resolves network identifiers for both offer minting and
    /// verification; the same option list drives both sides.
    #[must_use]
    pub fn new(registry: NetworkRegistry, accepts: Vec<PaymentOptionConfig>, settler: S) -> Self {
        let facilitator = DelegatedFacilitator::new(registry.clone(), accepts.clone(), settler);
        let builder = PaymentRequiredBuilder::new(registry);
        Self {
            gate: Paygate {
                facilitator: Arc::new(facilitator),
                builder: Arc::new(builder),
                accepts: Arc::new(accepts),
            },
        }
    }

    /// Creates a layer from an existing facilitator and builder.
    #[must_use]
    pub fn from_parts(
        facilitator: Arc<DelegatedFacilitator<S>>,
        builder: Arc<PaymentRequiredBuilder>,
        accepts: Vec<PaymentOptionConfig>,
    ) -> Self {
        Self {
            gate: Paygate {
                facilitator,
                builder,
                accepts: Arc::new(accepts),
            },
        }
    }
}

impl<S, I> Layer<I> for PaymentGateLayer<S>
where
    I: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    I::Future: Send + 'static,
{
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: I) -> Self::Service {
        PaymentGateService {
            gate: self.gate.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service produced by [`PaymentGateLayer`].
pub struct PaymentGateService<S> {
    gate: Paygate<S>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<S> Clone for PaymentGateService<S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<S> std::fmt::Debug for PaymentGateService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateService").finish_non_exhaustive()
    }
}

impl<S> Service<Request> for PaymentGateService<S>
where
    S: Settler + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = self.gate.clone();
        let inner = self.inner.clone();
        Box::pin(async move { gate.handle_request(inner, req).await })
    }
}
