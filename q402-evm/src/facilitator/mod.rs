//! Facilitator-side payment verification and settlement.
//!
//! The facilitator is the trust boundary of the protocol: it decodes the
//! `X-PAYMENT` envelope, checks the proof against the terms the server
//! actually offered, claims single use of the payment id, and drives
//! settlement through an injected [`Settler`].
//!
//! Every inbound request reaches exactly one terminal outcome. Verification
//! checks run in a fixed order (structural, network, cryptographic,
//! liveness) so an attacker probing with garbage learns the cheapest
//! failure first and signature work is never spent on mismatched terms.

mod replay;
mod settle;
mod verify;

use std::time::Duration;

use alloy_primitives::Address;
use q402::codec;
use q402::networks::NetworkRegistry;
use q402::proto::{
    PaymentVerificationError, SettleReceipt, SignedPaymentPayload, VerifyResponse,
};
use q402::timestamp::UnixTimestamp;
use tracing::debug;

pub use replay::ConsumedPaymentIds;
pub use settle::{Settler, SettlerError, settle_payment};
pub use verify::verify_payment;

use crate::server::PaymentOptionConfig;

/// Default upper bound on a single settlement attempt.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Verifies and settles delegated-execution payments.
///
/// Holds the only shared mutable state in the pipeline, the consumed
/// payment id set; everything else is read-only configuration, so the
/// facilitator can be shared across request handlers behind an `Arc`.
#[derive(Debug)]
pub struct DelegatedFacilitator<S> {
    registry: NetworkRegistry,
    accepts: Vec<PaymentOptionConfig>,
    consumed: ConsumedPaymentIds,
    settler: S,
    settle_timeout: Duration,
}

impl<S> DelegatedFacilitator<S> {
    /// Creates a facilitator accepting the given payment options.
    #[must_use]
    pub fn new(registry: NetworkRegistry, accepts: Vec<PaymentOptionConfig>, settler: S) -> Self {
        Self {
            registry,
            accepts,
            consumed: ConsumedPaymentIds::new(),
            settler,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Overrides the settlement timeout.
    #[must_use]
    pub const fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Decodes an `X-PAYMENT` header value into a signed payload.
    ///
    /// # Errors
    ///
    /// Any decoding failure maps to
    /// [`PaymentVerificationError::MalformedHeader`], which callers turn
    /// into HTTP 400.
    pub fn decode_header(
        &self,
        header: &str,
    ) -> Result<SignedPaymentPayload, PaymentVerificationError> {
        Ok(codec::decode_envelope(header)?)
    }

    /// Verifies a signed payload and, on success, consumes its payment id.
    ///
    /// The replay claim is the last check and is atomic: for any number of
    /// concurrent presentations of the same payment id, exactly one call
    /// returns [`VerifyResponse::Valid`].
    pub fn verify(&self, payload: &SignedPaymentPayload) -> VerifyResponse {
        match self.verify_inner(payload) {
            Ok(payer) => VerifyResponse::valid(payer),
            Err(err) => {
                debug!(reason = %err.as_invalid_reason(), "payment verification failed");
                VerifyResponse::from(&err)
            }
        }
    }

    fn verify_inner(
        &self,
        payload: &SignedPaymentPayload,
    ) -> Result<Address, PaymentVerificationError> {
        let payer = verify_payment(payload, &self.registry, &self.accepts)?;
        let message = &payload.payment_details.witness.message;
        if !self.consumed.try_consume(message.payment_id, message.deadline) {
            return Err(PaymentVerificationError::Replayed);
        }
        debug!(%payer, payment_id = %message.payment_id, "payment verified");
        Ok(payer)
    }

    /// Drops consumed payment ids whose deadline has passed.
    ///
    /// Expired ids can never verify again regardless of the replay set, so
    /// this only bounds memory. Call it periodically from a maintenance
    /// task.
    pub fn prune_consumed(&self, now: UnixTimestamp) -> usize {
        self.consumed.prune_expired(now)
    }
}

impl<S: Settler> DelegatedFacilitator<S> {
    /// Settles a verified payment through the injected settler.
    ///
    /// Must only be called with a payload that [`Self::verify`] accepted.
    /// The payment id stays consumed even if settlement fails; the client
    /// must obtain a fresh offer to retry.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentVerificationError::SettlementFailed`] on settler
    /// error, reverted transaction, or timeout.
    pub async fn settle(
        &self,
        payload: &SignedPaymentPayload,
    ) -> Result<SettleReceipt, PaymentVerificationError> {
        settle_payment(&self.settler, payload, self.settle_timeout).await
    }
}
