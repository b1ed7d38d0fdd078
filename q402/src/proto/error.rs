//! Error types for q402 payment verification.
//!
//! This module defines structured error types used when payment verification
//! or settlement fails, along with machine-readable reason codes.

use serde::{Deserialize, Serialize};

/// Errors that can occur during payment verification.
///
/// These errors are returned when a payment proof fails validation checks
/// performed by the facilitator before settlement. Every failure is terminal
/// for the request that produced it; nothing here is retried.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentVerificationError {
    /// The network identifier is not in the registry.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    /// The payment details are structurally inconsistent.
    #[error("invalid payment details: {0}")]
    InvalidPaymentDetails(String),
    /// The `X-PAYMENT` header could not be decoded into a payload.
    #[error("malformed payment header: {0}")]
    MalformedHeader(String),
    /// The presented details don't match any accepted payment option.
    #[error("payment details do not match the offered terms")]
    TermsMismatch,
    /// A signature does not recover to the claimed owner.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The payment deadline has passed.
    #[error("payment authorization is expired")]
    Expired,
    /// The payment id has already been consumed.
    #[error("payment has already been used")]
    Replayed,
    /// The payment verified but on-chain settlement failed.
    #[error("settlement failed: {0}")]
    SettlementFailed(String),
}

impl PaymentVerificationError {
    /// Returns the machine-readable reason code for this error.
    #[must_use]
    pub const fn as_invalid_reason(&self) -> InvalidReason {
        match self {
            Self::UnknownNetwork(_) => InvalidReason::UnknownNetwork,
            Self::InvalidPaymentDetails(_) => InvalidReason::InvalidPaymentDetails,
            Self::MalformedHeader(_) => InvalidReason::MalformedHeader,
            Self::TermsMismatch => InvalidReason::TermsMismatch,
            Self::InvalidSignature(_) => InvalidReason::InvalidSignature,
            Self::Expired => InvalidReason::Expired,
            Self::Replayed => InvalidReason::Replayed,
            Self::SettlementFailed(_) => InvalidReason::SettlementFailed,
        }
    }
}

impl From<crate::codec::EnvelopeError> for PaymentVerificationError {
    fn from(value: crate::codec::EnvelopeError) -> Self {
        Self::MalformedHeader(value.to_string())
    }
}

impl From<crate::networks::UnknownNetworkError> for PaymentVerificationError {
    fn from(value: crate::networks::UnknownNetworkError) -> Self {
        Self::UnknownNetwork(value.0)
    }
}

/// Machine-readable reason codes for payment failures.
///
/// These codes appear in 402/400 response bodies and in
/// [`VerifyResponse::Invalid`](super::VerifyResponse::Invalid) so clients can
/// programmatically distinguish failure scenarios. In particular,
/// `SettlementFailed` is distinct from every verification failure: it means
/// the proof was valid but the chain did not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum InvalidReason {
    /// The network identifier is not registered.
    UnknownNetwork,
    /// The payment details are structurally inconsistent.
    InvalidPaymentDetails,
    /// The wallet refused to sign.
    SigningDeclined,
    /// The payment header could not be decoded.
    MalformedHeader,
    /// The details don't match the offered terms.
    TermsMismatch,
    /// A signature failed to recover to the owner.
    InvalidSignature,
    /// The payment deadline has passed.
    Expired,
    /// The payment id was already consumed.
    Replayed,
    /// Verification passed but settlement did not.
    SettlementFailed,
}

impl InvalidReason {
    /// Returns the `snake_case` string representation matching the wire format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownNetwork => "unknown_network",
            Self::InvalidPaymentDetails => "invalid_payment_details",
            Self::SigningDeclined => "signing_declined",
            Self::MalformedHeader => "malformed_header",
            Self::TermsMismatch => "terms_mismatch",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::Replayed => "replayed",
            Self::SettlementFailed => "settlement_failed",
        }
    }
}

impl core::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
