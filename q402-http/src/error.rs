//! Error types for the payment gate.

use q402::proto::InvalidReason;

/// Everything that can stop a request at the payment gate.
///
/// Each variant maps to one HTTP outcome; none of them propagate as service
/// errors. Messages carry only reason codes and public payment fields,
/// never header contents or signature material.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// The request carried no `X-PAYMENT` header.
    #[error("payment required")]
    MissingHeader,
    /// The `X-PAYMENT` header could not be decoded.
    #[error("malformed payment header: {0}")]
    MalformedHeader(String),
    /// The payment proof failed verification.
    #[error("payment rejected: {reason}")]
    Rejected {
        /// Machine-readable reason code.
        reason: InvalidReason,
        /// Human-readable detail.
        message: String,
    },
    /// The proof verified but settlement failed.
    #[error("settlement failed: {0}")]
    Settlement(String),
}
