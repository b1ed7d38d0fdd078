//! Settlement orchestration.
//!
//! The facilitator never talks to a chain directly; it hands a verified
//! payload to an injected [`Settler`] and bounds the attempt with a
//! timeout. A settlement failure is terminal for the payment id: the proof
//! stays consumed and the client must negotiate a fresh offer.

use std::time::Duration;

use async_trait::async_trait;
use q402::proto::{
    PaymentVerificationError, SettleReceipt, SettlementStatus, SignedPaymentPayload,
};
use tracing::warn;

/// Submits verified payments for on-chain execution.
///
/// Implementations own transaction construction, gas, and broadcasting;
/// the facilitator treats them as opaque and only interprets the receipt.
#[async_trait]
pub trait Settler: Send + Sync {
    /// Submits the payment and waits for inclusion.
    async fn submit(&self, payload: &SignedPaymentPayload) -> Result<SettleReceipt, SettlerError>;
}

/// Errors a settler can report.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SettlerError {
    /// The transaction could not be submitted or confirmed.
    #[error("settlement submission failed: {0}")]
    Submission(String),
}

/// Runs one bounded settlement attempt.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::SettlementFailed`] if the settler
/// errors, the transaction reverted, or the timeout elapsed. The timeout
/// cancels the in-flight future; nothing is retried.
pub async fn settle_payment<S: Settler>(
    settler: &S,
    payload: &SignedPaymentPayload,
    timeout: Duration,
) -> Result<SettleReceipt, PaymentVerificationError> {
    let receipt = match tokio::time::timeout(timeout, settler.submit(payload)).await {
        Ok(Ok(receipt)) => receipt,
        Ok(Err(err)) => {
            warn!(error = %err, "settlement failed");
            return Err(PaymentVerificationError::SettlementFailed(err.to_string()));
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "settlement timed out");
            return Err(PaymentVerificationError::SettlementFailed(format!(
                "timed out after {}s",
                timeout.as_secs()
            )));
        }
    };
    if receipt.status == SettlementStatus::Failed {
        warn!(tx_hash = %receipt.tx_hash, "settlement transaction reverted");
        return Err(PaymentVerificationError::SettlementFailed(format!(
            "transaction {} reverted",
            receipt.tx_hash
        )));
    }
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use q402::proto::U64String;

    struct StubSettler {
        outcome: Result<SettleReceipt, String>,
        delay: Duration,
    }

    #[async_trait]
    impl Settler for StubSettler {
        async fn submit(
            &self,
            _payload: &SignedPaymentPayload,
        ) -> Result<SettleReceipt, SettlerError> {
            tokio::time::sleep(self.delay).await;
            self.outcome
                .clone()
                .map_err(SettlerError::Submission)
        }
    }

    fn receipt(status: SettlementStatus) -> SettleReceipt {
        SettleReceipt {
            tx_hash: B256::repeat_byte(0xAB),
            block_number: U64String::from(100),
            status,
        }
    }

    fn sample_payload() -> SignedPaymentPayload {
        // Settlement never inspects the payload; a decoded minimal one is
        // enough for these tests.
        serde_json::from_value(serde_json::json!({
            "paymentDetails": {
                "scheme": "eip7702-delegated",
                "networkId": "bsc-testnet",
                "token": "0x337610d27c682E347C9cD60BD4b3b107C9d34dDd",
                "amount": "1000000",
                "to": "0x1111111111111111111111111111111111111111",
                "implementationContract": "0x2222222222222222222222222222222222222222",
                "witness": {
                    "domain": {
                        "name": "q402",
                        "version": "1",
                        "chainId": 97,
                        "verifyingContract": "0x2222222222222222222222222222222222222222"
                    },
                    "types": {
                        "Witness": [
                            {"name": "owner", "type": "address"},
                            {"name": "token", "type": "address"},
                            {"name": "amount", "type": "uint256"},
                            {"name": "to", "type": "address"},
                            {"name": "deadline", "type": "uint256"},
                            {"name": "paymentId", "type": "bytes32"},
                            {"name": "nonce", "type": "uint256"}
                        ]
                    },
                    "primaryType": "Witness",
                    "message": {
                        "owner": "0x3333333333333333333333333333333333333333",
                        "token": "0x337610d27c682E347C9cD60BD4b3b107C9d34dDd",
                        "amount": "1000000",
                        "to": "0x1111111111111111111111111111111111111111",
                        "deadline": "1900000000",
                        "paymentId": "0x4242424242424242424242424242424242424242424242424242424242424242",
                        "nonce": "0"
                    }
                },
                "authorization": {
                    "chainId": 97,
                    "address": "0x2222222222222222222222222222222222222222",
                    "nonce": 0
                }
            },
            "witnessSignature": format!("0x{}", "11".repeat(65)),
            "authorizationSignature": format!("0x{}", "22".repeat(65))
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn confirmed_receipt_passes_through() {
        let settler = StubSettler {
            outcome: Ok(receipt(SettlementStatus::Confirmed)),
            delay: Duration::ZERO,
        };
        let out = settle_payment(&settler, &sample_payload(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.status, SettlementStatus::Confirmed);
    }

    #[tokio::test]
    async fn reverted_transaction_is_settlement_failure() {
        let settler = StubSettler {
            outcome: Ok(receipt(SettlementStatus::Failed)),
            delay: Duration::ZERO,
        };
        let err = settle_payment(&settler, &sample_payload(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SettlementFailed(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_settler_hits_the_timeout() {
        let settler = StubSettler {
            outcome: Ok(receipt(SettlementStatus::Confirmed)),
            delay: Duration::from_secs(60),
        };
        let err = settle_payment(&settler, &sample_payload(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentVerificationError::SettlementFailed(_)
        ));
    }
}
