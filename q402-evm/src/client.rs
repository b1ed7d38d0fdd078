//! Client-side payment signing for the delegated-execution scheme.
//!
//! Given a payment option from a 402 response, [`create_payment_header`]
//! produces the base64 envelope a client sends back in the `X-PAYMENT`
//! header. Structural problems with the option are rejected before the
//! wallet is asked to sign anything.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Signature};
use alloy_signer_local::PrivateKeySigner;
use q402::codec;
use q402::proto::PaymentDetails;

use crate::authorization::AuthorizationTuple;
use crate::witness::{build_witness_typed_data, validate_details, witness_signing_hash};

/// A trait that abstracts signing operations, allowing both owned signers
/// and Arc-wrapped signers.
///
/// This is necessary because Alloy's `Signer` trait is not implemented for
/// `Arc<T>`, but users may want to share signers via `Arc` (especially when
/// `PrivateKeySigner` doesn't implement `Clone`).
pub trait WalletSigner: Send + Sync {
    /// Returns the address of the signer.
    fn address(&self) -> Address;

    /// Signs the given hash.
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

impl WalletSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: WalletSigner + Send + Sync> WalletSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// Errors a client can hit while producing a payment header.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PaymentClientError {
    /// The payment option is structurally inconsistent; nothing was signed.
    #[error("invalid payment details: {0}")]
    InvalidPaymentDetails(String),
    /// The wallet refused to sign or signing failed.
    #[error("signing declined: {0}")]
    SigningDeclined(String),
    /// The signed payload could not be envelope-encoded.
    #[error(transparent)]
    Encoding(#[from] codec::EnvelopeError),
}

/// Signs a payment option and packs it into an `X-PAYMENT` header value.
///
/// Validation runs first, so a malformed option is rejected before the
/// wallet is asked for either signature. Two signatures are then produced:
/// the EIP-712 witness signature and the EIP-7702 authorization signature.
/// The raw authorization RLP is included in the payload so the verifier can
/// check byte-exact agreement.
///
/// # Errors
///
/// Returns [`PaymentClientError::InvalidPaymentDetails`] for structural
/// problems, [`PaymentClientError::SigningDeclined`] if the signer refuses,
/// and [`PaymentClientError::Encoding`] if envelope encoding fails.
pub async fn create_payment_header<S: WalletSigner + Sync>(
    signer: &S,
    details: &PaymentDetails,
) -> Result<String, PaymentClientError> {
    validate_details(details)
        .map_err(|e| PaymentClientError::InvalidPaymentDetails(e.to_string()))?;

    let typed = build_witness_typed_data(details, signer.address());
    let witness_hash = witness_signing_hash(&typed);
    let witness_signature = signer
        .sign_hash(&witness_hash)
        .await
        .map_err(|e| PaymentClientError::SigningDeclined(e.to_string()))?;

    let tuple = AuthorizationTuple::for_details(details);
    let authorization_signature = signer
        .sign_hash(&tuple.signing_hash())
        .await
        .map_err(|e| PaymentClientError::SigningDeclined(e.to_string()))?;

    let mut payment_details = details.clone();
    payment_details.witness = typed;

    let payload = q402::proto::SignedPaymentPayload {
        payment_details,
        witness_signature: witness_signature.as_bytes().to_vec().into(),
        authorization_signature: authorization_signature.as_bytes().to_vec().into(),
        authorization_rlp: Some(tuple.rlp_bytes().into()),
    };
    Ok(codec::encode_envelope(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use q402::proto::{
        PaymentScheme, SignedPaymentPayload, TokenAmount, U64String, UnixTimestamp,
        UnsignedAuthorization, WitnessDomain, WitnessMessage, WitnessTypedData,
    };

    fn sample_details() -> PaymentDetails {
        let token = address!("0x337610d27c682E347C9cD60BD4b3b107C9d34dDd");
        let to = address!("0x1111111111111111111111111111111111111111");
        let implementation = address!("0x2222222222222222222222222222222222222222");
        let amount = TokenAmount::from(1_000_000u64);
        let message = WitnessMessage {
            owner: Address::ZERO,
            token,
            amount,
            to,
            deadline: UnixTimestamp::now() + 900,
            payment_id: B256::repeat_byte(0x42),
            nonce: U64String::from(0),
        };
        let domain = WitnessDomain {
            name: "q402".into(),
            version: "1".into(),
            chain_id: 97,
            verifying_contract: implementation,
        };
        PaymentDetails {
            scheme: PaymentScheme::Eip7702Delegated,
            network_id: "bsc-testnet".into(),
            token,
            amount,
            to,
            implementation_contract: implementation,
            witness: WitnessTypedData::new(domain, message),
            authorization: UnsignedAuthorization {
                chain_id: 97,
                address: implementation,
                nonce: 0,
            },
        }
    }

    #[tokio::test]
    async fn header_carries_both_signatures_and_owner() {
        let signer = PrivateKeySigner::random();
        let details = sample_details();
        let header = create_payment_header(&signer, &details).await.unwrap();

        let payload: SignedPaymentPayload = codec::decode_envelope(&header).unwrap();
        assert_eq!(payload.payment_details.witness.message.owner, signer.address());
        assert_eq!(payload.witness_signature.len(), 65);
        assert_eq!(payload.authorization_signature.len(), 65);
        let rlp = payload.authorization_rlp.unwrap();
        assert_eq!(
            rlp.as_ref(),
            AuthorizationTuple::for_details(&details).rlp_bytes()
        );
    }

    #[tokio::test]
    async fn rejects_inconsistent_details_before_signing() {
        let signer = PrivateKeySigner::random();
        let mut details = sample_details();
        details.witness.message.to = Address::ZERO;
        let err = create_payment_header(&signer, &details).await.unwrap_err();
        assert!(matches!(err, PaymentClientError::InvalidPaymentDetails(_)));
    }

    #[tokio::test]
    async fn shared_signer_via_arc() {
        let signer = Arc::new(PrivateKeySigner::random());
        let details = sample_details();
        let header = create_payment_header(&signer, &details).await.unwrap();
        assert!(!header.is_empty());
    }
}
