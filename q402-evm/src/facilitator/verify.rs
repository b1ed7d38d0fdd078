//! Payment verification logic for the delegated-execution scheme.
//!
//! Contains the precondition checks (terms, network, signatures, expiry)
//! and the composite [`verify_payment`] function. The replay claim is not
//! here; it belongs to the facilitator so the claim can be made atomically
//! with the verification result.

use alloy_primitives::{Address, Signature};
use q402::networks::NetworkRegistry;
use q402::proto::{PaymentDetails, PaymentVerificationError, SignedPaymentPayload};
use q402::timestamp::UnixTimestamp;

use crate::authorization::AuthorizationTuple;
use crate::server::PaymentOptionConfig;
use crate::witness::{validate_details, witness_signing_hash};

/// Runs all checks except the replay claim, in fixed order.
///
/// Returns the recovered payer address on success.
///
/// # Errors
///
/// Returns the first failing check's [`PaymentVerificationError`]:
/// structural problems before network resolution, network before
/// signatures, signatures before expiry.
pub fn verify_payment(
    payload: &SignedPaymentPayload,
    registry: &NetworkRegistry,
    accepts: &[PaymentOptionConfig],
) -> Result<Address, PaymentVerificationError> {
    let details = &payload.payment_details;

    assert_terms(details, registry, accepts)?;
    assert_network(details, registry)?;
    let payer = assert_signatures(payload)?;
    assert_not_expired(details.witness.message.deadline, UnixTimestamp::now())?;

    Ok(payer)
}

/// Checks the stable payment terms against the configured options.
///
/// Offers are minted fresh per request, so the volatile fields (payment id,
/// deadline, nonce) cannot be compared; the stable fields (scheme, network,
/// token, amount, recipient, delegate) must match one configured option
/// exactly.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::TermsMismatch`] if no option
/// matches, or an `InvalidPaymentDetails` error if the payload is
/// internally inconsistent.
pub fn assert_terms(
    details: &PaymentDetails,
    registry: &NetworkRegistry,
    accepts: &[PaymentOptionConfig],
) -> Result<(), PaymentVerificationError> {
    validate_details(details)?;

    let matches_option = |option: &PaymentOptionConfig| {
        let token = option
            .token
            .or_else(|| registry.lookup(&option.network_id).ok()?.default_token);
        token == Some(details.token)
            && option.network_id == details.network_id
            && option.amount == details.amount
            && option.to == details.to
            && option.implementation_contract == details.implementation_contract
    };
    if accepts.iter().any(matches_option) {
        Ok(())
    } else {
        Err(PaymentVerificationError::TermsMismatch)
    }
}

/// Resolves the payment's network and checks the chain ids embedded in the
/// witness domain and the authorization against it.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::UnknownNetwork`] for unregistered
/// networks and [`PaymentVerificationError::TermsMismatch`] for chain id
/// disagreement.
pub fn assert_network(
    details: &PaymentDetails,
    registry: &NetworkRegistry,
) -> Result<(), PaymentVerificationError> {
    let network = registry.lookup(&details.network_id)?;
    if details.witness.domain.chain_id != network.chain_id
        || details.authorization.chain_id != network.chain_id
    {
        return Err(PaymentVerificationError::TermsMismatch);
    }
    Ok(())
}

/// Recovers both signatures and checks they come from the same owner.
///
/// The witness signature is recovered against the reconstructed EIP-712
/// hash; the authorization signature against the EIP-7702 hash of the
/// locally re-encoded tuple. A client-supplied `authorizationRlp` must be
/// byte-identical to the local encoding.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidSignature`] on any recovery
/// failure or signer mismatch.
pub fn assert_signatures(
    payload: &SignedPaymentPayload,
) -> Result<Address, PaymentVerificationError> {
    let details = &payload.payment_details;
    let owner = details.witness.message.owner;
    if owner == Address::ZERO {
        return Err(PaymentVerificationError::InvalidPaymentDetails(
            "witness owner is the unsigned placeholder".into(),
        ));
    }

    let witness_hash = witness_signing_hash(&details.witness);
    let witness_signer = recover(&payload.witness_signature, &witness_hash)?;
    if witness_signer != owner {
        return Err(PaymentVerificationError::InvalidSignature(
            "witness signature does not recover to owner".into(),
        ));
    }

    let tuple = AuthorizationTuple::for_details(details);
    if let Some(rlp) = &payload.authorization_rlp
        && rlp.as_ref() != tuple.rlp_bytes()
    {
        return Err(PaymentVerificationError::InvalidSignature(
            "authorization rlp does not match the offered tuple".into(),
        ));
    }
    let authorization_signer = recover(&payload.authorization_signature, &tuple.signing_hash())?;
    if authorization_signer != owner {
        return Err(PaymentVerificationError::InvalidSignature(
            "authorization signature does not recover to owner".into(),
        ));
    }

    Ok(owner)
}

/// Checks that the payment deadline has not passed.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::Expired`].
pub fn assert_not_expired(
    deadline: UnixTimestamp,
    now: UnixTimestamp,
) -> Result<(), PaymentVerificationError> {
    if deadline < now {
        return Err(PaymentVerificationError::Expired);
    }
    Ok(())
}

fn recover(
    signature: &[u8],
    hash: &alloy_primitives::B256,
) -> Result<Address, PaymentVerificationError> {
    let signature = Signature::from_raw(signature)
        .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))?;
    signature
        .recover_address_from_prehash(hash)
        .map_err(|e| PaymentVerificationError::InvalidSignature(e.to_string()))
}
