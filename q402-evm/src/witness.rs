//! EIP-712 witness construction and hashing.
//!
//! The witness is the message a payer's wallet displays and signs. Its hash
//! is computed from the canonical `Witness` struct under the `q402` typed
//! data domain; the facilitator recomputes the same hash from the wire
//! payload, so any drift between what was shown and what is verified breaks
//! the signature.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolStruct, eip712_domain, sol};
use q402::proto::{PaymentDetails, PaymentVerificationError, WitnessDomain, WitnessTypedData};

/// EIP-712 domain name for payment witnesses.
pub const WITNESS_DOMAIN_NAME: &str = "q402";

/// EIP-712 domain version for payment witnesses.
pub const WITNESS_DOMAIN_VERSION: &str = "1";

sol!(
    /// Solidity-compatible struct definition for the payment witness.
    ///
    /// Field order MUST match the schema advertised in
    /// [`WitnessTypedData::canonical_types`], since both sides hash this
    /// struct independently.
    struct Witness {
        address owner;
        address token;
        uint256 amount;
        address to;
        uint256 deadline;
        bytes32 paymentId;
        uint256 nonce;
    }
);

/// Builds the typed data a client signs, substituting its own address for
/// the server's zero-address placeholder.
#[must_use]
pub fn build_witness_typed_data(details: &PaymentDetails, owner: Address) -> WitnessTypedData {
    let mut typed = details.witness.clone();
    typed.message.owner = owner;
    typed
}

/// Computes the EIP-712 signing hash for a payment witness.
#[must_use]
pub fn witness_signing_hash(typed: &WitnessTypedData) -> B256 {
    let domain = sol_domain(&typed.domain);
    let message = &typed.message;
    let witness = Witness {
        owner: message.owner,
        token: message.token,
        amount: message.amount.0,
        to: message.to,
        deadline: U256::from(message.deadline.as_secs()),
        paymentId: message.payment_id,
        nonce: U256::from(message.nonce.inner()),
    };
    witness.eip712_signing_hash(&domain)
}

fn sol_domain(domain: &WitnessDomain) -> alloy_sol_types::Eip712Domain {
    eip712_domain! {
        name: domain.name.clone(),
        version: domain.version.clone(),
        chain_id: domain.chain_id,
        verifying_contract: domain.verifying_contract,
    }
}

/// Runs the structural checks a payment option must pass before any
/// signature is produced or verified.
///
/// # Errors
///
/// Returns [`PaymentVerificationError::InvalidPaymentDetails`] naming the
/// first inconsistency found.
pub fn validate_details(details: &PaymentDetails) -> Result<(), PaymentVerificationError> {
    details.check_witness_binding()?;
    let domain = &details.witness.domain;
    if domain.name != WITNESS_DOMAIN_NAME || domain.version != WITNESS_DOMAIN_VERSION {
        return Err(PaymentVerificationError::InvalidPaymentDetails(
            "unexpected witness domain name or version".into(),
        ));
    }
    if domain.verifying_contract != details.implementation_contract {
        return Err(PaymentVerificationError::InvalidPaymentDetails(
            "witness domain verifying contract does not match implementation contract".into(),
        ));
    }
    if details.authorization.address != details.implementation_contract {
        return Err(PaymentVerificationError::InvalidPaymentDetails(
            "authorization address does not match implementation contract".into(),
        ));
    }
    if details.authorization.chain_id != domain.chain_id {
        return Err(PaymentVerificationError::InvalidPaymentDetails(
            "authorization chain id does not match witness domain".into(),
        ));
    }
    Ok(())
}
