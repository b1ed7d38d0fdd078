//! EIP-7702 authorization tuple signing.
//!
//! Delegated execution requires the payer to sign the tuple
//! `[chain_id, address, nonce]` under the EIP-7702 hash domain:
//! `keccak256(0x05 || rlp(tuple))`. The `0x05` prefix keeps this signature
//! in a domain of its own; it can never collide with an EIP-712 witness
//! signature or a transaction signature.

use alloy_primitives::{Address, B256, keccak256};
use q402::proto::PaymentDetails;
use q402::rlp;

/// Domain prefix byte for EIP-7702 authorization hashes.
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// The EIP-7702 authorization tuple for delegated execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationTuple {
    /// EIP-155 chain ID the authorization is valid on.
    pub chain_id: u64,
    /// The delegate implementation contract.
    pub address: Address,
    /// The payer's account nonce.
    pub nonce: u64,
}

impl AuthorizationTuple {
    /// Builds the tuple a payment option requires the client to sign.
    #[must_use]
    pub const fn for_details(details: &PaymentDetails) -> Self {
        Self {
            chain_id: details.authorization.chain_id,
            address: details.implementation_contract,
            nonce: details.authorization.nonce,
        }
    }

    /// Returns the canonical RLP encoding of this tuple.
    #[must_use]
    pub fn rlp_bytes(&self) -> Vec<u8> {
        rlp::encode_authorization_tuple(self.chain_id, &self.address, self.nonce)
    }

    /// Computes the EIP-7702 signing hash, `keccak256(0x05 || rlp(tuple))`.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let rlp = self.rlp_bytes();
        let mut preimage = Vec::with_capacity(1 + rlp.len());
        preimage.push(AUTHORIZATION_MAGIC);
        preimage.extend_from_slice(&rlp);
        keccak256(preimage)
    }
}
