//! Server-side payment offer generation.
//!
//! A resource server configures the payment options it accepts and uses
//! [`PaymentRequiredBuilder`] to mint a fresh 402 body for every unpaid
//! request: fresh random payment id, fresh deadline, fresh per-recipient
//! nonce. Offers are never reused, so a replayed offer can never be
//! satisfied twice.

use alloy_primitives::{Address, B256};
use dashmap::DashMap;
use q402::networks::NetworkRegistry;
use q402::proto::{
    PaymentDetails, PaymentRequiredResponse, PaymentScheme, PaymentVerificationError,
    TokenAmount, U64String, UnixTimestamp, UnsignedAuthorization, WitnessDomain, WitnessMessage,
    WitnessTypedData, X402Version1,
};
use rand::Rng;

use crate::witness::{WITNESS_DOMAIN_NAME, WITNESS_DOMAIN_VERSION};

/// How long a freshly minted offer stays signable, in seconds.
pub const OFFER_VALIDITY_SECS: u64 = 900;

/// One payment option a resource server is willing to accept.
#[derive(Debug, Clone)]
pub struct PaymentOptionConfig {
    /// Network the payment must settle on.
    pub network_id: String,
    /// Token to pay with; `None` uses the network's default token.
    pub token: Option<Address>,
    /// Amount in the token's smallest unit.
    pub amount: TokenAmount,
    /// Payment recipient.
    pub to: Address,
    /// Delegate implementation contract executing the transfer.
    pub implementation_contract: Address,
}

/// Builds fresh `402 Payment Required` bodies from configured options.
///
/// The builder is the only stateful part of the server side: it keeps a
/// per-recipient nonce counter so two offers to the same recipient never
/// carry the same (`paymentId`, `nonce`) pair even within one clock second.
#[derive(Debug)]
pub struct PaymentRequiredBuilder {
    registry: NetworkRegistry,
    nonces: DashMap<Address, u64>,
}

impl PaymentRequiredBuilder {
    /// Creates a builder resolving networks through the given registry.
    #[must_use]
    pub fn new(registry: NetworkRegistry) -> Self {
        Self {
            registry,
            nonces: DashMap::new(),
        }
    }

    /// Mints a fresh 402 response body for the given options.
    ///
    /// Every call produces a new random 32-byte payment id and a deadline of
    /// now plus [`OFFER_VALIDITY_SECS`]. The witness `owner` is the zero
    /// address placeholder; clients substitute their own address before
    /// signing.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentVerificationError::UnknownNetwork`] if an option
    /// names an unregistered network, or
    /// [`PaymentVerificationError::InvalidPaymentDetails`] if an option has
    /// no token and the network has no default.
    pub fn build_payment_required(
        &self,
        options: &[PaymentOptionConfig],
    ) -> Result<PaymentRequiredResponse, PaymentVerificationError> {
        let accepts = options
            .iter()
            .map(|option| self.build_details(option))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PaymentRequiredResponse {
            x402_version: X402Version1,
            accepts,
            error: None,
        })
    }

    /// Builds a single fresh payment option.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_payment_required`].
    pub fn build_details(
        &self,
        option: &PaymentOptionConfig,
    ) -> Result<PaymentDetails, PaymentVerificationError> {
        let network = self.registry.lookup(&option.network_id)?;
        let token = option.token.or(network.default_token).ok_or_else(|| {
            PaymentVerificationError::InvalidPaymentDetails(format!(
                "no token configured and no default token on {}",
                network.name
            ))
        })?;

        let payment_id = B256::from(rand::rng().random::<[u8; 32]>());
        let deadline = UnixTimestamp::now() + OFFER_VALIDITY_SECS;
        let nonce = self.next_nonce(option.to);

        let message = WitnessMessage {
            owner: Address::ZERO,
            token,
            amount: option.amount,
            to: option.to,
            deadline,
            payment_id,
            nonce: U64String::from(nonce),
        };
        let domain = WitnessDomain {
            name: WITNESS_DOMAIN_NAME.to_owned(),
            version: WITNESS_DOMAIN_VERSION.to_owned(),
            chain_id: network.chain_id,
            verifying_contract: option.implementation_contract,
        };

        Ok(PaymentDetails {
            scheme: PaymentScheme::Eip7702Delegated,
            network_id: option.network_id.clone(),
            token,
            amount: option.amount,
            to: option.to,
            implementation_contract: option.implementation_contract,
            witness: WitnessTypedData::new(domain, message),
            authorization: UnsignedAuthorization {
                chain_id: network.chain_id,
                address: option.implementation_contract,
                nonce: 0,
            },
        })
    }

    fn next_nonce(&self, recipient: Address) -> u64 {
        let mut entry = self.nonces.entry(recipient).or_insert(0);
        let nonce = *entry;
        *entry += 1;
        nonce
    }
}
