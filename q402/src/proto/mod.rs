//! Protocol types for q402 payment messages.
//!
//! This module defines the wire format types exchanged between clients,
//! resource servers, and facilitators: the payment options advertised in a
//! `402 Payment Required` response, the signed payload a client sends back
//! in the `X-PAYMENT` header, and the verification/settlement results.
//!
//! # Key Types
//!
//! - [`PaymentDetails`] - One acceptable payment option, including the full
//!   EIP-712 typed data the client must sign
//! - [`PaymentRequiredResponse`] - HTTP 402 response body
//! - [`SignedPaymentPayload`] - The proof carried in `X-PAYMENT`
//! - [`VerifyResponse`] - Facilitator verification result
//! - [`SettleReceipt`] - On-chain settlement result
//!
//! # Wire Format
//!
//! All types serialize to JSON using camelCase field names. Integers that
//! can exceed 53 bits (amounts, deadlines, nonces, block numbers) serialize
//! as decimal strings so `JavaScript` peers never lose precision. The
//! protocol version is pinned by the `x402Version` field.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub mod error;

pub use crate::timestamp::UnixTimestamp;
pub use error::{InvalidReason, PaymentVerificationError};

/// Version marker for q402 protocol version 1.
///
/// Serializes as the bare integer `1` and rejects any other value on
/// deserialization, so a payload claiming a different protocol version
/// fails to parse instead of being silently misread.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

impl X402Version1 {
    /// The numeric value of this protocol version.
    pub const VALUE: u8 = 1;
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(deserializer)?;
        if v == Self::VALUE {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected x402Version {}, got {v}",
                Self::VALUE
            )))
        }
    }
}

/// A `u64` value that serializes as a string.
///
/// Some JSON parsers (particularly in `JavaScript`) cannot accurately
/// represent large integers. This type serializes `u64` values as strings
/// to preserve precision across all platforms.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct U64String(u64);

impl U64String {
    /// Returns the inner `u64` value.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl FromStr for U64String {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for U64String {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<U64String> for u64 {
    fn from(value: U64String) -> Self {
        value.0
    }
}

impl Serialize for U64String {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U64String {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
    }
}

/// A token amount in the smallest unit, serialized as a decimal string.
///
/// Token amounts are `uint256` on-chain and routinely exceed 53 bits, so the
/// wire format is a decimal string (e.g. `"1000000"` for 1 USDT at 6
/// decimals).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TokenAmount(pub U256);

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for TokenAmount {
    type Err = alloy_primitives::ruint::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s, 10).map(Self)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The payment scheme identifier.
///
/// Exactly one scheme exists today; the enum keeps the wire field
/// extensible without stringly-typed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PaymentScheme {
    /// Gas-sponsored delegated execution via a signed authorization tuple.
    #[serde(rename = "eip7702-delegated")]
    Eip7702Delegated,
}

impl PaymentScheme {
    /// Returns the wire string for this scheme.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eip7702Delegated => "eip7702-delegated",
        }
    }
}

impl fmt::Display for PaymentScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EIP-712 domain separator fields for the payment witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessDomain {
    /// Domain name, always `"q402"` for this protocol.
    pub name: String,
    /// Domain version, always `"1"` for this protocol.
    pub version: String,
    /// EIP-155 chain ID the witness is bound to.
    pub chain_id: u64,
    /// The delegate contract that will consume the witness.
    pub verifying_contract: Address,
}

/// A single field in an EIP-712 type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessField {
    /// Field name (e.g. "amount").
    pub name: String,
    /// Solidity type name (e.g. "uint256").
    #[serde(rename = "type")]
    pub r#type: String,
}

/// The values the client signs over.
///
/// `owner` is a zero-address placeholder when the server builds the offer;
/// the client substitutes its own address before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessMessage {
    /// The paying wallet. Zero address until the client fills it in.
    pub owner: Address,
    /// ERC-20 token being transferred.
    pub token: Address,
    /// Amount in the token's smallest unit.
    pub amount: TokenAmount,
    /// Payment recipient.
    pub to: Address,
    /// Latest time the authorization remains valid.
    pub deadline: UnixTimestamp,
    /// Server-generated 32-byte unique payment identifier.
    pub payment_id: B256,
    /// Per-recipient anti-collision counter.
    pub nonce: U64String,
}

/// Complete EIP-712 typed data for the payment witness.
///
/// Carried on the wire in full so the client can display and sign exactly
/// what the server will verify, with no schema negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WitnessTypedData {
    /// Domain separator fields.
    pub domain: WitnessDomain,
    /// Type definitions, keyed by type name.
    pub types: BTreeMap<String, Vec<WitnessField>>,
    /// The top-level type to hash, always `"Witness"`.
    pub primary_type: String,
    /// The values being signed.
    pub message: WitnessMessage,
}

impl WitnessTypedData {
    /// The primary type name for payment witnesses.
    pub const PRIMARY_TYPE: &'static str = "Witness";

    /// Builds typed data with the canonical `Witness` schema.
    #[must_use]
    pub fn new(domain: WitnessDomain, message: WitnessMessage) -> Self {
        Self {
            domain,
            types: Self::canonical_types(),
            primary_type: Self::PRIMARY_TYPE.to_owned(),
            message,
        }
    }

    /// Returns the canonical `Witness` type schema.
    #[must_use]
    pub fn canonical_types() -> BTreeMap<String, Vec<WitnessField>> {
        let field = |name: &str, ty: &str| WitnessField {
            name: name.to_owned(),
            r#type: ty.to_owned(),
        };
        let mut types = BTreeMap::new();
        types.insert(
            Self::PRIMARY_TYPE.to_owned(),
            vec![
                field("owner", "address"),
                field("token", "address"),
                field("amount", "uint256"),
                field("to", "address"),
                field("deadline", "uint256"),
                field("paymentId", "bytes32"),
                field("nonce", "uint256"),
            ],
        );
        types
    }
}

/// The EIP-7702 authorization tuple the client must sign, before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedAuthorization {
    /// EIP-155 chain ID the authorization is valid on.
    pub chain_id: u64,
    /// The delegate implementation contract to set as code.
    pub address: Address,
    /// The account nonce for the authorization (0 for fresh wallets).
    pub nonce: u64,
}

/// One acceptable payment option advertised in a 402 response.
///
/// # Invariant
///
/// `witness.message.{token, amount, to}` always equal the outer `token`,
/// `amount`, and `to` fields, so what the user's wallet displays is what the
/// server verifies. [`PaymentDetails::check_witness_binding`] enforces this
/// at build time and again on verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// The payment scheme.
    pub scheme: PaymentScheme,
    /// Human-readable network identifier (e.g. "bsc-testnet").
    pub network_id: String,
    /// ERC-20 token to pay with.
    pub token: Address,
    /// Amount in the token's smallest unit.
    pub amount: TokenAmount,
    /// Payment recipient.
    pub to: Address,
    /// Delegate implementation contract executing the transfer.
    pub implementation_contract: Address,
    /// Full EIP-712 typed data to sign.
    pub witness: WitnessTypedData,
    /// EIP-7702 authorization tuple to sign.
    pub authorization: UnsignedAuthorization,
}

impl PaymentDetails {
    /// Checks that the witness message repeats the outer payment terms.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentVerificationError::InvalidPaymentDetails`] naming
    /// the first field that disagrees.
    pub fn check_witness_binding(&self) -> Result<(), PaymentVerificationError> {
        let message = &self.witness.message;
        if message.token != self.token {
            return Err(PaymentVerificationError::InvalidPaymentDetails(
                "witness token does not match payment token".into(),
            ));
        }
        if message.amount != self.amount {
            return Err(PaymentVerificationError::InvalidPaymentDetails(
                "witness amount does not match payment amount".into(),
            ));
        }
        if message.to != self.to {
            return Err(PaymentVerificationError::InvalidPaymentDetails(
                "witness recipient does not match payment recipient".into(),
            ));
        }
        if self.witness.primary_type != WitnessTypedData::PRIMARY_TYPE {
            return Err(PaymentVerificationError::InvalidPaymentDetails(
                "unexpected witness primary type".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP 402 Payment Required response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// List of acceptable payment options.
    #[serde(default)]
    pub accepts: Vec<PaymentDetails>,
    /// Optional error message naming why a presented payment was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The signed payment proof carried in the `X-PAYMENT` header.
///
/// Travels as a base64 envelope of this JSON (see [`crate::codec`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPaymentPayload {
    /// The payment option being satisfied, with `witness.message.owner`
    /// replaced by the payer's address.
    pub payment_details: PaymentDetails,
    /// 65-byte EIP-712 signature over the witness.
    pub witness_signature: Bytes,
    /// 65-byte signature over the EIP-7702 authorization hash.
    pub authorization_signature: Bytes,
    /// Raw RLP of the authorization tuple, if the client included it.
    ///
    /// When present, verifiers require it to be byte-identical to their own
    /// re-encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_rlp: Option<Bytes>,
}

/// Result returned by a facilitator after verifying a payment proof against
/// the configured payment options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    /// The proof matches the terms and passes all checks.
    Valid {
        /// The address that signed the payment.
        payer: Address,
    },
    /// The proof was decodable but failed verification.
    Invalid {
        /// Machine-readable reason verification failed.
        reason: InvalidReason,
        /// Optional human-readable description of the failure.
        message: Option<String>,
    },
}

impl VerifyResponse {
    /// Constructs a successful verification response.
    #[must_use]
    pub const fn valid(payer: Address) -> Self {
        Self::Valid { payer }
    }

    /// Constructs a failed verification response.
    #[must_use]
    pub const fn invalid(reason: InvalidReason) -> Self {
        Self::Invalid {
            reason,
            message: None,
        }
    }

    /// Returns `true` if the verification succeeded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

impl From<&PaymentVerificationError> for VerifyResponse {
    fn from(err: &PaymentVerificationError) -> Self {
        Self::Invalid {
            reason: err.as_invalid_reason(),
            message: Some(err.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<InvalidReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_message: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: Some(*payer),
                invalid_reason: None,
                invalid_message: None,
            },
            Self::Invalid { reason, message } => VerifyResponseWire {
                is_valid: false,
                payer: None,
                invalid_reason: Some(*reason),
                invalid_message: message.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(Self::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                message: wire.invalid_message,
            })
        }
    }
}

/// Terminal status of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    /// The transaction was included and succeeded.
    Confirmed,
    /// The transaction was included and reverted.
    Failed,
}

/// On-chain settlement result, returned to the client in the
/// `X-PAYMENT-RESPONSE` header as a base64 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleReceipt {
    /// Hash of the settlement transaction.
    pub tx_hash: B256,
    /// Block the transaction was included in.
    pub block_number: U64String,
    /// Whether the transfer succeeded.
    pub status: SettlementStatus,
}

/// Picks the payment option a client should satisfy.
///
/// Returns the first `accepts` entry whose `networkId` matches; `None`
/// means the client cannot pay on any offered network and the negotiation
/// is over.
#[must_use]
pub fn select_payment_details<'a>(
    response: &'a PaymentRequiredResponse,
    network_id: &str,
) -> Option<&'a PaymentDetails> {
    response
        .accepts
        .iter()
        .find(|details| details.network_id == network_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    fn sample_details(network_id: &str) -> PaymentDetails {
        let token = address!("0x337610d27c682E347C9cD60BD4b3b107C9d34dDd");
        let to = address!("0x1111111111111111111111111111111111111111");
        let implementation = address!("0x2222222222222222222222222222222222222222");
        let amount = TokenAmount::from(1_000_000u64);
        let message = WitnessMessage {
            owner: Address::ZERO,
            token,
            amount,
            to,
            deadline: UnixTimestamp::from_secs(1_900_000_000),
            payment_id: b256!("0x0101010101010101010101010101010101010101010101010101010101010101"),
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
            network_id: network_id.into(),
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

    #[test]
    fn payment_required_wire_shape() {
        let response = PaymentRequiredResponse {
            x402_version: X402Version1,
            accepts: vec![sample_details("bsc-testnet")],
            error: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&response).unwrap()).unwrap();
        assert_eq!(json["x402Version"], 1);
        assert_eq!(json["accepts"][0]["scheme"], "eip7702-delegated");
        assert_eq!(json["accepts"][0]["amount"], "1000000");
        assert_eq!(json["accepts"][0]["witness"]["primaryType"], "Witness");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn version_marker_rejects_other_versions() {
        assert!(serde_json::from_str::<X402Version1>("1").is_ok());
        assert!(serde_json::from_str::<X402Version1>("2").is_err());
    }

    #[test]
    fn signed_payload_envelope_round_trip() {
        let payload = SignedPaymentPayload {
            payment_details: sample_details("bsc-testnet"),
            witness_signature: Bytes::from(vec![0x11; 65]),
            authorization_signature: Bytes::from(vec![0x22; 65]),
            authorization_rlp: Some(Bytes::from(vec![0xC0])),
        };
        let envelope = crate::codec::encode_envelope(&payload).unwrap();
        let decoded: SignedPaymentPayload = crate::codec::decode_envelope(&envelope).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn selection_is_first_match_by_network() {
        let response = PaymentRequiredResponse {
            x402_version: X402Version1,
            accepts: vec![sample_details("bsc-mainnet"), sample_details("bsc-testnet")],
            error: None,
        };
        let selected = select_payment_details(&response, "bsc-testnet").unwrap();
        assert_eq!(selected.network_id, "bsc-testnet");
        assert!(select_payment_details(&response, "base").is_none());
    }

    #[test]
    fn witness_binding_catches_amount_drift() {
        let mut details = sample_details("bsc-testnet");
        assert!(details.check_witness_binding().is_ok());
        details.witness.message.amount = TokenAmount::from(2_000_000u64);
        let err = details.check_witness_binding().unwrap_err();
        assert_eq!(
            err.as_invalid_reason(),
            InvalidReason::InvalidPaymentDetails
        );
    }

    #[test]
    fn verify_response_wire_shape() {
        let valid = VerifyResponse::valid(address!("0x1111111111111111111111111111111111111111"));
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&valid).unwrap()).unwrap();
        assert_eq!(json["isValid"], true);
        assert!(json.get("invalidReason").is_none());

        let invalid = VerifyResponse::invalid(InvalidReason::Replayed);
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&invalid).unwrap()).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["invalidReason"], "replayed");

        let back: VerifyResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, invalid);
    }

    #[test]
    fn settle_receipt_wire_shape() {
        let receipt = SettleReceipt {
            tx_hash: b256!("0xabababababababababababababababababababababababababababababababab"),
            block_number: U64String::from(12_345_678),
            status: SettlementStatus::Confirmed,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&receipt).unwrap()).unwrap();
        assert_eq!(json["blockNumber"], "12345678");
        assert_eq!(json["status"], "confirmed");
        assert!(json["txHash"].as_str().unwrap().starts_with("0x"));
    }
}
