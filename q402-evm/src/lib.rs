//! EVM delegated-execution payment scheme for the q402 protocol.
//!
//! This crate implements both sides of the `eip7702-delegated` scheme:
//!
//! - **Client**: [`client::create_payment_header`] signs the EIP-712 witness
//!   and the EIP-7702 authorization tuple and packs them into the
//!   `X-PAYMENT` envelope.
//! - **Server**: [`server::PaymentRequiredBuilder`] produces fresh 402
//!   payment offers with unique payment ids and per-recipient nonces.
//! - **Facilitator**: [`facilitator::DelegatedFacilitator`] verifies inbound
//!   proofs, enforces single use of every payment id, and drives settlement
//!   through an injected [`facilitator::Settler`].
//!
//! The two signatures a client produces live in different hash domains: the
//! witness under EIP-712 ([`witness`]) and the authorization tuple under the
//! EIP-7702 `0x05` prefix ([`authorization`]). A signature from one domain
//! can never validate in the other.

pub mod authorization;
pub mod client;
pub mod facilitator;
pub mod server;
pub mod witness;
