//! Core types for the q402 payment protocol.
//!
//! q402 lets an HTTP server demand payment for a resource and lets a client
//! satisfy that demand with a single signed, gas-sponsored authorization
//! instead of an on-chain transaction. The server answers an unpaid request
//! with `402 Payment Required` and a list of acceptable payment options; the
//! client picks one, signs a domain-separated witness plus a delegated
//! execution authorization, and retries with the proof in the `X-PAYMENT`
//! header.
//!
//! This crate is the chain-agnostic core: wire types, the negotiation model,
//! the base64 envelope codec, the canonical RLP codec for authorization
//! tuples, the network registry, and the protocol error taxonomy. Signing
//! and verification for EVM chains live in `q402-evm`; the axum payment
//! gate lives in `q402-http`.
//!
//! # Modules
//!
//! - [`codec`] - Base64 envelope encoding of wire payloads
//! - [`networks`] - Registry of supported networks and their chain parameters
//! - [`proto`] - Wire format types and the payment selection rule
//! - [`rlp`] - Canonical RLP encoding of the delegated-execution tuple
//! - [`timestamp`] - Unix timestamps for payment deadlines

pub mod codec;
pub mod networks;
pub mod proto;
pub mod rlp;
pub mod timestamp;
