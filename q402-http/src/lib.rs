//! Axum/tower payment gate middleware for the q402 protocol.
//!
//! Wraps a route so that requests must carry a valid `X-PAYMENT` proof:
//!
//! - no header: `402 Payment Required` with a fresh offer in the JSON body
//! - undecodable header: `400 Bad Request`
//! - rejected proof: 402 naming the rejection reason
//! - accepted proof: the handler runs, the payment settles, and the
//!   settlement receipt travels back in `X-PAYMENT-RESPONSE`
//!
//! # Example
//!
//! ```ignore
//! use q402::networks::NetworkRegistry;
//! use q402_http::PaymentGateLayer;
//!
//! let layer = PaymentGateLayer::new(NetworkRegistry::default(), accepts, settler);
//! let app = axum::Router::new()
//!     .route("/premium", axum::routing::get(handler))
//!     .route_layer(layer);
//! ```

pub mod error;
pub mod layer;
pub mod paygate;

pub use error::PaygateError;
pub use layer::{PaymentGateLayer, PaymentGateService};
pub use paygate::{Paygate, X_PAYMENT, X_PAYMENT_RESPONSE};
