//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `checkout` - The cart-to-order orchestrator (reserve, commit, persist)
//! - `flow` - The client-facing checkout wizard state machine
//! - `validation` - Billing, payment, and cart input validators

pub mod checkout;
pub mod flow;
pub mod validation;

pub use checkout::{CheckoutError, CheckoutService};
pub use flow::{CheckoutFlow, CheckoutStep, FlowError};
