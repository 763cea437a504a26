//! Domain models for the storefront.

pub mod album;
pub mod cart;
pub mod order;
pub mod session;

pub use album::Album;
pub use cart::{Cart, CartLine};
pub use order::{BillingInfo, Order, OrderLine, PaymentSummary};
pub use session::{CurrentUser, session_keys};
