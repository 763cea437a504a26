//! Session-related types.
//!
//! Types stored in the session for authentication and cart ownership.

use serde::{Deserialize, Serialize};

use spindle_core::UserId;

/// Session-stored user identity.
///
/// The identity provider upstream verifies credentials; only the stable user
/// id is kept in the session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's stable id from the identity provider.
    pub id: UserId,
}

/// Session keys for storefront data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart owner key.
    pub const CART_OWNER: &str = "cart_owner";

    /// Key for the checkout wizard state machine.
    pub const CHECKOUT_FLOW: &str = "checkout_flow";
}
