//! Order models.
//!
//! Orders are immutable snapshots: line prices are captured at reservation
//! time and the total is recomputed from the captured subtotals, never
//! trusted from client input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spindle_core::{AlbumId, CardType, OrderId, OrderStatus, PaymentMethod, Price, UserId};

/// Billing snapshot stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub phone: String,
}

/// Sanitized payment metadata stored on the order.
///
/// Raw card numbers and CVVs never reach this type; validation keeps only
/// the card type, last four digits, and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentSummary {
    CreditCard {
        card_type: CardType,
        last_four: String,
        expiry_month: u8,
        expiry_year: u16,
    },
    Check {
        check_number: String,
    },
}

impl PaymentSummary {
    /// The payment method tag for this summary.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::CreditCard { .. } => PaymentMethod::CreditCard,
            Self::Check { .. } => PaymentMethod::Check,
        }
    }
}

/// One ordered line with its captured price.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub album_id: AlbumId,
    pub title: String,
    pub artist: String,
    pub quantity: i64,
    pub unit_price: Price,
    pub line_total: Price,
}

/// A persisted order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total: Price,
    pub payment: PaymentSummary,
    pub billing: BillingInfo,
    pub created_at: DateTime<Utc>,
}
