//! Order repository.
//!
//! Persisting an order is the tail end of the checkout unit of work: the
//! order row, its lines, and the cart clear happen in one transaction, so no
//! partial state is observable. Order numbers are unique by constraint; a
//! generation collision rolls the whole attempt back and retries with a
//! fresh number before anything is visible.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::SqlitePool;

use spindle_core::{AlbumId, OrderId, OrderStatus, Price, UserId};

use super::RepositoryError;
use crate::models::{BillingInfo, Order, OrderLine, PaymentSummary};

/// Attempts to find a free order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    status: String,
    total_cents: i64,
    payment_method: String,
    card_type: Option<String>,
    card_last_four: Option<String>,
    card_expiry_month: Option<i64>,
    card_expiry_year: Option<i64>,
    check_number: Option<String>,
    billing_address: String,
    billing_city: String,
    billing_zip: String,
    billing_phone: String,
    created_at: DateTime<Utc>,
}

/// Internal row type for order line queries (joined with albums).
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    order_id: i64,
    album_id: i64,
    title: String,
    artist: String,
    quantity: i64,
    price_cents: i64,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        let unit_price = Price::from_cents(row.price_cents);
        Self {
            album_id: AlbumId::new(row.album_id),
            title: row.title,
            artist: row.artist,
            quantity: row.quantity,
            unit_price,
            line_total: unit_price.line_total(row.quantity),
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderLine>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self
            .status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        let payment = match self.payment_method.as_str() {
            "credit_card" => {
                let (Some(card_type), Some(last_four), Some(month), Some(year)) = (
                    self.card_type,
                    self.card_last_four,
                    self.card_expiry_month,
                    self.card_expiry_year,
                ) else {
                    return Err(RepositoryError::DataCorruption(format!(
                        "order {} is missing credit card fields",
                        self.id
                    )));
                };
                PaymentSummary::CreditCard {
                    card_type: card_type
                        .parse()
                        .map_err(RepositoryError::DataCorruption)?,
                    last_four,
                    expiry_month: u8::try_from(month).map_err(|_| {
                        RepositoryError::DataCorruption(format!("invalid expiry month: {month}"))
                    })?,
                    expiry_year: u16::try_from(year).map_err(|_| {
                        RepositoryError::DataCorruption(format!("invalid expiry year: {year}"))
                    })?,
                }
            }
            "check" => {
                let Some(check_number) = self.check_number else {
                    return Err(RepositoryError::DataCorruption(format!(
                        "order {} is missing a check number",
                        self.id
                    )));
                };
                PaymentSummary::Check { check_number }
            }
            other => {
                return Err(RepositoryError::DataCorruption(format!(
                    "invalid payment method: {other}"
                )));
            }
        };

        Ok(Order {
            id: OrderId::new(self.id),
            order_number: self.order_number,
            user_id: UserId::new(self.user_id),
            status,
            items,
            total: Price::from_cents(self.total_cents),
            payment,
            billing: BillingInfo {
                address: self.billing_address,
                city: self.billing_city,
                zip_code: self.billing_zip,
                phone: self.billing_phone,
            },
            created_at: self.created_at,
        })
    }
}

/// Generate a candidate order number.
///
/// Human-readable: a millisecond timestamp plus a random base-36 suffix.
/// Uniqueness is enforced by the database constraint, not this scheme.
fn next_order_number() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| {
            char::from_digit(rng.random_range(0..36), 36)
                .unwrap_or('0')
                .to_ascii_uppercase()
        })
        .collect();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Repository for order persistence and reads.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist an order and clear the user's cart in one transaction.
    ///
    /// The total is recomputed from the captured line subtotals; client input
    /// never reaches it. Called by the checkout orchestrator after stock has
    /// been committed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free order number was found
    /// after several attempts, and `RepositoryError::Database` for other
    /// database errors.
    pub async fn create(
        &self,
        user_id: UserId,
        items: Vec<OrderLine>,
        payment: &PaymentSummary,
        billing: &BillingInfo,
    ) -> Result<Order, RepositoryError> {
        let total: Price = items.iter().map(|line| line.line_total).sum();
        let status = OrderStatus::Pending;
        let created_at = Utc::now();

        let (card_type, last_four, expiry_month, expiry_year, check_number) = match payment {
            PaymentSummary::CreditCard {
                card_type,
                last_four,
                expiry_month,
                expiry_year,
            } => (
                Some(card_type.to_string()),
                Some(last_four.clone()),
                Some(i64::from(*expiry_month)),
                Some(i64::from(*expiry_year)),
                None,
            ),
            PaymentSummary::Check { check_number } => {
                (None, None, None, None, Some(check_number.clone()))
            }
        };

        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let order_number = next_order_number();
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query_as::<_, (i64,)>(
                r"
                INSERT INTO orders (
                    order_number, user_id, status, total_cents, payment_method,
                    card_type, card_last_four, card_expiry_month, card_expiry_year,
                    check_number, billing_address, billing_city, billing_zip,
                    billing_phone, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                RETURNING id
                ",
            )
            .bind(&order_number)
            .bind(user_id)
            .bind(status.to_string())
            .bind(total.to_cents())
            .bind(payment.method().to_string())
            .bind(&card_type)
            .bind(&last_four)
            .bind(expiry_month)
            .bind(expiry_year)
            .bind(&check_number)
            .bind(&billing.address)
            .bind(&billing.city)
            .bind(&billing.zip_code)
            .bind(&billing.phone)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await;

            let (order_id,) = match inserted {
                Ok(row) => row,
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    // Order number collision: retry with a fresh number.
                    drop(tx);
                    continue;
                }
                Err(e) => return Err(RepositoryError::Database(e)),
            };

            for line in &items {
                sqlx::query(
                    r"
                    INSERT INTO order_lines (order_id, album_id, quantity, price_cents)
                    VALUES (?1, ?2, ?3, ?4)
                    ",
                )
                .bind(order_id)
                .bind(line.album_id)
                .bind(line.quantity)
                .bind(line.unit_price.to_cents())
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM cart_lines WHERE owner_kind = 'user' AND owner_key = ?1")
                .bind(user_id.to_string())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            return Ok(Order {
                id: OrderId::new(order_id),
                order_number,
                user_id,
                status,
                items,
                total,
                payment: payment.clone(),
                billing: billing.clone(),
                created_at,
            });
        }

        Err(RepositoryError::Conflict(
            "could not allocate a unique order number".to_owned(),
        ))
    }

    /// Get an order by id.
    ///
    /// Ownership is the caller's concern (the route maps a mismatched user
    /// to `Forbidden`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, and
    /// `RepositoryError::DataCorruption` if stored payment or status data is
    /// invalid.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_number, user_id, status, total_cents, payment_method,
                   card_type, card_last_four, card_expiry_month, card_expiry_year,
                   check_number, billing_address, billing_city, billing_zip,
                   billing_phone, created_at
            FROM orders
            WHERE id = ?1
            ",
        )
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT ol.order_id, ol.album_id, a.title, a.artist, ol.quantity, ol.price_cents
            FROM order_lines ol
            JOIN albums a ON a.id = ol.album_id
            WHERE ol.order_id = ?1
            ORDER BY ol.id ASC
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let items = lines.into_iter().map(OrderLine::from).collect();
        Ok(Some(row.into_order(items)?))
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, and
    /// `RepositoryError::DataCorruption` if stored payment or status data is
    /// invalid.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_number, user_id, status, total_cents, payment_method,
                   card_type, card_last_four, card_expiry_month, card_expiry_year,
                   check_number, billing_address, billing_city, billing_zip,
                   billing_phone, created_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let line_rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT ol.order_id, ol.album_id, a.title, a.artist, ol.quantity, ol.price_cents
            FROM order_lines ol
            JOIN albums a ON a.id = ol.album_id
            JOIN orders o ON o.id = ol.order_id
            WHERE o.user_id = ?1
            ORDER BY ol.order_id ASC, ol.id ASC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        let mut lines_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for line in line_rows {
            lines_by_order
                .entry(line.order_id)
                .or_default()
                .push(OrderLine::from(line));
        }

        rows.into_iter()
            .map(|row| {
                let items = lines_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }
}
