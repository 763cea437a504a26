//! Checkout orchestrator.
//!
//! Converts a mutable cart into an immutable order as one logical unit of
//! work: reserve stock per line, commit the reservations, persist the order,
//! and clear the cart. If any reservation fails, everything reserved so far
//! is released (in reverse order) before the error reaches the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use thiserror::Error;

use spindle_core::{AlbumId, Owner, UserId};

use crate::db::RepositoryError;
use crate::db::cart::CartRepository;
use crate::db::orders::OrderRepository;
use crate::db::stock::{Reservation, StockError, StockGuard};
use crate::models::{BillingInfo, Order, OrderLine, PaymentSummary};

/// Errors from a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout was attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A line could not be reserved; the shopper can edit the cart and retry.
    #[error("album {0} is out of stock")]
    OutOfStock(AlbumId),

    /// A reservation failed for a reason other than stock exhaustion.
    #[error("stock error: {0}")]
    Stock(StockError),

    /// Order persistence failed after stock was already committed.
    ///
    /// Fatal: the decrements are permanent but no order exists. Logged with
    /// full detail for manual reconciliation and surfaced as a server error.
    #[error("order persistence failed after stock commit: {0}")]
    Inconsistency(#[source] RepositoryError),

    /// Database error outside the reservation loop.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Orchestrates cart-to-order checkout.
///
/// Holds one async lock per user so checkout is never re-entered for the
/// same cart: a concurrent second call serializes behind the first and then
/// observes the emptied cart.
pub struct CheckoutService {
    pool: SqlitePool,
    locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CheckoutService {
    /// Create a new checkout service.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Check out a user's cart into a persisted order.
    ///
    /// Anonymous checkout is not permitted: the owner is a `UserId` by
    /// construction. Payment and billing data arrive already validated.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `CheckoutError::OutOfStock`
    /// for retryable conditions, and `CheckoutError::Inconsistency` when the
    /// order could not be persisted after stock was committed.
    pub async fn checkout(
        &self,
        user_id: UserId,
        payment: &PaymentSummary,
        billing: &BillingInfo,
    ) -> Result<Order, CheckoutError> {
        let _guard = self.owner_lock(user_id).lock_owned().await;

        let owner = Owner::User(user_id);
        let cart = CartRepository::new(&self.pool).get_cart(&owner).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Reserve in a stable order so lock acquisition on stock rows can
        // never deadlock between concurrent checkouts.
        let mut lines = cart.items;
        lines.sort_by_key(|line| line.album_id);

        let stock = StockGuard::new(&self.pool);
        let mut reserved: Vec<Reservation> = Vec::with_capacity(lines.len());
        for line in &lines {
            match stock.reserve(line.album_id, line.quantity).await {
                Ok(reservation) => reserved.push(reservation),
                Err(err) => {
                    release_all(&stock, reserved).await;
                    return Err(match err {
                        StockError::OutOfStock(album_id) => CheckoutError::OutOfStock(album_id),
                        other => CheckoutError::Stock(other),
                    });
                }
            }
        }

        // Every line is reserved; make the decrements permanent and build the
        // order lines from the prices captured at reservation time.
        let items: Vec<OrderLine> = lines
            .iter()
            .zip(reserved.into_iter().map(|r| stock.commit(r)))
            .map(|(line, committed)| OrderLine {
                album_id: committed.album_id,
                title: line.title.clone(),
                artist: line.artist.clone(),
                quantity: committed.quantity,
                unit_price: committed.unit_price,
                line_total: committed.unit_price.line_total(committed.quantity),
            })
            .collect();

        let committed_lines: Vec<(AlbumId, i64)> = items
            .iter()
            .map(|line| (line.album_id, line.quantity))
            .collect();

        match OrderRepository::new(&self.pool)
            .create(user_id, items, payment, billing)
            .await
        {
            Ok(order) => {
                tracing::info!(
                    user_id = %user_id,
                    order_number = %order.order_number,
                    total = %order.total,
                    "checkout completed"
                );
                Ok(order)
            }
            Err(err) => {
                // Stock is already decremented with no order to show for it.
                tracing::error!(
                    user_id = %user_id,
                    error = %err,
                    committed_lines = ?committed_lines,
                    "order persistence failed after stock commit; manual stock reconciliation required"
                );
                Err(CheckoutError::Inconsistency(err))
            }
        }
    }

    /// The async lock for one user's checkout.
    fn owner_lock(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(locks.entry(user_id).or_default())
    }
}

/// Release reservations in reverse acquisition order (best effort).
async fn release_all(stock: &StockGuard<'_>, mut reserved: Vec<Reservation>) {
    while let Some(reservation) = reserved.pop() {
        let album_id = reservation.album_id();
        if let Err(err) = stock.release(reservation).await {
            tracing::error!(
                album_id = %album_id,
                error = %err,
                "failed to release reservation during checkout rollback"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_core::Price;
    use crate::db::catalog::AlbumRepository;
    use crate::db::testing::{memory_pool, seed_album};

    fn payment() -> PaymentSummary {
        PaymentSummary::Check {
            check_number: "900".to_owned(),
        }
    }

    fn billing() -> BillingInfo {
        BillingInfo {
            address: "Abbey Road 3".to_owned(),
            city: "London".to_owned(),
            zip_code: "90210".to_owned(),
            phone: "03-1234567".to_owned(),
        }
    }

    async fn stock_of(pool: &SqlitePool, id: AlbumId) -> i64 {
        AlbumRepository::new(pool)
            .get(id)
            .await
            .expect("get album")
            .expect("album exists")
            .stock
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_clears_cart() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Waltz for Debby", "Bill Evans", 1000, 5).await;
        let b = seed_album(&pool, "Sunday at the Village Vanguard", "Bill Evans", 500, 5).await;
        let user = UserId::new(1);
        let owner = Owner::User(user);

        let carts = CartRepository::new(&pool);
        carts.add_line(&owner, a, 2).await.expect("add");
        carts.add_line(&owner, b, 1).await.expect("add");

        let service = CheckoutService::new(pool.clone());
        let order = service
            .checkout(user, &payment(), &billing())
            .await
            .expect("checkout");

        assert_eq!(order.total, Price::from_cents(2500));
        assert_eq!(order.items.len(), 2);
        assert_eq!(stock_of(&pool, a).await, 3);
        assert_eq!(stock_of(&pool, b).await, 4);
        assert!(carts.get_cart(&owner).await.expect("cart").is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_fails() {
        let pool = memory_pool().await;
        let service = CheckoutService::new(pool);

        let err = service
            .checkout(UserId::new(2), &payment(), &billing())
            .await
            .expect_err("nothing to order");
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_price_is_captured_at_checkout_not_cart_add() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Chet Baker Sings", "Chet Baker", 1000, 5).await;
        let user = UserId::new(3);
        let owner = Owner::User(user);

        CartRepository::new(&pool)
            .add_line(&owner, a, 1)
            .await
            .expect("add");

        // Reprice between cart-add and checkout: the order captures the new
        // price (reservation time), not the price at add time.
        sqlx::query("UPDATE albums SET price_cents = 1500 WHERE id = ?1")
            .bind(a)
            .execute(&pool)
            .await
            .expect("reprice");

        let order = CheckoutService::new(pool.clone())
            .checkout(user, &payment(), &billing())
            .await
            .expect("checkout");
        assert_eq!(order.total, Price::from_cents(1500));

        // A reprice after checkout leaves the order untouched.
        sqlx::query("UPDATE albums SET price_cents = 9900 WHERE id = ?1")
            .bind(a)
            .execute(&pool)
            .await
            .expect("reprice again");
        let fetched = OrderRepository::new(&pool)
            .get(order.id)
            .await
            .expect("get")
            .expect("order");
        assert_eq!(fetched.total, Price::from_cents(1500));
    }

    #[tokio::test]
    async fn test_failed_line_releases_earlier_reservations() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Ella and Louis", "Ella Fitzgerald", 1000, 5).await;
        let b = seed_album(&pool, "Mack the Knife", "Ella Fitzgerald", 800, 1).await;
        let user = UserId::new(4);
        let owner = Owner::User(user);

        let carts = CartRepository::new(&pool);
        carts.add_line(&owner, a, 2).await.expect("add");
        carts.add_line(&owner, b, 3).await.expect("add"); // only 1 in stock

        let err = CheckoutService::new(pool.clone())
            .checkout(user, &payment(), &billing())
            .await
            .expect_err("b cannot be reserved");
        assert!(matches!(err, CheckoutError::OutOfStock(id) if id == b));

        // A's reservation was rolled back and the cart is untouched.
        assert_eq!(stock_of(&pool, a).await, 5);
        assert_eq!(stock_of(&pool, b).await, 1);
        assert_eq!(carts.get_cart(&owner).await.expect("cart").item_count, 2);
    }

    #[tokio::test]
    async fn test_two_buyers_race_for_last_unit() {
        let pool = memory_pool().await;
        let x = seed_album(&pool, "Getz/Gilberto", "Stan Getz", 2000, 1).await;
        let carts = CartRepository::new(&pool);

        let alice = UserId::new(10);
        let bob = UserId::new(11);
        carts.add_line(&Owner::User(alice), x, 1).await.expect("add");
        carts.add_line(&Owner::User(bob), x, 1).await.expect("add");

        let service = Arc::new(CheckoutService::new(pool.clone()));
        let (left, right) = tokio::join!(
            {
                let service = Arc::clone(&service);
                async move { service.checkout(alice, &payment(), &billing()).await }
            },
            {
                let service = Arc::clone(&service);
                async move { service.checkout(bob, &payment(), &billing()).await }
            }
        );

        let outcomes = [left, right];
        let orders = outcomes.iter().filter(|r| r.is_ok()).count();
        let sold_out = outcomes
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::OutOfStock(id)) if *id == x))
            .count();

        assert_eq!(orders, 1);
        assert_eq!(sold_out, 1);
        assert_eq!(stock_of(&pool, x).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_checkout_same_user_yields_one_order() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Brilliant Corners", "Thelonious Monk", 1200, 10).await;
        let user = UserId::new(20);

        CartRepository::new(&pool)
            .add_line(&Owner::User(user), a, 1)
            .await
            .expect("add");

        let service = Arc::new(CheckoutService::new(pool.clone()));
        let (left, right) = tokio::join!(
            {
                let service = Arc::clone(&service);
                async move { service.checkout(user, &payment(), &billing()).await }
            },
            {
                let service = Arc::clone(&service);
                async move { service.checkout(user, &payment(), &billing()).await }
            }
        );

        let outcomes = [left, right];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(CheckoutError::EmptyCart)))
                .count(),
            1
        );
        // Exactly one unit was sold.
        assert_eq!(stock_of(&pool, a).await, 9);

        let orders = OrderRepository::new(&pool)
            .list_for_user(user)
            .await
            .expect("list");
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_oversell_never_happens_under_many_buyers() {
        let pool = memory_pool().await;
        let x = seed_album(&pool, "Mysterioso", "Thelonious Monk", 1500, 3).await;
        let carts = CartRepository::new(&pool);

        let buyers: Vec<UserId> = (100..108).map(UserId::new).collect();
        for &buyer in &buyers {
            carts.add_line(&Owner::User(buyer), x, 1).await.expect("add");
        }

        let service = Arc::new(CheckoutService::new(pool.clone()));
        let mut handles = Vec::new();
        for &buyer in &buyers {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.checkout(buyer, &payment(), &billing()).await
            }));
        }

        let mut orders = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.expect("task") {
                Ok(_) => orders += 1,
                Err(CheckoutError::OutOfStock(_)) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(orders, 3);
        assert_eq!(sold_out, 5);
        assert_eq!(stock_of(&pool, x).await, 0);
    }
}
