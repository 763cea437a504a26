//! Stock guard: atomic reserve/release/commit over the album stock counter.
//!
//! `reserve` is the single place oversell is prevented: the check and the
//! decrement happen in one conditional UPDATE, so two buyers racing for the
//! last unit can never both succeed. A successful reserve yields a
//! [`Reservation`] token that must be either committed or released; the token
//! is not `Clone` and both operations consume it, so double-release and
//! release-after-commit are unrepresentable.

use sqlx::SqlitePool;
use thiserror::Error;

use spindle_core::{AlbumId, Price};

/// Errors from stock guard operations.
#[derive(Debug, Error)]
pub enum StockError {
    /// Requested quantity was zero or negative.
    #[error("invalid reservation quantity: {0}")]
    InvalidQuantity(i64),

    /// The album does not exist.
    #[error("album {0} not found")]
    NotFound(AlbumId),

    /// Not enough stock (or the album is disabled).
    #[error("album {0} is out of stock")]
    OutOfStock(AlbumId),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A provisional stock decrement.
///
/// Holds the unit price captured in the same atomic statement as the
/// decrement; checkout locks prices at reservation time, not cart-add time.
#[derive(Debug)]
pub struct Reservation {
    album_id: AlbumId,
    quantity: i64,
    unit_price: Price,
}

impl Reservation {
    /// The reserved album.
    #[must_use]
    pub const fn album_id(&self) -> AlbumId {
        self.album_id
    }

    /// The reserved quantity.
    #[must_use]
    pub const fn quantity(&self) -> i64 {
        self.quantity
    }

    /// The unit price captured at reservation time.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        self.unit_price
    }
}

/// A reservation made permanent; the decrement can no longer be released.
#[derive(Debug)]
pub struct CommittedReservation {
    pub album_id: AlbumId,
    pub quantity: i64,
    pub unit_price: Price,
}

/// Guard over the album stock counter.
///
/// The only component allowed to mutate `albums.stock`.
pub struct StockGuard<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StockGuard<'a> {
    /// Create a new stock guard.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Atomically reserve `quantity` units of an album.
    ///
    /// Checks `stock >= quantity` and decrements in one statement; if stock
    /// reaches zero the availability flag flips in the same statement. The
    /// current unit price is returned with the decrement so the price
    /// snapshot and the reservation are one atomic step.
    ///
    /// # Errors
    ///
    /// Returns `StockError::InvalidQuantity` for `quantity <= 0`,
    /// `StockError::NotFound` if the album does not exist, and
    /// `StockError::OutOfStock` if stock is insufficient or the album is
    /// disabled.
    pub async fn reserve(
        &self,
        album_id: AlbumId,
        quantity: i64,
    ) -> Result<Reservation, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let row = sqlx::query_as::<_, (i64,)>(
            r"
            UPDATE albums
            SET stock = stock - ?1,
                available = CASE WHEN stock - ?1 > 0 THEN available ELSE 0 END,
                updated_at = ?3
            WHERE id = ?2 AND available = 1 AND stock >= ?1
            RETURNING price_cents
            ",
        )
        .bind(quantity)
        .bind(album_id)
        .bind(chrono::Utc::now())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some((price_cents,)) => Ok(Reservation {
                album_id,
                quantity,
                unit_price: Price::from_cents(price_cents),
            }),
            None => {
                // Zero rows: either the album is missing or the guard failed.
                let exists = sqlx::query_as::<_, (i64,)>("SELECT id FROM albums WHERE id = ?1")
                    .bind(album_id)
                    .fetch_optional(self.pool)
                    .await?
                    .is_some();
                if exists {
                    Err(StockError::OutOfStock(album_id))
                } else {
                    Err(StockError::NotFound(album_id))
                }
            }
        }
    }

    /// Undo a reservation, restoring the decremented quantity.
    ///
    /// Availability is restored when stock rises above zero. Used when a
    /// checkout attempt fails partway and earlier reservations must be
    /// rolled back.
    ///
    /// # Errors
    ///
    /// Returns `StockError::NotFound` if the album row has vanished, and
    /// `StockError::Database` for other database errors.
    pub async fn release(&self, reservation: Reservation) -> Result<(), StockError> {
        let result = sqlx::query(
            r"
            UPDATE albums
            SET stock = stock + ?1,
                available = CASE WHEN stock + ?1 > 0 THEN 1 ELSE available END,
                updated_at = ?3
            WHERE id = ?2
            ",
        )
        .bind(reservation.quantity)
        .bind(reservation.album_id)
        .bind(chrono::Utc::now())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StockError::NotFound(reservation.album_id));
        }

        Ok(())
    }

    /// Make a reservation permanent.
    ///
    /// The stock decrement already happened in `reserve`; committing only
    /// consumes the token so the reservation can no longer be released.
    #[must_use]
    pub fn commit(&self, reservation: Reservation) -> CommittedReservation {
        CommittedReservation {
            album_id: reservation.album_id,
            quantity: reservation.quantity,
            unit_price: reservation.unit_price,
        }
    }
}
