//! Cart store and reconciler.
//!
//! Lines are keyed by (owner, album): adding an album an owner already has
//! bumps the existing line's quantity inside the store, never in callers.
//! Reading a cart never checks stock; the checkout pipeline is the only
//! stock gate, so casual browsing can't fail on transient stock races.

use chrono::Utc;
use sqlx::SqlitePool;

use spindle_core::{AlbumId, CartLineId, Owner, Price, SessionKey, UserId};

use super::RepositoryError;
use crate::models::{Cart, CartLine};

/// Internal row type for cart line queries (joined with albums).
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i64,
    album_id: i64,
    title: String,
    artist: String,
    price_cents: i64,
    quantity: i64,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let unit_price = Price::from_cents(row.price_cents);
        Self {
            id: CartLineId::new(row.id),
            album_id: AlbumId::new(row.album_id),
            title: row.title,
            artist: row.artist,
            unit_price,
            quantity: row.quantity,
            line_total: unit_price.line_total(row.quantity),
        }
    }
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an owner's cart, priced at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_cart(&self, owner: &Owner) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT cl.id, cl.album_id, a.title, a.artist, a.price_cents, cl.quantity
            FROM cart_lines cl
            JOIN albums a ON a.id = cl.album_id
            WHERE cl.owner_kind = ?1 AND cl.owner_key = ?2
            ORDER BY cl.created_at ASC, cl.id ASC
            ",
        )
        .bind(owner.kind())
        .bind(owner.key())
        .fetch_all(self.pool)
        .await?;

        Ok(Cart::from_lines(rows.into_iter().map(CartLine::from).collect()))
    }

    /// Add `quantity` of an album to an owner's cart.
    ///
    /// If the owner already has a line for this album, the quantity is added
    /// to the existing line (upsert); a duplicate line is never created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the album does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn add_line(
        &self,
        owner: &Owner,
        album_id: AlbumId,
        quantity: i64,
    ) -> Result<CartLine, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, (i64,)>(
            r"
            INSERT INTO cart_lines (owner_kind, owner_key, album_id, quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT (owner_kind, owner_key, album_id)
            DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
            RETURNING id
            ",
        )
        .bind(owner.kind())
        .bind(owner.key())
        .bind(album_id)
        .bind(quantity)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        self.get_line(owner, CartLineId::new(row.0)).await
    }

    /// Set the quantity of a line the owner holds.
    ///
    /// The ownership check is part of the mutation: updating a line that does
    /// not belong to `owner` affects zero rows and reports `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist or is
    /// not owned by `owner`.
    pub async fn set_line_quantity(
        &self,
        owner: &Owner,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<CartLine, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_lines
            SET quantity = ?1, updated_at = ?2
            WHERE id = ?3 AND owner_kind = ?4 AND owner_key = ?5
            ",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(line_id)
        .bind(owner.kind())
        .bind(owner.key())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_line(owner, line_id).await
    }

    /// Remove a line the owner holds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist or is
    /// not owned by `owner`.
    pub async fn remove_line(
        &self,
        owner: &Owner,
        line_id: CartLineId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_lines
            WHERE id = ?1 AND owner_kind = ?2 AND owner_key = ?3
            ",
        )
        .bind(line_id)
        .bind(owner.kind())
        .bind(owner.key())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Delete every line the owner holds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, owner: &Owner) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_lines WHERE owner_kind = ?1 AND owner_key = ?2")
            .bind(owner.kind())
            .bind(owner.key())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Merge an anonymous session cart into a user's cart.
    ///
    /// For albums present in both carts the quantities are summed; remaining
    /// session lines are re-owned to the user. Runs once at login; a second
    /// call observes zero session lines and does nothing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn merge_into_user(
        &self,
        session: &SessionKey,
        user_id: UserId,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let user_key = user_id.to_string();
        let mut tx = self.pool.begin().await?;

        // Sum quantities into the user's existing lines for shared albums.
        sqlx::query(
            r"
            UPDATE cart_lines
            SET quantity = quantity + (
                    SELECT s.quantity FROM cart_lines AS s
                    WHERE s.owner_kind = 'session' AND s.owner_key = ?1
                      AND s.album_id = cart_lines.album_id
                ),
                updated_at = ?3
            WHERE owner_kind = 'user' AND owner_key = ?2
              AND album_id IN (
                  SELECT album_id FROM cart_lines
                  WHERE owner_kind = 'session' AND owner_key = ?1
              )
            ",
        )
        .bind(session.as_str())
        .bind(&user_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Drop the session lines that were just merged away.
        sqlx::query(
            r"
            DELETE FROM cart_lines
            WHERE owner_kind = 'session' AND owner_key = ?1
              AND album_id IN (
                  SELECT album_id FROM cart_lines
                  WHERE owner_kind = 'user' AND owner_key = ?2
              )
            ",
        )
        .bind(session.as_str())
        .bind(&user_key)
        .execute(&mut *tx)
        .await?;

        // Re-own the lines unique to the session cart.
        sqlx::query(
            r"
            UPDATE cart_lines
            SET owner_kind = 'user', owner_key = ?2, updated_at = ?3
            WHERE owner_kind = 'session' AND owner_key = ?1
            ",
        )
        .bind(session.as_str())
        .bind(&user_key)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Fetch one joined line scoped to its owner.
    async fn get_line(
        &self,
        owner: &Owner,
        line_id: CartLineId,
    ) -> Result<CartLine, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT cl.id, cl.album_id, a.title, a.artist, a.price_cents, cl.quantity
            FROM cart_lines cl
            JOIN albums a ON a.id = cl.album_id
            WHERE cl.id = ?1 AND cl.owner_kind = ?2 AND cl.owner_key = ?3
            ",
        )
        .bind(line_id)
        .bind(owner.kind())
        .bind(owner.key())
        .fetch_optional(self.pool)
        .await?;

        row.map(CartLine::from).ok_or(RepositoryError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{memory_pool, seed_album};

    fn session_owner() -> Owner {
        Owner::Session(SessionKey::new("sess_test"))
    }

    fn user_owner(id: i64) -> Owner {
        Owner::User(UserId::new(id))
    }

    #[tokio::test]
    async fn test_add_twice_increments_single_line() {
        let pool = memory_pool().await;
        let album = seed_album(&pool, "Kind of Blue", "Miles Davis", 1999, 10).await;
        let repo = CartRepository::new(&pool);
        let owner = session_owner();

        repo.add_line(&owner, album, 2).await.expect("first add");
        repo.add_line(&owner, album, 3).await.expect("second add");

        let cart = repo.get_cart(&owner).await.expect("get cart");
        assert_eq!(cart.item_count, 1);
        assert_eq!(cart.items.first().expect("one line").quantity, 5);
    }

    #[tokio::test]
    async fn test_add_unknown_album_is_not_found() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);

        let err = repo
            .add_line(&session_owner(), AlbumId::new(999), 1)
            .await
            .expect_err("album does not exist");
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_cart_totals_follow_current_prices() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "A Love Supreme", "John Coltrane", 1000, 10).await;
        let b = seed_album(&pool, "Giant Steps", "John Coltrane", 500, 10).await;
        let repo = CartRepository::new(&pool);
        let owner = session_owner();

        repo.add_line(&owner, a, 2).await.expect("add a");
        repo.add_line(&owner, b, 1).await.expect("add b");

        let cart = repo.get_cart(&owner).await.expect("get cart");
        assert_eq!(cart.total, Price::from_cents(2500));
    }

    #[tokio::test]
    async fn test_set_quantity_checks_ownership() {
        let pool = memory_pool().await;
        let album = seed_album(&pool, "Moanin'", "Art Blakey", 1500, 10).await;
        let repo = CartRepository::new(&pool);
        let owner = session_owner();
        let other = Owner::Session(SessionKey::new("sess_other"));

        let line = repo.add_line(&owner, album, 1).await.expect("add");

        let err = repo
            .set_line_quantity(&other, line.id, 4)
            .await
            .expect_err("line belongs to someone else");
        assert!(matches!(err, RepositoryError::NotFound));

        // The rightful owner can update it.
        let updated = repo
            .set_line_quantity(&owner, line.id, 4)
            .await
            .expect("update own line");
        assert_eq!(updated.quantity, 4);
    }

    #[tokio::test]
    async fn test_remove_line_checks_ownership() {
        let pool = memory_pool().await;
        let album = seed_album(&pool, "Mingus Ah Um", "Charles Mingus", 1200, 10).await;
        let repo = CartRepository::new(&pool);
        let owner = session_owner();

        let line = repo.add_line(&owner, album, 1).await.expect("add");
        let err = repo
            .remove_line(&user_owner(1), line.id)
            .await
            .expect_err("not the owner");
        assert!(matches!(err, RepositoryError::NotFound));

        repo.remove_line(&owner, line.id).await.expect("remove");
        assert!(repo.get_cart(&owner).await.expect("get cart").is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let pool = memory_pool().await;
        let album = seed_album(&pool, "Somethin' Else", "Cannonball Adderley", 999, 10).await;
        let repo = CartRepository::new(&pool);
        let owner = session_owner();

        repo.add_line(&owner, album, 2).await.expect("add");
        repo.clear(&owner).await.expect("clear");
        assert!(repo.get_cart(&owner).await.expect("get cart").is_empty());

        // Clearing an already-empty cart is fine.
        repo.clear(&owner).await.expect("clear again");
    }

    #[tokio::test]
    async fn test_merge_sums_shared_and_moves_unique() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Speak No Evil", "Wayne Shorter", 1000, 10).await;
        let b = seed_album(&pool, "Maiden Voyage", "Herbie Hancock", 800, 10).await;
        let repo = CartRepository::new(&pool);

        let session = SessionKey::new("sess_merge");
        let session_cart = Owner::Session(session.clone());
        let user = UserId::new(42);
        let user_cart = Owner::User(user);

        // Session cart {A:2, B:1}, user cart {A:1}.
        repo.add_line(&session_cart, a, 2).await.expect("add");
        repo.add_line(&session_cart, b, 1).await.expect("add");
        repo.add_line(&user_cart, a, 1).await.expect("add");

        repo.merge_into_user(&session, user).await.expect("merge");

        let merged = repo.get_cart(&user_cart).await.expect("user cart");
        assert_eq!(merged.item_count, 2);
        let qty = |album: AlbumId| {
            merged
                .items
                .iter()
                .find(|line| line.album_id == album)
                .map(|line| line.quantity)
        };
        assert_eq!(qty(a), Some(3));
        assert_eq!(qty(b), Some(1));

        assert!(
            repo.get_cart(&session_cart)
                .await
                .expect("session cart")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let pool = memory_pool().await;
        let a = seed_album(&pool, "Blue Note Sampler", "Various", 700, 10).await;
        let repo = CartRepository::new(&pool);

        let session = SessionKey::new("sess_twice");
        let user = UserId::new(7);

        repo.add_line(&Owner::Session(session.clone()), a, 2)
            .await
            .expect("add");
        repo.merge_into_user(&session, user).await.expect("merge");
        repo.merge_into_user(&session, user).await.expect("merge again");

        let cart = repo.get_cart(&Owner::User(user)).await.expect("user cart");
        assert_eq!(cart.item_count, 1);
        assert_eq!(cart.items.first().expect("line").quantity, 2);
    }

    #[tokio::test]
    async fn test_merge_with_no_session_cart_is_noop() {
        let pool = memory_pool().await;
        let repo = CartRepository::new(&pool);

        repo.merge_into_user(&SessionKey::new("sess_none"), UserId::new(1))
            .await
            .expect("merge empty");
    }
}
