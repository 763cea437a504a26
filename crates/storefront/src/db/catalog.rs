//! Album catalog repository.
//!
//! Read-mostly access to the catalog. Stock is deliberately absent from this
//! repository's mutations: the stock counter is only ever touched by the
//! stock guard in `db::stock`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use spindle_core::{AlbumId, Price};

use super::RepositoryError;
use crate::models::Album;

/// Internal row type for album queries.
#[derive(Debug, sqlx::FromRow)]
struct AlbumRow {
    id: i64,
    title: String,
    artist: String,
    price_cents: i64,
    stock: i64,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AlbumRow> for Album {
    fn from(row: AlbumRow) -> Self {
        Self {
            id: AlbumId::new(row.id),
            title: row.title,
            artist: row.artist,
            price: Price::from_cents(row.price_cents),
            stock: row.stock,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for catalog reads and album creation.
pub struct AlbumRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AlbumRepository<'a> {
    /// Create a new album repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get an album by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: AlbumId) -> Result<Option<Album>, RepositoryError> {
        let row = sqlx::query_as::<_, AlbumRow>(
            r"
            SELECT id, title, artist, price_cents, stock, available, created_at, updated_at
            FROM albums
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Album::from))
    }

    /// List the full catalog, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Album>, RepositoryError> {
        let rows = sqlx::query_as::<_, AlbumRow>(
            r"
            SELECT id, title, artist, price_cents, stock, available, created_at, updated_at
            FROM albums
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Album::from).collect())
    }

    /// Insert a new album.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        title: &str,
        artist: &str,
        price: Price,
        stock: i64,
    ) -> Result<Album, RepositoryError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, AlbumRow>(
            r"
            INSERT INTO albums (title, artist, price_cents, stock, available, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING id, title, artist, price_cents, stock, available, created_at, updated_at
            ",
        )
        .bind(title)
        .bind(artist)
        .bind(price.to_cents())
        .bind(stock)
        .bind(stock > 0)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(Album::from(row))
    }
}
