//! Catalog album model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use spindle_core::{AlbumId, Price};

/// A record in the catalog.
///
/// `stock` and `available` are owned by the stock guard: `available` is true
/// while stock is above zero and the album has not been manually disabled.
#[derive(Debug, Clone, Serialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub artist: String,
    pub price: Price,
    pub stock: i64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
