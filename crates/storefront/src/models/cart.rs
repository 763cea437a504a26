//! Cart models.
//!
//! A cart is derived, not stored: it is the set of cart lines for one owner,
//! joined with current album data. Totals are computed at current catalog
//! prices; carts are not price-locked (orders are).

use serde::Serialize;

use spindle_core::{AlbumId, CartLineId, Price};

/// One cart line, joined with the album it references.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub album_id: AlbumId,
    pub title: String,
    pub artist: String,
    pub unit_price: Price,
    pub quantity: i64,
    pub line_total: Price,
}

/// An owner's cart with computed count and total.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub item_count: usize,
    pub total: Price,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            item_count: 0,
            total: Price::ZERO,
        }
    }

    /// Build a cart from its lines, computing count and total.
    #[must_use]
    pub fn from_lines(items: Vec<CartLine>) -> Self {
        let item_count = items.len();
        let total = items.iter().map(|line| line.line_total).sum();
        Self {
            items,
            item_count,
            total,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, album_id: i64, cents: i64, quantity: i64) -> CartLine {
        let unit_price = Price::from_cents(cents);
        CartLine {
            id: CartLineId::new(id),
            album_id: AlbumId::new(album_id),
            title: format!("Album {album_id}"),
            artist: "Artist".to_owned(),
            unit_price,
            quantity,
            line_total: unit_price.line_total(quantity),
        }
    }

    #[test]
    fn test_from_lines_computes_totals() {
        let cart = Cart::from_lines(vec![line(1, 10, 1000, 2), line(2, 11, 500, 1)]);
        assert_eq!(cart.item_count, 2);
        assert_eq!(cart.total, Price::from_cents(2500));
        assert!(!cart.is_empty());
    }

    #[test]
    fn test_empty() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count, 0);
    }
}
