//! Cart route handlers.
//!
//! Cart ownership is resolved from the session: the logged-in user if there
//! is one, otherwise an anonymous owner key created lazily on the first cart
//! write. Reading a cart never checks stock; only checkout does.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use spindle_core::{AlbumId, CartLineId, Owner, SessionKey};

use crate::db::cart::CartRepository;
use crate::error::{AppError, Result};
use crate::models::{Cart, CartLine, session_keys};
use crate::response::ApiResponse;
use crate::services::validation::validate_quantity;
use crate::state::AppState;

// =============================================================================
// Session Helpers
// =============================================================================

/// Resolve the current cart owner, if any.
///
/// Logged-in users own their cart by user id; anonymous shoppers by the
/// session's cart owner key, when one has been created.
pub(crate) async fn current_owner(session: &Session) -> Result<Option<Owner>> {
    if let Some(user) = session
        .get::<crate::models::CurrentUser>(session_keys::CURRENT_USER)
        .await?
    {
        return Ok(Some(Owner::User(user.id)));
    }

    let key = session.get::<String>(session_keys::CART_OWNER).await?;
    Ok(key.map(|key| Owner::Session(SessionKey::new(key))))
}

/// Resolve the owner for a cart write, creating an anonymous key if needed.
async fn owner_for_write(session: &Session) -> Result<Owner> {
    if let Some(owner) = current_owner(session).await? {
        return Ok(owner);
    }

    let key = SessionKey::generate();
    session
        .insert(session_keys::CART_OWNER, key.as_str())
        .await?;
    Ok(Owner::Session(key))
}

// =============================================================================
// Handlers
// =============================================================================

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub album_id: i64,
    pub quantity: Option<i64>,
}

/// Update cart line request body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartLineRequest {
    pub quantity: i64,
}

/// Get the current owner's cart.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiResponse<Cart>>> {
    let cart = match current_owner(&session).await? {
        Some(owner) => CartRepository::new(state.pool()).get_cart(&owner).await?,
        None => Cart::empty(),
    };

    Ok(Json(ApiResponse::ok("Cart retrieved", cart)))
}

/// Add an album to the cart.
///
/// Adding an album the owner already has increments the existing line.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<ApiResponse<CartLine>>> {
    let quantity = request.quantity.unwrap_or(1);
    validate_quantity(quantity).map_err(|e| AppError::Validation(vec![e]))?;

    let owner = owner_for_write(&session).await?;
    let line = CartRepository::new(state.pool())
        .add_line(&owner, AlbumId::new(request.album_id), quantity)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Album not found".to_owned())
            }
            other => AppError::Database(other),
        })?;

    Ok(Json(ApiResponse::ok("Item added to cart", line)))
}

/// Set a cart line's quantity.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(line_id): Path<i64>,
    Json(request): Json<UpdateCartLineRequest>,
) -> Result<Json<ApiResponse<CartLine>>> {
    validate_quantity(request.quantity).map_err(|e| AppError::Validation(vec![e]))?;

    let owner = current_owner(&session)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_owned()))?;

    let line = CartRepository::new(state.pool())
        .set_line_quantity(&owner, CartLineId::new(line_id), request.quantity)
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Cart item not found".to_owned())
            }
            other => AppError::Database(other),
        })?;

    Ok(Json(ApiResponse::ok("Cart item updated", line)))
}

/// Remove a cart line.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(line_id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    let owner = current_owner(&session)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".to_owned()))?;

    CartRepository::new(state.pool())
        .remove_line(&owner, CartLineId::new(line_id))
        .await
        .map_err(|e| match e {
            crate::db::RepositoryError::NotFound => {
                AppError::NotFound("Cart item not found".to_owned())
            }
            other => AppError::Database(other),
        })?;

    Ok(Json(ApiResponse::message("Item removed from cart")))
}

/// Clear the cart.
#[instrument(skip(state, session))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ApiResponse<()>>> {
    if let Some(owner) = current_owner(&session).await? {
        CartRepository::new(state.pool()).clear(&owner).await?;
    }

    Ok(Json(ApiResponse::message("Cart cleared")))
}
