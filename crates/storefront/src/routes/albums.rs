//! Catalog route handlers.
//!
//! Read-only: the storefront surface never mutates the catalog. Search,
//! pagination, and category filtering live in the back-office tooling, not
//! here.

use axum::{Json, extract::Path, extract::State};
use tracing::instrument;

use spindle_core::AlbumId;

use crate::db::catalog::AlbumRepository;
use crate::error::{AppError, Result};
use crate::models::Album;
use crate::response::ApiResponse;
use crate::state::AppState;

/// List the catalog.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Album>>>> {
    let albums = AlbumRepository::new(state.pool()).list().await?;
    Ok(Json(ApiResponse::ok("Albums retrieved", albums)))
}

/// Show one album.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Album>>> {
    let album = AlbumRepository::new(state.pool())
        .get(AlbumId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Album not found".to_owned()))?;

    Ok(Json(ApiResponse::ok("Album retrieved", album)))
}
