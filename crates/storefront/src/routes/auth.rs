//! Auth route handlers.
//!
//! Credential verification (passwords, registration) lives in the external
//! identity provider; these routes only bind its stable user id to the
//! session. Logging in is the moment a session becomes authenticated, so the
//! anonymous cart merges into the user's cart here, synchronously.

use axum::{Json, extract::State};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use spindle_core::{SessionKey, UserId};

use crate::db::cart::CartRepository;
use crate::error::Result;
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Login request body: the user id issued by the identity provider.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: i64,
}

/// Bind an authenticated user to the session.
///
/// Any anonymous cart the session accumulated is merged into the user's
/// cart before the identity switches; quantities for shared albums are
/// summed, unique lines are re-owned.
#[instrument(skip(state, session))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<CurrentUser>>> {
    let user = CurrentUser {
        id: UserId::new(request.user_id),
    };

    if let Some(key) = session.get::<String>(session_keys::CART_OWNER).await? {
        CartRepository::new(state.pool())
            .merge_into_user(&SessionKey::new(key), user.id)
            .await?;
        session.remove::<String>(session_keys::CART_OWNER).await?;
    }

    set_current_user(&session, &user).await?;
    tracing::info!(user_id = %user.id, "session authenticated");

    Ok(Json(ApiResponse::ok("Login successful", user)))
}

/// Clear the session user.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<ApiResponse<()>>> {
    clear_current_user(&session).await?;
    Ok(Json(ApiResponse::message("Logout successful")))
}
