//! Order route handlers.
//!
//! `POST /orders` is the direct API checkout: billing and payment are
//! validated here, then handed to the orchestrator. Reads are scoped to the
//! authenticated user; reading someone else's order is `Forbidden`.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use spindle_core::OrderId;

use crate::db::orders::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::response::ApiResponse;
use crate::services::validation::{
    BillingForm, PaymentInfoForm, validate_billing, validate_payment,
};
use crate::state::AppState;

/// Create order request body.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    #[serde(default)]
    pub payment_info: PaymentInfoForm,
    #[serde(default)]
    pub billing_info: BillingForm,
}

/// Check out the authenticated user's cart.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>)> {
    let mut errors = Vec::new();

    let billing = match validate_billing(&request.billing_info) {
        Ok(billing) => Some(billing),
        Err(mut field_errors) => {
            errors.append(&mut field_errors);
            None
        }
    };

    let payment = match validate_payment(&request.payment_method, &request.payment_info) {
        Ok(payment) => Some(payment),
        Err(mut field_errors) => {
            errors.append(&mut field_errors);
            None
        }
    };

    let (Some(billing), Some(payment)) = (billing, payment) else {
        return Err(AppError::Validation(errors));
    };

    let order = state.checkout().checkout(user.id, &payment, &billing).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Order created successfully", order)),
    ))
}

/// List the authenticated user's orders, newest first.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<ApiResponse<Vec<Order>>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    Ok(Json(ApiResponse::ok("Orders retrieved", orders)))
}

/// Show one of the authenticated user's orders.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderRepository::new(state.pool())
        .get(OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    if order.user_id != user.id {
        return Err(AppError::Forbidden("Unauthorized access".to_owned()));
    }

    Ok(Json(ApiResponse::ok("Order retrieved", order)))
}
