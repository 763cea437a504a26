//! Checkout wizard route handlers.
//!
//! The wizard state machine lives in the session; each request loads it,
//! applies one transition, and stores the new state back. `place` is the
//! only route that reaches the orchestrator, and the state machine makes it
//! single-shot.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse, response::Response};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::session_keys;
use crate::response::ApiResponse;
use crate::services::CheckoutFlow;
use crate::services::checkout::CheckoutError;
use crate::services::validation::{BillingForm, PaymentInfoForm};
use crate::state::AppState;

/// Submit payment request body.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_method: String,
    #[serde(default)]
    pub payment_info: PaymentInfoForm,
}

async fn load_flow(session: &Session) -> Result<CheckoutFlow> {
    Ok(session
        .get::<CheckoutFlow>(session_keys::CHECKOUT_FLOW)
        .await?
        .unwrap_or_default())
}

async fn save_flow(session: &Session, flow: &CheckoutFlow) -> Result<()> {
    session.insert(session_keys::CHECKOUT_FLOW, flow).await?;
    Ok(())
}

/// Show the current wizard state.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<ApiResponse<CheckoutFlow>>> {
    let flow = load_flow(&session).await?;
    Ok(Json(ApiResponse::ok("Checkout state", flow)))
}

/// Submit billing details (`Billing -> Payment`).
#[instrument(skip(session, form))]
pub async fn billing(
    session: Session,
    Json(form): Json<BillingForm>,
) -> Result<Json<ApiResponse<CheckoutFlow>>> {
    let mut flow = load_flow(&session).await?;
    flow.submit_billing(&form)?;
    save_flow(&session, &flow).await?;
    Ok(Json(ApiResponse::ok("Billing details accepted", flow)))
}

/// Submit payment details (`Payment -> Review`).
#[instrument(skip(session, request))]
pub async fn payment(
    session: Session,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<ApiResponse<CheckoutFlow>>> {
    let mut flow = load_flow(&session).await?;
    flow.submit_payment(&request.payment_method, &request.payment_info)?;
    save_flow(&session, &flow).await?;
    Ok(Json(ApiResponse::ok("Payment details accepted", flow)))
}

/// Navigate one step back.
#[instrument(skip(session))]
pub async fn back(session: Session) -> Result<Json<ApiResponse<CheckoutFlow>>> {
    let mut flow = load_flow(&session).await?;
    flow.back()?;
    save_flow(&session, &flow).await?;
    Ok(Json(ApiResponse::ok("Returned to previous step", flow)))
}

/// Place the order (`Review -> Submitting -> {Complete, Review+error}`).
///
/// A repeated click while the order is being processed (or after it
/// completed) is a no-op that reports the current state instead of invoking
/// the orchestrator again.
#[instrument(skip(state, session))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let mut flow = load_flow(&session).await?;

    let Some(payload) = flow.begin_submit()? else {
        // Duplicate submission: report the state we already reached.
        return Ok(Json(ApiResponse::ok("Order is already being processed", flow))
            .into_response());
    };
    save_flow(&session, &flow).await?;

    match state
        .checkout()
        .checkout(user.id, &payload.payment, &payload.billing)
        .await
    {
        Ok(order) => {
            flow.finish_success(order.order_number.as_str())?;
            save_flow(&session, &flow).await?;
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok("Order created successfully", order)),
            )
                .into_response())
        }
        Err(err) => {
            // Retryable failures return the wizard to review with the reason;
            // server-side failures keep a generic message.
            let message = match &err {
                CheckoutError::EmptyCart | CheckoutError::OutOfStock(_) => err.to_string(),
                _ => "Internal server error".to_owned(),
            };
            flow.finish_failure(message)?;
            save_flow(&session, &flow).await?;
            Err(AppError::from(err))
        }
    }
}
