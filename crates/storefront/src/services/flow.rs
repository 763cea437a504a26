//! Checkout wizard state machine.
//!
//! The client-facing sequence `Billing -> Payment -> Review -> Submitting ->
//! {Complete, back to Review with an error}` lives in the session as an
//! explicit, serializable state machine. Each transition takes an immutable
//! snapshot of validated data; there is no shared mutable form state. The
//! machine gates when the checkout orchestrator may be invoked and makes
//! "place order" single-shot: a second trigger while `Submitting` yields
//! nothing instead of a second checkout call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BillingInfo, PaymentSummary};
use crate::response::FieldError;

use super::validation::{self, BillingForm, PaymentInfoForm};

/// Where the shopper is in the checkout wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Billing,
    Payment,
    Review,
    Submitting,
    Complete,
}

impl CheckoutStep {
    /// Stable name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::Submitting => "submitting",
            Self::Complete => "complete",
        }
    }
}

/// Errors from invalid wizard input or transitions.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The requested action is not valid for the current step.
    #[error("checkout is at the {current} step; {action} is not allowed")]
    WrongStep {
        current: &'static str,
        action: &'static str,
    },

    /// Field validation failed.
    #[error("validation failed")]
    Invalid(Vec<FieldError>),
}

/// The payload handed to the orchestrator exactly once per submission.
#[derive(Debug, Clone)]
pub struct CheckoutPayload {
    pub billing: BillingInfo,
    pub payment: PaymentSummary,
}

/// Serializable checkout wizard state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckoutFlow {
    step: CheckoutStep,
    billing: Option<BillingInfo>,
    payment: Option<PaymentSummary>,
    error: Option<String>,
    order_number: Option<String>,
}

impl CheckoutFlow {
    /// A fresh wizard at the billing step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// The validated billing snapshot, if entered.
    #[must_use]
    pub const fn billing(&self) -> Option<&BillingInfo> {
        self.billing.as_ref()
    }

    /// The validated payment snapshot, if entered.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentSummary> {
        self.payment.as_ref()
    }

    /// The error from the last failed submission, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The order number, once the wizard completed.
    #[must_use]
    pub fn order_number(&self) -> Option<&str> {
        self.order_number.as_deref()
    }

    /// Submit billing fields; advances `Billing -> Payment` when valid.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` outside the billing step and
    /// `FlowError::Invalid` when validation fails.
    pub fn submit_billing(&mut self, form: &BillingForm) -> Result<(), FlowError> {
        if self.step != CheckoutStep::Billing {
            return Err(self.wrong_step("submitting billing details"));
        }

        let billing = validation::validate_billing(form).map_err(FlowError::Invalid)?;
        self.billing = Some(billing);
        self.step = CheckoutStep::Payment;
        Ok(())
    }

    /// Submit payment fields; advances `Payment -> Review` when valid.
    ///
    /// Selecting a method replaces any previously entered payment wholesale,
    /// so switching methods never leaves the other method's fields behind.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` outside the payment step and
    /// `FlowError::Invalid` when validation fails.
    pub fn submit_payment(
        &mut self,
        method: &str,
        info: &PaymentInfoForm,
    ) -> Result<(), FlowError> {
        if self.step != CheckoutStep::Payment {
            return Err(self.wrong_step("submitting payment details"));
        }

        let payment = validation::validate_payment(method, info).map_err(FlowError::Invalid)?;
        self.payment = Some(payment);
        self.step = CheckoutStep::Review;
        Ok(())
    }

    /// Navigate one step backward (`Payment -> Billing`, `Review -> Payment`).
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` from `Billing`, `Submitting`, or a
    /// terminal state.
    pub fn back(&mut self) -> Result<(), FlowError> {
        self.step = match self.step {
            CheckoutStep::Payment => CheckoutStep::Billing,
            CheckoutStep::Review => CheckoutStep::Payment,
            CheckoutStep::Billing | CheckoutStep::Submitting | CheckoutStep::Complete => {
                return Err(self.wrong_step("navigating back"));
            }
        };
        Ok(())
    }

    /// Trigger submission: `Review -> Submitting`.
    ///
    /// Yields the payload exactly once. While `Submitting` (or after
    /// completion) this returns `Ok(None)` so a repeated "place order" click
    /// is a no-op rather than a second checkout call.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` from the billing or payment steps.
    pub fn begin_submit(&mut self) -> Result<Option<CheckoutPayload>, FlowError> {
        match self.step {
            CheckoutStep::Review => {
                let (Some(billing), Some(payment)) = (self.billing.clone(), self.payment.clone())
                else {
                    // Unreachable through the public transitions.
                    return Err(self.wrong_step("placing the order"));
                };
                self.step = CheckoutStep::Submitting;
                self.error = None;
                Ok(Some(CheckoutPayload { billing, payment }))
            }
            CheckoutStep::Submitting | CheckoutStep::Complete => Ok(None),
            CheckoutStep::Billing | CheckoutStep::Payment => {
                Err(self.wrong_step("placing the order"))
            }
        }
    }

    /// Record orchestrator success: `Submitting -> Complete` (terminal).
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` when not submitting.
    pub fn finish_success(&mut self, order_number: impl Into<String>) -> Result<(), FlowError> {
        if self.step != CheckoutStep::Submitting {
            return Err(self.wrong_step("completing the order"));
        }
        self.step = CheckoutStep::Complete;
        self.order_number = Some(order_number.into());
        self.error = None;
        Ok(())
    }

    /// Record orchestrator failure: back to `Review` carrying the error, so
    /// the shopper can adjust the cart and retry.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::WrongStep` when not submitting.
    pub fn finish_failure(&mut self, message: impl Into<String>) -> Result<(), FlowError> {
        if self.step != CheckoutStep::Submitting {
            return Err(self.wrong_step("recording the failure"));
        }
        self.step = CheckoutStep::Review;
        self.error = Some(message.into());
        Ok(())
    }

    fn wrong_step(&self, action: &'static str) -> FlowError {
        FlowError::WrongStep {
            current: self.step.name(),
            action,
        }
    }
}
