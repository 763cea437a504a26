//! Request validation for billing, payment, and cart input.
//!
//! The patterns mirror the store's checkout form contract: addresses carry a
//! street number, cities are alphabetic, zips are five digits, and phones use
//! the regional `03-1234567` / `050-1234567` shape. Card numbers and CVVs are
//! validated and then discarded; only the card type, last four digits, and
//! expiry survive into a [`PaymentSummary`].

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;

use spindle_core::{CardType, PaymentMethod};

use crate::models::{BillingInfo, PaymentSummary};
use crate::response::FieldError;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.{3,}.*\d").expect("valid address regex"));
static CITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s]{3,}$").expect("valid city regex"));
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").expect("valid zip regex"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\d{1,2}-\d{7}$").expect("valid phone regex"));
static CARD_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{16}$").expect("valid card number regex"));
static CVV_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{3}$").expect("valid cvv regex"));

/// Raw billing fields as posted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingForm {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub phone: String,
}

/// Raw payment fields as posted by the client.
///
/// Carries the union of both methods' fields; which ones are required depends
/// on the selected payment method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentInfoForm {
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub cardholder_name: Option<String>,
    #[serde(default)]
    pub expiry_month: Option<i64>,
    #[serde(default)]
    pub expiry_year: Option<i64>,
    #[serde(default)]
    pub cvv: Option<String>,
    #[serde(default)]
    pub check_number: Option<String>,
}

/// Validate billing fields into a [`BillingInfo`] snapshot.
///
/// # Errors
///
/// Returns one [`FieldError`] per failing field.
pub fn validate_billing(form: &BillingForm) -> Result<BillingInfo, Vec<FieldError>> {
    let mut errors = Vec::new();

    let address = form.address.trim();
    if !ADDRESS_RE.is_match(address) {
        errors.push(FieldError::new(
            "address",
            "Address must contain at least 3 letters and a number",
        ));
    }

    let city = form.city.trim();
    if !CITY_RE.is_match(city) {
        errors.push(FieldError::new(
            "city",
            "City must contain only letters and be at least 3 characters",
        ));
    }

    let zip_code = form.zip_code.trim();
    if !ZIP_RE.is_match(zip_code) {
        errors.push(FieldError::new("zip_code", "Zip code must be 5 digits"));
    }

    let phone = form.phone.trim();
    if !PHONE_RE.is_match(phone) {
        errors.push(FieldError::new(
            "phone",
            "Phone must be in format 03-1234567 or 050-1234567",
        ));
    }

    if errors.is_empty() {
        Ok(BillingInfo {
            address: address.to_owned(),
            city: city.to_owned(),
            zip_code: zip_code.to_owned(),
            phone: phone.to_owned(),
        })
    } else {
        Err(errors)
    }
}

/// Validate payment fields for the selected method into a [`PaymentSummary`].
///
/// Only the fields the selected method requires are considered; the other
/// method's fields are ignored entirely.
///
/// # Errors
///
/// Returns one [`FieldError`] per failing field.
pub fn validate_payment(
    method: &str,
    info: &PaymentInfoForm,
) -> Result<PaymentSummary, Vec<FieldError>> {
    let Ok(method) = method.parse::<PaymentMethod>() else {
        return Err(vec![FieldError::new(
            "payment_method",
            "Invalid payment method",
        )]);
    };

    match method {
        PaymentMethod::CreditCard => validate_credit_card(info),
        PaymentMethod::Check => validate_check(info),
    }
}

fn validate_credit_card(info: &PaymentInfoForm) -> Result<PaymentSummary, Vec<FieldError>> {
    let mut errors = Vec::new();

    let card_type = info
        .card_type
        .as_deref()
        .unwrap_or_default()
        .parse::<CardType>();
    if card_type.is_err() {
        errors.push(FieldError::new("card_type", "Invalid card type"));
    }

    let number = info.card_number.as_deref().unwrap_or_default().trim();
    if !CARD_NUMBER_RE.is_match(number) {
        errors.push(FieldError::new(
            "card_number",
            "Card number must be 16 digits",
        ));
    }

    let month = info.expiry_month.unwrap_or_default();
    if !(1..=12).contains(&month) {
        errors.push(FieldError::new("expiry_month", "Invalid expiry month"));
    }

    let year = info.expiry_year.unwrap_or_default();
    if year < i64::from(Utc::now().year()) {
        errors.push(FieldError::new("expiry_year", "Card has expired"));
    }

    let cvv = info.cvv.as_deref().unwrap_or_default().trim();
    if !CVV_RE.is_match(cvv) {
        errors.push(FieldError::new("cvv", "CVV must be 3 digits"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Keep only the sanitized metadata; the full number and CVV are dropped.
    let last_four = number.chars().skip(number.chars().count() - 4).collect();

    Ok(PaymentSummary::CreditCard {
        card_type: card_type.unwrap_or(CardType::Direct),
        last_four,
        expiry_month: u8::try_from(month).unwrap_or_default(),
        expiry_year: u16::try_from(year).unwrap_or(u16::MAX),
    })
}

fn validate_check(info: &PaymentInfoForm) -> Result<PaymentSummary, Vec<FieldError>> {
    let check_number = info.check_number.as_deref().unwrap_or_default().trim();
    if check_number.is_empty() {
        return Err(vec![FieldError::new(
            "check_number",
            "Check number is required",
        )]);
    }

    Ok(PaymentSummary::Check {
        check_number: check_number.to_owned(),
    })
}

/// Validate a cart quantity (additions and updates both require >= 1).
///
/// # Errors
///
/// Returns a [`FieldError`] for quantities below one.
pub fn validate_quantity(quantity: i64) -> Result<(), FieldError> {
    if quantity >= 1 {
        Ok(())
    } else {
        Err(FieldError::new("quantity", "Quantity must be at least 1"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn billing_form() -> BillingForm {
        BillingForm {
            address: "Abbey Road 3".to_owned(),
            city: "London".to_owned(),
            zip_code: "90210".to_owned(),
            phone: "03-1234567".to_owned(),
        }
    }

    fn card_form() -> PaymentInfoForm {
        PaymentInfoForm {
            card_type: Some("visa".to_owned()),
            card_number: Some("4242424242424242".to_owned()),
            cardholder_name: Some("Ada Lovelace".to_owned()),
            expiry_month: Some(12),
            expiry_year: Some(i64::from(Utc::now().year()) + 2),
            cvv: Some("123".to_owned()),
            check_number: None,
        }
    }

    #[test]
    fn test_valid_billing() {
        let billing = validate_billing(&billing_form()).unwrap();
        assert_eq!(billing.city, "London");
    }

    #[test]
    fn test_billing_trims_whitespace() {
        let mut form = billing_form();
        form.city = "  London  ".to_owned();
        let billing = validate_billing(&form).unwrap();
        assert_eq!(billing.city, "London");
    }

    #[test]
    fn test_address_requires_a_number() {
        let mut form = billing_form();
        form.address = "Abbey Road".to_owned();
        let errors = validate_billing(&form).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().field, "address");
    }

    #[test]
    fn test_city_rejects_digits_and_short_names() {
        for bad in ["NY", "Spr1ngfield", ""] {
            let mut form = billing_form();
            form.city = bad.to_owned();
            let errors = validate_billing(&form).unwrap_err();
            assert!(errors.iter().any(|e| e.field == "city"), "{bad}");
        }
    }

    #[test]
    fn test_zip_must_be_five_digits() {
        for bad in ["1234", "123456", "12a45"] {
            let mut form = billing_form();
            form.zip_code = bad.to_owned();
            let errors = validate_billing(&form).unwrap_err();
            assert!(errors.iter().any(|e| e.field == "zip_code"), "{bad}");
        }
    }

    #[test]
    fn test_phone_pattern() {
        for good in ["03-1234567", "050-1234567"] {
            let mut form = billing_form();
            form.phone = good.to_owned();
            assert!(validate_billing(&form).is_ok(), "{good}");
        }
        for bad in ["3-1234567", "0501234567", "050-123456"] {
            let mut form = billing_form();
            form.phone = bad.to_owned();
            assert!(validate_billing(&form).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_multiple_billing_errors_are_collected() {
        let form = BillingForm::default();
        let errors = validate_billing(&form).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_valid_credit_card_keeps_last_four_only() {
        let summary = validate_payment("credit_card", &card_form()).unwrap();
        match summary {
            PaymentSummary::CreditCard {
                card_type,
                last_four,
                expiry_month,
                ..
            } => {
                assert_eq!(card_type, CardType::Visa);
                assert_eq!(last_four, "4242");
                assert_eq!(expiry_month, 12);
            }
            PaymentSummary::Check { .. } => panic!("expected credit card summary"),
        }
    }

    #[test]
    fn test_expired_card_rejected() {
        let mut form = card_form();
        form.expiry_year = Some(i64::from(Utc::now().year()) - 1);
        let errors = validate_payment("credit_card", &form).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "expiry_year"));
    }

    #[test]
    fn test_card_number_and_cvv_patterns() {
        let mut form = card_form();
        form.card_number = Some("1234".to_owned());
        form.cvv = Some("12".to_owned());
        let errors = validate_payment("credit_card", &form).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"card_number"));
        assert!(fields.contains(&"cvv"));
    }

    #[test]
    fn test_missing_card_fields_fail() {
        let errors = validate_payment("credit_card", &PaymentInfoForm::default()).unwrap_err();
        assert!(errors.len() >= 4);
    }

    #[test]
    fn test_check_requires_number() {
        assert!(validate_payment("check", &PaymentInfoForm::default()).is_err());

        let form = PaymentInfoForm {
            check_number: Some("1042".to_owned()),
            ..PaymentInfoForm::default()
        };
        let summary = validate_payment("check", &form).unwrap();
        assert_eq!(
            summary,
            PaymentSummary::Check {
                check_number: "1042".to_owned()
            }
        );
    }

    #[test]
    fn test_check_ignores_card_fields() {
        // A check payment with junk card fields is still valid.
        let form = PaymentInfoForm {
            card_number: Some("not-a-card".to_owned()),
            check_number: Some("7".to_owned()),
            ..PaymentInfoForm::default()
        };
        assert!(validate_payment("check", &form).is_ok());
    }

    #[test]
    fn test_unknown_method_rejected() {
        let errors = validate_payment("cash", &PaymentInfoForm::default()).unwrap_err();
        assert_eq!(errors.first().unwrap().field, "payment_method");
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }
}
