//! Shipping address capture and validation.
//!
//! A [`ShippingAddressInput`] is what the checkout form submits; validating it
//! produces a [`ShippingAddress`], which is the only form the rest of the
//! pipeline accepts. Field-level errors are collected so the shipping step can
//! show every problem at once instead of one per submission.

use serde::{Deserialize, Serialize};

use driftwood_core::{Email, EmailError};

/// A validated shipping address, captured once per checkout attempt.
///
/// Orders snapshot these fields at creation time; the profile upsert persists
/// them for reuse on the shopper's next checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A validation failure on a single shipping field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Form field name the error belongs to.
    pub field: &'static str,
    /// Shopper-facing message.
    pub message: String,
}

impl FieldError {
    fn required(field: &'static str) -> Self {
        Self {
            field,
            message: "This field is required".to_owned(),
        }
    }

    fn invalid_email(field: &'static str, err: &EmailError) -> Self {
        Self {
            field,
            message: err.to_string(),
        }
    }
}

/// Raw shipping form input, prior to validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShippingAddressInput {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingAddressInput {
    /// Validate the input, producing a [`ShippingAddress`] or every field
    /// error found.
    ///
    /// # Errors
    ///
    /// Returns one [`FieldError`] per missing required field, plus an email
    /// format error when the address is present but unparseable.
    pub fn validate(self) -> Result<ShippingAddress, Vec<FieldError>> {
        let mut errors = Vec::new();

        let required = [
            ("full_name", self.full_name.trim()),
            ("email", self.email.trim()),
            ("phone", self.phone.trim()),
            ("address_line1", self.address_line1.trim()),
            ("city", self.city.trim()),
            ("state", self.state.trim()),
            ("postal_code", self.postal_code.trim()),
            ("country", self.country.trim()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                errors.push(FieldError::required(field));
            }
        }

        let email = if self.email.trim().is_empty() {
            None
        } else {
            match Email::parse(&self.email) {
                Ok(email) => Some(email),
                Err(e) => {
                    errors.push(FieldError::invalid_email("email", &e));
                    None
                }
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        // All required fields verified non-empty above; email parsed
        let Some(email) = email else {
            return Err(vec![FieldError::required("email")]);
        };

        let address_line2 = self
            .address_line2
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());

        Ok(ShippingAddress {
            full_name: self.full_name.trim().to_owned(),
            email,
            phone: self.phone.trim().to_owned(),
            address_line1: self.address_line1.trim().to_owned(),
            address_line2,
            city: self.city.trim().to_owned(),
            state: self.state.trim().to_owned(),
            postal_code: self.postal_code.trim().to_owned(),
            country: self.country.trim().to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn full_input() -> ShippingAddressInput {
        ShippingAddressInput {
            full_name: "Alex Shore".to_owned(),
            email: "alex@example.com".to_owned(),
            phone: "+1 555 0100".to_owned(),
            address_line1: "1 Beach Rd".to_owned(),
            address_line2: Some("Unit 4".to_owned()),
            city: "Half Moon Bay".to_owned(),
            state: "CA".to_owned(),
            postal_code: "94019".to_owned(),
            country: "US".to_owned(),
        }
    }

    #[test]
    fn test_valid_input() {
        let addr = full_input().validate().unwrap();
        assert_eq!(addr.full_name, "Alex Shore");
        assert_eq!(addr.email.as_str(), "alex@example.com");
        assert_eq!(addr.address_line2.as_deref(), Some("Unit 4"));
    }

    #[test]
    fn test_missing_fields_collected() {
        let errors = ShippingAddressInput::default().validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"full_name"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"postal_code"));
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn test_bad_email_reported_on_field() {
        let mut input = full_input();
        input.email = "not-an-email".to_owned();
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().unwrap().field, "email");
    }

    #[test]
    fn test_blank_line2_dropped() {
        let mut input = full_input();
        input.address_line2 = Some("   ".to_owned());
        let addr = input.validate().unwrap();
        assert!(addr.address_line2.is_none());
    }
}
