//! Customer contact and shipping details captured at checkout.

use crate::error::CommerceError;
use serde::{Deserialize, Serialize};

/// Contact and shipping fields for one order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerInfo {
    /// Recipient name.
    pub name: String,
    /// Email address for order notifications.
    pub email: String,
    /// Phone number for the carrier.
    pub phone: String,
    /// Shipping address on one line.
    pub address: String,
    /// Free-form customer note.
    pub note: Option<String>,
}

impl CustomerInfo {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            address: address.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Check the fields needed to ship and contact the customer.
    pub fn validate(&self) -> Result<(), CommerceError> {
        let missing = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        if let Some((field, _)) = missing {
            return Err(CommerceError::ValidationError(format!(
                "customer {field} is required"
            )));
        }
        if !self.email.contains('@') {
            return Err(CommerceError::ValidationError(format!(
                "invalid email address: {}",
                self.email
            )));
        }
        Ok(())
    }
}
