//! # Customer Contact Resolution
//!
//! Who to email about a payment. The payment provider's own customer details
//! come first; the signed-in user's profile is the fallback.

use serde::{Deserialize, Serialize};

/// Where a contact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    /// Checkout session or charge billing details
    PaymentProvider,
    /// Authentication provider profile
    UserAccount,
}

/// A named email recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    pub source: ContactSource,
}

impl CustomerContact {
    /// Contact from payment provider fields; both name and email must be present
    pub fn from_provider(name: Option<&str>, email: Option<&str>) -> Option<Self> {
        let name = name.map(str::trim).filter(|s| !s.is_empty())?;
        let email = email.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self {
            name: name.to_string(),
            email: email.to_string(),
            source: ContactSource::PaymentProvider,
        })
    }
}

/// One email address on a user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// User record as returned by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
}

impl UserProfile {
    /// First and last name joined, skipping blanks
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// The address flagged as primary
    pub fn primary_email(&self) -> Option<&str> {
        let primary_id = self.primary_email_address_id.as_deref()?;
        self.email_addresses
            .iter()
            .find(|e| e.id == primary_id)
            .map(|e| e.email_address.as_str())
    }

    /// Contact built from the profile; needs both a name and a primary email
    pub fn contact(&self) -> Option<CustomerContact> {
        Some(CustomerContact {
            name: self.full_name()?,
            email: self.primary_email()?.to_string(),
            source: ContactSource::UserAccount,
        })
    }
}

/// Ordered list of recipients to try.
///
/// A user contact with the same address as the provider contact is dropped,
/// since resending to the same mailbox cannot succeed where the first failed.
pub fn contact_candidates(
    provider: Option<CustomerContact>,
    user: Option<&UserProfile>,
) -> Vec<CustomerContact> {
    let mut candidates: Vec<CustomerContact> = provider.into_iter().collect();

    if let Some(fallback) = user.and_then(UserProfile::contact) {
        let duplicate = candidates
            .iter()
            .any(|c| c.email.eq_ignore_ascii_case(&fallback.email));
        if !duplicate {
            candidates.push(fallback);
        }
    }

    candidates
}
