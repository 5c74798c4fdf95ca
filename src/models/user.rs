use serde::{Deserialize, Serialize};

use super::enums::{SubscriptionTier, UserRole};

/// Identity record. Created at signup and mutated by profile edits and the
/// subscription webhook; the reminder service never deletes users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub subscription_tier: SubscriptionTier,
    /// Tracked pathology identifiers.
    pub pathologies: Vec<String>,
    /// Registered push-delivery tokens, one per client installation.
    pub push_tokens: Vec<String>,
    pub is_validated: bool,
}

impl User {
    /// Name used in greetings: display name, else the local part of the email.
    pub fn greeting_name(&self) -> &str {
        let name = self.display_name.trim();
        if !name.is_empty() {
            return name;
        }
        self.email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or("there")
    }
}
