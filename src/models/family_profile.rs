use serde::{Deserialize, Serialize};

/// Relationship label of the synthesized self profile.
pub const SELF_RELATIONSHIP: &str = "self";

/// A person the signed-in user can act for: themself, or a stored dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyProfile {
    pub id: String,
    pub display_name: String,
    pub relationship: String,
    pub is_self: bool,
}

impl FamilyProfile {
    pub fn dependent(id: &str, display_name: &str, relationship: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            relationship: relationship.to_string(),
            is_self: false,
        }
    }
}
