//! User profile model for storage and API.

use crate::time_utils::rfc3339_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in the `profiles` collection.
///
/// Keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    /// Identity provider user id (also used as document ID)
    pub user_id: String,
    /// Display name
    pub username: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// When the profile was first created
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    /// Last profile update
    #[serde(with = "rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}
