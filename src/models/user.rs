use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SubscriberId;

/// Account that owns subscriptions. Only `user_id` matters to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: SubscriberId,
    pub firstname: String,
    pub surname: String,
    pub username: String,
    #[serde(default)]
    pub ban: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: SubscriberId, firstname: &str, surname: &str, username: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            firstname: firstname.to_string(),
            surname: surname.to_string(),
            username: username.to_string(),
            ban: false,
            created: now,
            updated: now,
        }
    }
}
