use serde::{Deserialize, Serialize};

use super::Cents;

/// User identity. Assigned by an external identity system; this service
/// never generates user ids.
pub type UserId = i64;

/// Current balance of a user, a cached projection of their journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    pub balance: Cents,
}
