use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

pub type OrderId = i64;
pub type ServiceId = i64;

/// Identity of a reservation. At most one reservation exists per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationKey {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub service_id: ServiceId,
}

impl ReservationKey {
    pub fn new(order_id: OrderId, user_id: UserId, service_id: ServiceId) -> Self {
        Self {
            order_id,
            user_id,
            service_id,
        }
    }

    /// Journal message for the funds hold taken at reservation time.
    pub fn reservation_message(&self) -> String {
        format!(
            "reservation for the service {} (order {})",
            self.service_id, self.order_id
        )
    }
}

impl std::fmt::Display for ReservationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(order {}, user {}, service {})",
            self.order_id, self.user_id, self.service_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Funds are held; the order is awaiting confirmation
    Reserved,
    /// The service was delivered and the held funds are revenue
    Confirmed,
    /// The order was cancelled and the held funds went back to the user
    Rejected,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "reserved" => Some(ReservationStatus::Reserved),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "rejected" => Some(ReservationStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The two ways a reservation leaves the `reserved` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Settlement {
    Confirm,
    Reject,
}

impl Settlement {
    /// State a reservation must be in for this settlement to apply.
    pub fn required_status(&self) -> ReservationStatus {
        ReservationStatus::Reserved
    }

    pub fn target_status(&self) -> ReservationStatus {
        match self {
            Settlement::Confirm => ReservationStatus::Confirmed,
            Settlement::Reject => ReservationStatus::Rejected,
        }
    }

    /// Amount credited back to the user when the settlement is applied.
    pub fn refund(&self, cost: Cents) -> Cents {
        match self {
            Settlement::Confirm => 0,
            Settlement::Reject => cost,
        }
    }

    /// Journal message recorded when the settlement is applied.
    pub fn journal_message(&self, key: &ReservationKey) -> String {
        match self {
            Settlement::Confirm => format!(
                "payment for the service {} (order {})",
                key.service_id, key.order_id
            ),
            Settlement::Reject => format!(
                "refund for the service {} (order {})",
                key.service_id, key.order_id
            ),
        }
    }
}

/// A funds hold tying an order to a user and a service for a fixed cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub key: ReservationKey,
    pub cost: Cents,
    pub status: ReservationStatus,
    /// When the funds were reserved; monthly revenue is bucketed by this
    pub created: DateTime<Utc>,
    /// Last status change
    pub updated: DateTime<Utc>,
}
