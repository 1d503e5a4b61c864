use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, UserId};

pub type JournalId = i64;

/// Message recorded for every top-up.
pub const TOP_UP_MESSAGE: &str = "account replenishment";

/// An immutable record of a single balance-affecting event.
/// The journal is append-only: entries are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonically increasing, assigned by the store
    pub id: JournalId,
    pub user_id: UserId,
    /// Signed delta applied to the user's balance
    pub amount: Cents,
    pub message: String,
    pub created: DateTime<Utc>,
}

pub fn transfer_out_message(receiver: UserId) -> String {
    format!("transfer to the user {}", receiver)
}

pub fn transfer_in_message(sender: UserId) -> String {
    format!("transfer from the user {}", sender)
}

/// Journal column a listing can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderField {
    Amount,
    Created,
}

impl OrderField {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderField::Amount => "amount",
            OrderField::Created => "created",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "amount" => Some(OrderField::Amount),
            "created" => Some(OrderField::Created),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Sort order for a journal listing.
///
/// The textual form is the field name, optionally prefixed with `-` for
/// descending order: `amount`, `-created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalOrder {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl JournalOrder {
    pub fn new(field: OrderField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (direction, name) = match s.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest),
            None => (SortDirection::Ascending, s),
        };
        OrderField::from_str(name).map(|field| Self { field, direction })
    }

    /// The ORDER BY clause for this order. Only ever one of these fixed
    /// strings: caller input never reaches the SQL text.
    pub fn sql_clause(&self) -> &'static str {
        match (self.field, self.direction) {
            (OrderField::Amount, SortDirection::Ascending) => "amount ASC, id ASC",
            (OrderField::Amount, SortDirection::Descending) => "amount DESC, id DESC",
            (OrderField::Created, SortDirection::Ascending) => "created ASC, id ASC",
            (OrderField::Created, SortDirection::Descending) => "created DESC, id DESC",
        }
    }
}

impl Default for JournalOrder {
    fn default() -> Self {
        Self::new(OrderField::Created, SortDirection::Ascending)
    }
}

impl std::fmt::Display for JournalOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{}", self.field.as_str()),
            SortDirection::Descending => write!(f, "-{}", self.field.as_str()),
        }
    }
}
