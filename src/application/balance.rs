use crate::domain::{Cents, JournalEntry, JournalOrder, UserId};
use crate::storage::Repository;

use super::AppError;

/// Largest page a journal listing may request.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Top-ups, peer-to-peer transfers and balance inquiries.
///
/// Rejects malformed input before any store call and otherwise hands store
/// outcomes back unchanged.
#[derive(Clone)]
pub struct BalanceService {
    repo: Repository,
}

impl BalanceService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, user_id: UserId) -> Result<Cents, AppError> {
        self.repo.get_balance(user_id).await
    }

    /// Credit a user's balance, creating the user if needed.
    #[tracing::instrument(skip(self))]
    pub async fn top_up(&self, user_id: UserId, amount: Cents) -> Result<Cents, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }

        let balance = self.repo.top_up(user_id, amount).await?;
        tracing::info!(balance, "balance topped up");
        Ok(balance)
    }

    /// Move money between two users. Returns the sender's new balance.
    #[tracing::instrument(skip(self))]
    pub async fn transfer(
        &self,
        user_id: UserId,
        receiver_id: UserId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        if user_id == receiver_id {
            return Err(AppError::InvalidTransfer);
        }
        if amount <= 0 {
            return Err(AppError::InvalidAmount);
        }

        let balance = self.repo.transfer(user_id, receiver_id, amount).await?;
        tracing::info!(balance, "transfer completed");
        Ok(balance)
    }

    /// One page of a user's journal.
    ///
    /// `order_field` is `amount` or `created`, with a leading `-` for
    /// descending order.
    #[tracing::instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        order_field: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JournalEntry>, AppError> {
        let order = JournalOrder::parse(order_field)
            .ok_or_else(|| AppError::InvalidOrderField(order_field.to_string()))?;
        if !(0..=MAX_PAGE_SIZE).contains(&limit) || offset < 0 {
            return Err(AppError::InvalidPagination { limit, offset });
        }

        self.repo
            .list_transactions(user_id, order, limit, offset)
            .await
    }
}
