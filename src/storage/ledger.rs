//! Balance mutations and the journal.
//!
//! Every public operation here is one transaction. The first statement of
//! each mutating transaction is a write, so SQLite takes the write lock up
//! front and concurrent writers queue on the busy timeout instead of failing
//! on a stale read snapshot.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use crate::application::AppError;
use crate::domain::{
    Cents, JournalEntry, JournalOrder, TOP_UP_MESSAGE, UserId, transfer_in_message,
    transfer_out_message,
};

use super::repository::{format_timestamp, parse_timestamp};
use super::Repository;

impl Repository {
    /// Current balance of a user.
    pub async fn get_balance(&self, user_id: UserId) -> Result<Cents, AppError> {
        self.within("get_balance", async {
            let balance: Option<Cents> = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .context("Failed to fetch balance")?;

            balance.ok_or(AppError::UserNotFound(user_id))
        })
        .await
    }

    /// Credit `amount` to a user, creating the user on first top-up.
    /// Returns the resulting balance.
    pub async fn top_up(&self, user_id: UserId, amount: Cents) -> Result<Cents, AppError> {
        self.within("top_up", async {
            let now = Utc::now();
            let mut tx = self.begin().await?;

            let balance = Self::deposit(&mut tx, user_id, amount).await?;
            Self::append_journal(&mut tx, user_id, amount, TOP_UP_MESSAGE, now).await?;

            tx.commit().await.context("Failed to commit top-up")?;
            Ok::<_, AppError>(balance)
        })
        .await
    }

    /// Move `amount` from one user to another. The receiver is created if it
    /// does not exist yet. Returns the sender's balance after the debit.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        self.within("transfer", async {
            let now = Utc::now();
            let mut tx = self.begin().await?;

            let balance = Self::debit(&mut tx, from, amount).await?;
            Self::deposit(&mut tx, to, amount).await?;

            Self::append_journal(&mut tx, from, -amount, &transfer_out_message(to), now).await?;
            Self::append_journal(&mut tx, to, amount, &transfer_in_message(from), now).await?;

            tx.commit().await.context("Failed to commit transfer")?;
            Ok::<_, AppError>(balance)
        })
        .await
    }

    /// Journal entries of a user, one page at a time.
    /// An unknown user simply has no entries.
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        order: JournalOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JournalEntry>, AppError> {
        self.within("list_transactions", async {
            // `sql_clause` is one of a fixed set of literals
            let query = format!(
                "SELECT id, user_id, amount, message, created FROM journal \
                 WHERE user_id = ? ORDER BY {} LIMIT ? OFFSET ?",
                order.sql_clause()
            );

            let rows = sqlx::query(&query)
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await
                .context("Failed to list journal entries")?;

            let entries = rows
                .iter()
                .map(Self::row_to_journal_entry)
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok::<_, AppError>(entries)
        })
        .await
    }

    /// Subtract `amount` from a user's balance inside `conn`'s transaction.
    ///
    /// Nothing is written when the user is missing or the balance would go
    /// negative; the caller's transaction is expected to roll back on error.
    pub(crate) async fn debit(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        let updated: Option<Cents> = sqlx::query_scalar(
            r#"
            UPDATE users SET balance = balance - ?
            WHERE id = ? AND balance >= ?
            RETURNING balance
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit balance")?;

        if let Some(balance) = updated {
            return Ok(balance);
        }

        let current: Option<Cents> = sqlx::query_scalar("SELECT balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch balance after rejected debit")?;

        match current {
            None => {
                tracing::warn!(user_id, "debit of unknown user");
                Err(AppError::UserNotFound(user_id))
            }
            Some(balance) => {
                tracing::warn!(user_id, balance, required = amount, "insufficient funds");
                Err(AppError::InsufficientFunds {
                    user_id,
                    balance,
                    required: amount,
                })
            }
        }
    }

    /// Add `amount` to an existing user's balance inside `conn`'s transaction.
    ///
    /// Crediting a user that does not exist is a broken caller contract (the
    /// row must exist from an earlier debit) and is reported as internal.
    pub(crate) async fn credit(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        let updated: Option<Cents> = sqlx::query_scalar(
            "UPDATE users SET balance = balance + ? WHERE id = ? RETURNING balance",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to credit balance")?;

        updated.ok_or_else(|| {
            tracing::error!(user_id, amount, "credit of unknown user");
            AppError::Internal
        })
    }

    /// Add `amount` to a user's balance, creating the user if absent.
    async fn deposit(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
    ) -> Result<Cents, AppError> {
        let balance: Cents = sqlx::query_scalar(
            r#"
            INSERT INTO users (id, balance) VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET balance = balance + excluded.balance
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to deposit to balance")?;

        Ok(balance)
    }

    pub(crate) async fn append_journal(
        conn: &mut SqliteConnection,
        user_id: UserId,
        amount: Cents,
        message: &str,
        created: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO journal (user_id, amount, message, created) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(amount)
            .bind(message)
            .bind(format_timestamp(created))
            .execute(&mut *conn)
            .await
            .context("Failed to append journal entry")?;

        Ok(())
    }

    fn row_to_journal_entry(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<JournalEntry> {
        let created: String = row.try_get("created")?;

        Ok(JournalEntry {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            amount: row.try_get("amount")?,
            message: row.try_get("message")?,
            created: parse_timestamp(&created)?,
        })
    }
}
