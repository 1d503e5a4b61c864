//! Reservation lifecycle and the revenue roll-up over it.

use anyhow::Context;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::Row;

use crate::application::{AppError, ServiceRevenue};
use crate::domain::{Cents, Reservation, ReservationKey, ReservationStatus, Settlement};

use super::repository::{format_timestamp, parse_timestamp};
use super::Repository;

impl Repository {
    /// Hold `cost` from the user's balance for an order.
    ///
    /// The reservation row is inserted before the debit, so a duplicate key
    /// is reported as `AlreadyReserved` whatever the balance; any failure
    /// rolls back both.
    pub async fn reserve(
        &self,
        key: ReservationKey,
        cost: Cents,
        at: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        // stored timestamps carry microseconds
        let at = at.trunc_subsecs(6);
        self.within("reserve", async {
            let mut tx = self.begin().await?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO reserves (order_id, user_id, service_id, cost, status, created, updated)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key.order_id)
            .bind(key.user_id)
            .bind(key.service_id)
            .bind(cost)
            .bind(ReservationStatus::Reserved.as_str())
            .bind(format_timestamp(at))
            .bind(format_timestamp(at))
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                    tracing::warn!(%key, "already reserved");
                    return Err(AppError::AlreadyReserved(key));
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context("Failed to insert reservation")
                        .into());
                }
            }

            Self::debit(&mut tx, key.user_id, cost).await?;
            Self::append_journal(&mut tx, key.user_id, -cost, &key.reservation_message(), at)
                .await?;

            tx.commit().await.context("Failed to commit reservation")?;

            Ok(Reservation {
                key,
                cost,
                status: ReservationStatus::Reserved,
                created: at,
                updated: at,
            })
        })
        .await
    }

    /// Move a reservation out of `reserved`.
    ///
    /// Only a row that matches the key and the cost exactly and is still
    /// `reserved` is touched; anything else (wrong cost, already settled,
    /// never reserved) is `RecordNotFound`.
    pub async fn settle(
        &self,
        key: ReservationKey,
        cost: Cents,
        settlement: Settlement,
        at: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        let at = at.trunc_subsecs(6);
        self.within("settle", async {
            let mut tx = self.begin().await?;

            let created: Option<String> = sqlx::query_scalar(
                r#"
                UPDATE reserves SET status = ?, updated = ?
                WHERE order_id = ? AND user_id = ? AND service_id = ? AND cost = ? AND status = ?
                RETURNING created
                "#,
            )
            .bind(settlement.target_status().as_str())
            .bind(format_timestamp(at))
            .bind(key.order_id)
            .bind(key.user_id)
            .bind(key.service_id)
            .bind(cost)
            .bind(settlement.required_status().as_str())
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to update reservation status")?;

            let Some(created) = created else {
                tracing::warn!(%key, cost, ?settlement, "no open reservation to settle");
                return Err(AppError::RecordNotFound(key));
            };

            let refund = settlement.refund(cost);
            if refund > 0 {
                Self::credit(&mut tx, key.user_id, refund).await?;
            }
            Self::append_journal(
                &mut tx,
                key.user_id,
                refund,
                &settlement.journal_message(&key),
                at,
            )
            .await?;

            tx.commit().await.context("Failed to commit settlement")?;

            Ok(Reservation {
                key,
                cost,
                status: settlement.target_status(),
                created: parse_timestamp(&created)?,
                updated: at,
            })
        })
        .await
    }

    /// Look up a reservation by key.
    pub async fn get_reservation(&self, key: ReservationKey) -> Result<Reservation, AppError> {
        self.within("get_reservation", async {
            let row = sqlx::query(
                r#"
                SELECT order_id, user_id, service_id, cost, status, created, updated
                FROM reserves
                WHERE order_id = ? AND user_id = ? AND service_id = ?
                "#,
            )
            .bind(key.order_id)
            .bind(key.user_id)
            .bind(key.service_id)
            .fetch_optional(self.pool())
            .await
            .context("Failed to fetch reservation")?;

            match row {
                Some(row) => Ok(Self::row_to_reservation(&row)?),
                None => Err(AppError::RecordNotFound(key)),
            }
        })
        .await
    }

    /// Revenue per service over confirmed reservations created in
    /// `[from, to)`, ordered by service id. Read-only.
    pub async fn revenue_by_service(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ServiceRevenue>, AppError> {
        self.within("revenue_by_service", async {
            let rows = sqlx::query(
                r#"
                SELECT service_id, SUM(cost) AS total_revenue
                FROM reserves
                WHERE status = ? AND created >= ? AND created < ?
                GROUP BY service_id
                ORDER BY service_id
                "#,
            )
            .bind(ReservationStatus::Confirmed.as_str())
            .bind(format_timestamp(from))
            .bind(format_timestamp(to))
            .fetch_all(self.pool())
            .await
            .context("Failed to aggregate revenue")?;

            let revenue = rows
                .iter()
                .map(|row| -> anyhow::Result<ServiceRevenue> {
                    Ok(ServiceRevenue {
                        service_id: row.try_get("service_id")?,
                        total_revenue: row.try_get("total_revenue")?,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            Ok::<_, AppError>(revenue)
        })
        .await
    }

    fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Reservation> {
        let status: String = row.try_get("status")?;
        let created: String = row.try_get("created")?;
        let updated: String = row.try_get("updated")?;

        Ok(Reservation {
            key: ReservationKey::new(
                row.try_get("order_id")?,
                row.try_get("user_id")?,
                row.try_get("service_id")?,
            ),
            cost: row.try_get("cost")?,
            status: ReservationStatus::from_str(&status)
                .ok_or_else(|| anyhow::anyhow!("Invalid reservation status: {}", status))?,
            created: parse_timestamp(&created)?,
            updated: parse_timestamp(&updated)?,
        })
    }
}
