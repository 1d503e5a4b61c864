use chrono::{DateTime, Utc};

use crate::domain::{
    Cents, OrderId, ReportPeriod, Reservation, ReservationKey, ServiceId, Settlement, UserId,
};
use crate::storage::Repository;

use super::{AppError, MonthlyReport};

/// Two-phase purchases (reserve, then confirm or reject) and the monthly
/// revenue report.
#[derive(Clone)]
pub struct OrderService {
    repo: Repository,
}

impl OrderService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Hold `cost` from the user's balance for an order.
    pub async fn reserve(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
        cost: Cents,
    ) -> Result<Reservation, AppError> {
        self.reserve_at(order_id, user_id, service_id, cost, Utc::now())
            .await
    }

    /// Same as `reserve`, with an explicit reservation time. The report
    /// buckets revenue by this time.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_at(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
        cost: Cents,
        at: DateTime<Utc>,
    ) -> Result<Reservation, AppError> {
        if cost < 0 {
            return Err(AppError::InvalidCost);
        }

        let key = ReservationKey::new(order_id, user_id, service_id);
        let reservation = self.repo.reserve(key, cost, at).await?;
        tracing::info!("funds reserved");
        Ok(reservation)
    }

    /// Settle a reservation as paid. The funds already left the balance at
    /// reservation time.
    pub async fn confirm(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
        cost: Cents,
    ) -> Result<Reservation, AppError> {
        self.settle(order_id, user_id, service_id, cost, Settlement::Confirm)
            .await
    }

    /// Cancel a reservation and refund its cost.
    pub async fn reject(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
        cost: Cents,
    ) -> Result<Reservation, AppError> {
        self.settle(order_id, user_id, service_id, cost, Settlement::Reject)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn settle(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
        cost: Cents,
        settlement: Settlement,
    ) -> Result<Reservation, AppError> {
        if cost < 0 {
            return Err(AppError::InvalidCost);
        }

        let key = ReservationKey::new(order_id, user_id, service_id);
        let reservation = self.repo.settle(key, cost, settlement, Utc::now()).await?;
        tracing::info!(status = %reservation.status, "reservation settled");
        Ok(reservation)
    }

    pub async fn get_reservation(
        &self,
        order_id: OrderId,
        user_id: UserId,
        service_id: ServiceId,
    ) -> Result<Reservation, AppError> {
        self.repo
            .get_reservation(ReservationKey::new(order_id, user_id, service_id))
            .await
    }

    /// Revenue per service for confirmed reservations made in the given month.
    #[tracing::instrument(skip(self))]
    pub async fn report(&self, year: i32, month: u32) -> Result<MonthlyReport, AppError> {
        let period = ReportPeriod::new(year, month).ok_or(AppError::InvalidMonth { year, month })?;
        let (from, to) = period.bounds();

        let services = self.repo.revenue_by_service(from, to).await?;
        MonthlyReport::new(period, services).ok_or_else(|| {
            tracing::error!(%period, "report total overflows");
            AppError::Internal
        })
    }
}
