use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, ReportPeriod, ServiceId};

/// Revenue of one service over a report period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRevenue {
    pub service_id: ServiceId,
    pub total_revenue: Cents,
}

/// Monthly revenue roll-up over confirmed reservations.
///
/// Rendering and storing the report is left to the caller; `id` is the
/// canonical name for the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Sorted by service id
    pub services: Vec<ServiceRevenue>,
    pub total: Cents,
}

impl MonthlyReport {
    /// Returns `None` when the grand total does not fit in `Cents`.
    pub fn new(period: ReportPeriod, mut services: Vec<ServiceRevenue>) -> Option<Self> {
        services.sort_by_key(|s| s.service_id);
        let (period_start, period_end) = period.bounds();
        let total = services
            .iter()
            .try_fold(0 as Cents, |acc, s| acc.checked_add(s.total_revenue))?;

        Some(Self {
            id: period.id(),
            period_start,
            period_end,
            services,
            total,
        })
    }

    pub fn revenue_for(&self, service_id: ServiceId) -> Option<Cents> {
        self.services
            .iter()
            .find(|s| s.service_id == service_id)
            .map(|s| s.total_revenue)
    }
}
