// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use billing::application::{self, BalanceService, OrderService};
use billing::domain::{Cents, UserId};
use billing::settings::DatabaseSettings;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

pub struct TestServices {
    pub balances: BalanceService,
    pub orders: OrderService,
    _temp: TempDir,
}

/// Helper to create both services over a temporary database
pub async fn test_services() -> Result<TestServices> {
    let temp = TempDir::new()?;
    let db_path = temp.path().join("test.db");
    let settings = DatabaseSettings::sqlite(db_path.to_str().unwrap());
    let (balances, orders) = application::init(&settings).await?;
    Ok(TestServices {
        balances,
        orders,
        _temp: temp,
    })
}

/// Helper to parse a date string into DateTime<Utc> (midnight UTC)
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Sum of every journal amount recorded for a user.
pub async fn journal_sum(balances: &BalanceService, user: UserId) -> Result<Cents> {
    let mut total = 0;
    let mut offset = 0;
    loop {
        let page = balances
            .list_transactions(user, "created", 1000, offset)
            .await?;
        if page.is_empty() {
            return Ok(total);
        }
        total += page.iter().map(|e| e.amount).sum::<Cents>();
        offset += page.len() as i64;
    }
}

/// Assert the cached balance equals the journal projection.
pub async fn assert_balance_matches_journal(balances: &BalanceService, user: UserId) -> Result<()> {
    let balance = balances.get_balance(user).await?;
    let sum = journal_sum(balances, user).await?;
    assert_eq!(
        balance, sum,
        "balance of user {} diverged from its journal",
        user
    );
    Ok(())
}
