mod common;

use anyhow::Result;
use billing::application;
use billing::settings::DatabaseSettings;
use billing::{AppError, Repository};
use common::{assert_balance_matches_journal, test_services};
use sqlx::SqlitePool;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_reserves_succeed_once() -> Result<()> {
    let s = test_services().await?;
    s.balances.top_up(42, 10_000).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orders = s.orders.clone();
        handles.push(tokio::spawn(async move {
            orders.reserve(7, 42, 3, 600).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(AppError::AlreadyReserved(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(s.balances.get_balance(42).await?, 9_400);
    assert_balance_matches_journal(&s.balances, 42).await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() -> Result<()> {
    let s = test_services().await?;
    s.balances.top_up(1, 1_000).await?;

    // 10 reservations of 300 against 1000: at most 3 fit
    let mut handles = Vec::new();
    for order in 0..10 {
        let orders = s.orders.clone();
        handles.push(tokio::spawn(async move {
            orders.reserve(order, 1, 1, 300).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(s.balances.get_balance(1).await?, 100);
    assert_balance_matches_journal(&s.balances, 1).await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_money() -> Result<()> {
    let s = test_services().await?;
    s.balances.top_up(1, 500).await?;
    s.balances.top_up(2, 500).await?;

    let mut handles = Vec::new();
    for i in 0..20 {
        let balances = s.balances.clone();
        let (from, to) = if i % 2 == 0 { (1, 2) } else { (2, 1) };
        handles.push(tokio::spawn(async move {
            balances.transfer(from, to, 75).await
        }));
    }

    for handle in handles {
        match handle.await? {
            Ok(balance) => assert!(balance >= 0),
            Err(AppError::InsufficientFunds { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    let total = s.balances.get_balance(1).await? + s.balances.get_balance(2).await?;
    assert_eq!(total, 1_000);
    assert_balance_matches_journal(&s.balances, 1).await?;
    assert_balance_matches_journal(&s.balances, 2).await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirm_and_reject_settle_once() -> Result<()> {
    let s = test_services().await?;
    s.balances.top_up(1, 1_000).await?;
    s.orders.reserve(5, 1, 2, 400).await?;

    let confirm = {
        let orders = s.orders.clone();
        tokio::spawn(async move { orders.confirm(5, 1, 2, 400).await })
    };
    let reject = {
        let orders = s.orders.clone();
        tokio::spawn(async move { orders.reject(5, 1, 2, 400).await })
    };

    let confirmed = confirm.await?;
    let rejected = reject.await?;
    assert!(confirmed.is_ok() != rejected.is_ok());

    let expected = if confirmed.is_ok() { 600 } else { 1_000 };
    assert_eq!(s.balances.get_balance(1).await?, expected);
    assert_balance_matches_journal(&s.balances, 1).await?;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_operation_past_deadline_rolls_back() -> Result<()> {
    let temp = TempDir::new()?;
    let db_path = temp.path().join("test.db");
    let path = db_path.to_str().unwrap();
    let settings = DatabaseSettings {
        operation_timeout_ms: 200,
        ..DatabaseSettings::sqlite(path)
    };
    let (balances, orders) = application::init(&settings).await?;
    balances.top_up(1, 100).await?;

    // a foreign connection holds the write lock well past the deadline
    let locker = SqlitePool::connect(&settings.url).await?;
    let mut lock = locker.begin().await?;
    sqlx::query("UPDATE users SET balance = balance WHERE id = 1")
        .execute(&mut *lock)
        .await?;

    assert!(matches!(
        balances.top_up(1, 50).await,
        Err(AppError::Internal)
    ));
    assert!(matches!(
        orders.reserve(9, 1, 2, 30).await,
        Err(AppError::Internal)
    ));

    lock.rollback().await?;
    locker.close().await;

    // check through a fresh pool with the default deadline
    let repo = Repository::connect(&DatabaseSettings::sqlite(path)).await?;
    let (balances, orders) = application::services(repo.clone());

    assert_eq!(balances.get_balance(1).await?, 100);
    assert_eq!(balances.list_transactions(1, "created", 10, 0).await?.len(), 1);
    assert!(matches!(
        orders.get_reservation(9, 1, 2).await,
        Err(AppError::RecordNotFound(_))
    ));

    assert_eq!(balances.top_up(1, 50).await?, 150);
    assert_balance_matches_journal(&balances, 1).await?;

    repo.close().await;
    Ok(())
}

#[tokio::test]
async fn test_connect_requires_existing_database() -> Result<()> {
    let temp = TempDir::new()?;
    let db_path = temp.path().join("missing.db");
    let settings = DatabaseSettings::sqlite(db_path.to_str().unwrap());

    assert!(Repository::connect(&settings).await.is_err());
    assert!(!db_path.exists());

    let (balances, _) = application::init(&settings).await?;
    balances.top_up(5, 10).await?;

    let repo = Repository::connect(&settings).await?;
    let (balances, _) = application::services(repo.clone());
    assert_eq!(balances.get_balance(5).await?, 10);
    repo.close().await;

    Ok(())
}
