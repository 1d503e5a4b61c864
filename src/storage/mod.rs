mod ledger;
mod repository;
mod reservations;

pub use repository::*;

/// SQL migration for users and the journal
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for reservations
pub const MIGRATION_002_RESERVES: &str = include_str!("migrations/002_reserves.sql");
