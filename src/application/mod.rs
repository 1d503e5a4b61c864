// Application layer: input validation in front of the repository.
// Services hold no state of their own; each call is one store transaction.

pub mod balance;
pub mod error;
pub mod orders;
pub mod reporting;

pub use balance::*;
pub use error::*;
pub use orders::*;
pub use reporting::*;

use crate::settings::DatabaseSettings;
use crate::storage::Repository;

/// Build both services over one repository (and so one pool).
pub fn services(repo: Repository) -> (BalanceService, OrderService) {
    (BalanceService::new(repo.clone()), OrderService::new(repo))
}

/// Open (and migrate) the database and build both services over it.
pub async fn init(settings: &DatabaseSettings) -> anyhow::Result<(BalanceService, OrderService)> {
    let repo = Repository::init(settings).await?;
    Ok(services(repo))
}
