pub mod application;
pub mod cli;
pub mod domain;
pub mod io;
pub mod settings;
pub mod storage;
pub mod telemetry;

pub use application::{AppError, BalanceService, ErrorKind, MonthlyReport, OrderService};
pub use domain::*;
pub use storage::Repository;
