mod journal;
mod money;
mod period;
mod reservation;
mod user;

pub use journal::*;
pub use money::*;
pub use period::*;
pub use reservation::*;
pub use user::*;
