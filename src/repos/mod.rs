pub mod error;
pub mod memory;
pub mod user_repo;

pub use memory::MemoryUserStore;
pub use user_repo::{AddOutcome, PgUserStore, UserRow, UserStore};
