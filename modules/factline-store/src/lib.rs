pub mod memory;
pub mod migrate;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStore;
pub use migrate::migrate;
pub use postgres::PgStore;
pub use traits::{Store, LEASE_MAX_HOLD_MINUTES};
