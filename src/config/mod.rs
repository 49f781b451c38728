pub mod board;
pub mod database;
pub mod jwt;
pub mod rate_limit;

pub use board::{BoardConfig, StoreBackend};
pub use rate_limit::RateLimitConfig;
