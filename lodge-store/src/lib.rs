pub mod app_config;
pub mod database;
pub mod inventory_repo;
pub mod memory;
pub mod redis_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use inventory_repo::PgInventoryStore;
pub use memory::{MemoryInventoryStore, MemorySessionStorage};
pub use redis_repo::RedisSessionStorage;
