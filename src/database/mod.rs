pub mod adaptor;
pub mod keys;
pub mod memory;
pub mod redis;

pub use adaptor::{ReconnectCallback, Storage};
pub use memory::MemoryStorage;
pub use redis::RedisStorage;
