pub mod memory;
pub mod redis_store;

pub use memory::InMemoryMessageStore;
pub use redis_store::RedisMessageStore;
