pub mod memory;
pub mod mongo;

pub use memory::InMemoryIdentityDirectory;
pub use mongo::MongoIdentityResolver;
