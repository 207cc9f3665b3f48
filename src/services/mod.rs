pub mod persistence;
pub mod mongo_store;
pub mod memory_store;
pub mod db_init;

pub mod id_minter;
pub mod canonical_registry;
pub mod subscriber_index;
pub mod query_collapser;
pub mod request_repository;
pub mod user_service;

pub use memory_store::MemoryStore;
pub use mongo_store::MongoStore;
pub use persistence::PersistenceGateway;
pub use query_collapser::UpstreamQueries;
pub use request_repository::RequestRepository;
pub use user_service::{UserService, UserUpdate};
