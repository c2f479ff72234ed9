mod in_memory_database_client;
mod postgres_database_client;

pub use in_memory_database_client::InMemoryDatabaseClient;
pub use postgres_database_client::PostgresDatabaseClient;
