mod database_client;
mod upstream_mutator;

pub use database_client::{DatabaseClient, DatabaseError};
pub use upstream_mutator::{UpstreamError, UpstreamMutator, UpstreamRequest};

#[cfg(test)]
pub use database_client::MockDatabaseClient;
#[cfg(test)]
pub use upstream_mutator::MockUpstreamMutator;
