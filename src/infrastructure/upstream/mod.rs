mod http_mutator;

pub use http_mutator::{
    HttpMutatorConfig, HttpUpstreamMutator, HEADER_FACTORY_RESET, HEADER_TRANSACTION_ID,
};
