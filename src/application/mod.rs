pub mod builder;
pub mod dto;
pub mod errors;
pub mod policy;
pub mod ports;
pub mod use_cases;
