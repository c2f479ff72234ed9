pub mod persistence;
pub mod upstream;
