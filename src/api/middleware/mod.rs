pub mod metrics;
pub mod size_limits;
