//! # CPE Config Sync
//!
//! Cloud-side configuration synchronization for fleets of customer-premises
//! devices, built on Clean Architecture principles.
//!
//! ## Architecture Layers
//!
//! - **Domain**: capability codec, root version hashing, multipart wire codec,
//!   documents and device reports
//! - **Application**: reconciliation and deployment state use cases, ports
//! - **Infrastructure**: PostgreSQL and in-memory stores, HTTP upstream mutator
//! - **API**: axum handlers and middleware
//!
//! ## Example Usage
//!
//! ```no_run
//! use cpe_config_sync::{api::create_router, application::builder::ApplicationBuilder, Config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let state = ApplicationBuilder::new(config)
//!     .with_database()
//!     .await?
//!     .with_upstream()?
//!     .build()?;
//! let app = create_router(state);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types explicitly to avoid ambiguity
pub use api::errors as api_errors;
pub use application::{dto, ports, use_cases};
pub use config::Config;
pub use domain::errors as domain_errors;
pub use domain::{entities, value_objects};
