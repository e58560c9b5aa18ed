//! Context construction, the service registry and tracing setup.

pub mod app_context;
pub mod container;
pub mod tracing;

pub use app_context::*;
pub use container::Container;
pub use self::tracing::*;
