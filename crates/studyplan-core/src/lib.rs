//! Domain layer for study plans.
//!
//! The [`store::HierarchyStore`] holds the ordered plan → semester → placement
//! tree. The services on top of it enforce validation and ordinal rules, and
//! [`ownership::OwnershipGate`] ties every entity back to the principal that
//! owns its plan.

pub mod catalog;
pub mod error;
pub mod identity;
pub mod ordering;
pub mod ownership;
pub mod placement;
pub mod plan;
pub mod semester;
pub mod store;

pub use error::{ErrorKind, ServiceError};
