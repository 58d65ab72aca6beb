//! Berth Scheduler - Pod to Node placement decisions
//!
//! This crate provides:
//! - The filter-then-score scheduling algorithm
//! - Fit predicates (resources, node selectors, taints, host ports)
//! - Priority functions (least requested, balanced allocation, spreading)
//! - The scheduler extender capability
//! - Policy configuration for choosing predicates and weights

pub mod error;
pub mod extender;
pub mod filter;
pub mod policy;
pub mod scheduler;
pub mod score;
pub mod select;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use extender::SchedulerExtender;
pub use filter::FitPredicate;
pub use policy::Policy;
pub use scheduler::{GenericScheduler, SchedulerConfig};
pub use score::PriorityFunction;
pub use types::{FailedPredicateMap, FitResult, HostPriority, HostPriorityList, PriorityConfig};
