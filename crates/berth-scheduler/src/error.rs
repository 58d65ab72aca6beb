// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use crate::types::FailedPredicateMap;
use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// The node lister returned no nodes at all
    #[error("no nodes available to schedule pods")]
    #[diagnostic(
        code(scheduler::no_nodes_available),
        help("Register at least one node before scheduling")
    )]
    NoNodesAvailable,

    /// Every node was rejected by a predicate or an extender
    #[error(
        "pod {pod_name} does not fit on any node: failed for reason {} and possibly others",
        .failed_predicates.representative_reason().unwrap_or("unknown")
    )]
    #[diagnostic(
        code(scheduler::fit_error),
        help("Check node resources, selectors, taints and host ports against the pod requirements")
    )]
    FitError {
        pod_name: String,
        failed_predicates: FailedPredicateMap,
    },

    /// A predicate failed for a reason other than insufficient resources
    #[error("predicate {predicate} failed on node {node_name}: {message}")]
    #[diagnostic(
        code(scheduler::predicate_failed),
        help("The predicate could not evaluate the node; this aborts the whole attempt")
    )]
    PredicateFailed {
        predicate: String,
        node_name: String,
        message: String,
    },

    /// A predicate reported insufficient resources while also reporting a fit
    #[error(
        "predicate {predicate} reported insufficient {resource} on node {node_name} but also fit=true"
    )]
    #[diagnostic(
        code(scheduler::predicate_invariant_violated),
        help("This is a bug in the predicate implementation. Please report it")
    )]
    PredicateInvariantViolated {
        predicate: String,
        node_name: String,
        resource: String,
    },

    /// One or more priority functions failed
    #[error("priority functions failed: {}", .errors.join("; "))]
    #[diagnostic(
        code(scheduler::priority_failed),
        help("Inspect the individual priority function errors")
    )]
    PriorityFailed { errors: Vec<String> },

    /// An extender failed while filtering
    #[error("extender {extender} failed to filter nodes: {message}")]
    #[diagnostic(
        code(scheduler::extender_failed),
        help("Check that the extender is reachable and healthy")
    )]
    ExtenderFailed { extender: String, message: String },

    /// The selector received an empty ranking
    #[error("empty priority list")]
    #[diagnostic(
        code(scheduler::empty_priority_list),
        help("This is likely a bug. Please report it")
    )]
    EmptyPriorityList,

    /// Scheduler policy refers to something that does not exist
    #[error("invalid scheduler policy: {message}")]
    #[diagnostic(
        code(scheduler::invalid_policy),
        help("Run `berth policy` to see the built-in predicates and priorities")
    )]
    Policy { message: String },

    /// Core error (listing, node lookup)
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] berth_core::CoreError),
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a FitError
    pub fn fit_error(pod_name: impl Into<String>, failed_predicates: FailedPredicateMap) -> Self {
        Self::FitError {
            pod_name: pod_name.into(),
            failed_predicates,
        }
    }

    /// Create a PredicateFailed error
    pub fn predicate_failed(
        predicate: impl Into<String>,
        node_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PredicateFailed {
            predicate: predicate.into(),
            node_name: node_name.into(),
            message: message.into(),
        }
    }

    /// Create a PredicateInvariantViolated error
    pub fn predicate_invariant_violated(
        predicate: impl Into<String>,
        node_name: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::PredicateInvariantViolated {
            predicate: predicate.into(),
            node_name: node_name.into(),
            resource: resource.into(),
        }
    }

    /// Create an ExtenderFailed error
    pub fn extender_failed(extender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtenderFailed {
            extender: extender.into(),
            message: message.into(),
        }
    }

    /// Create a Policy error
    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy {
            message: message.into(),
        }
    }

    /// Per-node failure reasons, if this is a FitError
    pub fn failed_predicates(&self) -> Option<&FailedPredicateMap> {
        match self {
            Self::FitError {
                failed_predicates, ..
            } => Some(failed_predicates),
            _ => None,
        }
    }
}
