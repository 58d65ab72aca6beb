use crate::score::PriorityFunction;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Why a predicate could not place the pod
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The node lacks a named resource. Reported per node by resource name.
    #[error(
        "Insufficient {resource_name}: requested {requested}, used {used}, capacity {capacity}"
    )]
    InsufficientResource {
        resource_name: String,
        requested: i64,
        used: i64,
        capacity: i64,
    },

    /// The predicate could not be evaluated at all
    #[error("{0}")]
    Failed(String),
}

/// Outcome of one predicate against one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitResult {
    /// Whether the pod fits
    pub fits: bool,
    /// Detail accompanying the outcome, if any
    pub error: Option<PredicateError>,
}

impl FitResult {
    /// The pod fits
    pub fn fit() -> Self {
        Self {
            fits: true,
            error: None,
        }
    }

    /// The pod does not fit; the predicate's name is the reason
    pub fn unfit() -> Self {
        Self {
            fits: false,
            error: None,
        }
    }

    /// The pod does not fit because the node lacks `resource_name`
    pub fn insufficient(
        resource_name: impl Into<String>,
        requested: i64,
        used: i64,
        capacity: i64,
    ) -> Self {
        Self {
            fits: false,
            error: Some(PredicateError::InsufficientResource {
                resource_name: resource_name.into(),
                requested,
                used,
                capacity,
            }),
        }
    }

    /// The predicate itself failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            fits: false,
            error: Some(PredicateError::Failed(message.into())),
        }
    }
}

/// Rejection reasons accumulated per node during one attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailedPredicateMap {
    nodes: BTreeMap<String, BTreeSet<String>>,
}

impl FailedPredicateMap {
    /// Record a rejection reason for a node
    pub fn record(&mut self, node_name: impl Into<String>, reason: impl Into<String>) {
        self.nodes
            .entry(node_name.into())
            .or_default()
            .insert(reason.into());
    }

    /// Reasons recorded for a node
    pub fn get(&self, node_name: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(node_name)
    }

    pub fn contains_node(&self, node_name: &str) -> bool {
        self.nodes.contains_key(node_name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.nodes.iter()
    }

    /// One reason out of one node's set, used for short error messages
    pub fn representative_reason(&self) -> Option<&str> {
        self.nodes
            .values()
            .find_map(|reasons| reasons.iter().next())
            .map(String::as_str)
    }
}

/// Score of a single host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPriority {
    /// Node name
    pub host: String,
    /// Score (0-10 per function, higher is better; summed after weighting)
    pub score: i64,
}

impl HostPriority {
    /// Create a new host priority
    pub fn new(host: impl Into<String>, score: i64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}

pub type HostPriorityList = Vec<HostPriority>;

/// A registered priority function and its weight
#[derive(Clone)]
pub struct PriorityConfig {
    pub function: Arc<dyn PriorityFunction>,
    /// Multiplier for this function's scores. Zero disables the function.
    pub weight: i64,
}

impl PriorityConfig {
    pub fn new(function: Arc<dyn PriorityFunction>, weight: i64) -> Self {
        Self { function, weight }
    }
}

impl std::fmt::Debug for PriorityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityConfig")
            .field("function", &self.function.name())
            .field("weight", &self.weight)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_result() {
        let fit = FitResult::fit();
        assert!(fit.fits);
        assert!(fit.error.is_none());

        let insufficient = FitResult::insufficient("cpu", 2000, 500, 2000);
        assert!(!insufficient.fits);
        assert_eq!(
            insufficient.error.unwrap().to_string(),
            "Insufficient cpu: requested 2000, used 500, capacity 2000"
        );
    }

    #[test]
    fn test_failed_predicate_map_dedups_reasons() {
        let mut failed = FailedPredicateMap::default();
        assert!(failed.is_empty());
        assert!(failed.representative_reason().is_none());

        failed.record("node1", "cpu");
        failed.record("node1", "cpu");
        failed.record("node2", "PodFitsHostPorts");

        assert_eq!(failed.len(), 2);
        assert_eq!(failed.get("node1").unwrap().len(), 1);
        assert!(failed.contains_node("node2"));
        assert!(!failed.contains_node("node3"));
        assert_eq!(failed.representative_reason(), Some("cpu"));
    }
}
