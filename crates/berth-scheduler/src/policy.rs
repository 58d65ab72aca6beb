//! Scheduler policy: which predicates and priority functions to run.
//!
//! A policy only names built-in functions. It is resolved once, when the
//! scheduler is built, and the resulting registries never change.

use crate::filter::{
    FitPredicate, HostName, MatchNodeSelector, PodFitsHostPorts, PodFitsResources,
    PodToleratesNodeTaints,
};
use crate::score::{
    BalancedAllocation, EqualPriority, LeastRequested, PriorityFunction, SelectorSpread,
};
use crate::types::PriorityConfig;
use crate::{Result, SchedulerError};
use berth_core::NodeInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Names of the built-in predicates
pub const PREDICATE_NAMES: &[&str] = &[
    "PodFitsResources",
    "MatchNodeSelector",
    "PodToleratesNodeTaints",
    "PodFitsHostPorts",
    "HostName",
];

/// Names of the built-in priority functions
pub const PRIORITY_NAMES: &[&str] = &[
    "EqualPriority",
    "LeastRequestedPriority",
    "BalancedResourceAllocation",
    "SelectorSpreadPriority",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicatePolicy {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityPolicy {
    pub name: String,
    pub weight: i64,
}

/// Predicates and weighted priorities to schedule with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub predicates: Vec<PredicatePolicy>,
    #[serde(default)]
    pub priorities: Vec<PriorityPolicy>,
}

impl Default for Policy {
    fn default() -> Self {
        let predicate = |name: &str| PredicatePolicy {
            name: name.to_string(),
        };
        let priority = |name: &str, weight| PriorityPolicy {
            name: name.to_string(),
            weight,
        };

        Self {
            predicates: vec![
                predicate("PodFitsResources"),
                predicate("MatchNodeSelector"),
                predicate("PodToleratesNodeTaints"),
                predicate("PodFitsHostPorts"),
            ],
            priorities: vec![
                priority("LeastRequestedPriority", 1),
                priority("BalancedResourceAllocation", 1),
            ],
        }
    }
}

fn predicate_by_name(name: &str, info: &Arc<dyn NodeInfo>) -> Option<Arc<dyn FitPredicate>> {
    let predicate: Arc<dyn FitPredicate> = match name {
        "PodFitsResources" => Arc::new(PodFitsResources::new(Arc::clone(info))),
        "MatchNodeSelector" => Arc::new(MatchNodeSelector::new(Arc::clone(info))),
        "PodToleratesNodeTaints" => Arc::new(PodToleratesNodeTaints::new(Arc::clone(info))),
        "PodFitsHostPorts" => Arc::new(PodFitsHostPorts),
        "HostName" => Arc::new(HostName),
        _ => return None,
    };
    Some(predicate)
}

fn priority_by_name(name: &str) -> Option<Arc<dyn PriorityFunction>> {
    let function: Arc<dyn PriorityFunction> = match name {
        "EqualPriority" => Arc::new(EqualPriority),
        "LeastRequestedPriority" => Arc::new(LeastRequested),
        "BalancedResourceAllocation" => Arc::new(BalancedAllocation),
        "SelectorSpreadPriority" => Arc::new(SelectorSpread),
        _ => return None,
    };
    Some(function)
}

impl Policy {
    /// Resolve the predicate names, in policy order
    pub fn build_predicates(&self, info: Arc<dyn NodeInfo>) -> Result<Vec<Arc<dyn FitPredicate>>> {
        let mut seen = HashSet::new();

        self.predicates
            .iter()
            .map(|p| {
                if !seen.insert(p.name.as_str()) {
                    return Err(SchedulerError::policy(format!(
                        "predicate {} listed more than once",
                        p.name
                    )));
                }
                predicate_by_name(&p.name, &info)
                    .ok_or_else(|| SchedulerError::policy(format!("unknown predicate {}", p.name)))
            })
            .collect()
    }

    /// Resolve the priority names and weights, in policy order
    pub fn build_priorities(&self) -> Result<Vec<PriorityConfig>> {
        let mut seen = HashSet::new();

        self.priorities
            .iter()
            .map(|p| {
                if !seen.insert(p.name.as_str()) {
                    return Err(SchedulerError::policy(format!(
                        "priority {} listed more than once",
                        p.name
                    )));
                }
                if p.weight < 0 {
                    return Err(SchedulerError::policy(format!(
                        "priority {} has negative weight {}",
                        p.name, p.weight
                    )));
                }
                let function = priority_by_name(&p.name)
                    .ok_or_else(|| SchedulerError::policy(format!("unknown priority {}", p.name)))?;
                Ok(PriorityConfig::new(function, p.weight))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth_core::StaticNodeLister;

    fn info() -> Arc<dyn NodeInfo> {
        Arc::new(StaticNodeLister::default())
    }

    #[test]
    fn test_default_policy_resolves() {
        let policy = Policy::default();
        let predicates = policy.build_predicates(info()).unwrap();
        let names: Vec<_> = predicates.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "PodFitsResources",
                "MatchNodeSelector",
                "PodToleratesNodeTaints",
                "PodFitsHostPorts"
            ]
        );

        let priorities = policy.build_priorities().unwrap();
        assert_eq!(priorities.len(), 2);
        assert!(priorities.iter().all(|p| p.weight == 1));
    }

    #[test]
    fn test_every_builtin_name_resolves() {
        for name in PREDICATE_NAMES {
            assert!(predicate_by_name(name, &info()).is_some(), "{name}");
        }
        for name in PRIORITY_NAMES {
            assert!(priority_by_name(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_unknown_names_rejected() {
        let policy = Policy {
            predicates: vec![PredicatePolicy {
                name: "NoSuchPredicate".to_string(),
            }],
            priorities: vec![],
        };
        assert!(matches!(
            policy.build_predicates(info()),
            Err(SchedulerError::Policy { .. })
        ));

        let policy = Policy {
            predicates: vec![],
            priorities: vec![PriorityPolicy {
                name: "NoSuchPriority".to_string(),
                weight: 1,
            }],
        };
        assert!(matches!(
            policy.build_priorities(),
            Err(SchedulerError::Policy { .. })
        ));
    }

    #[test]
    fn test_negative_weight_and_duplicates_rejected() {
        let policy = Policy {
            predicates: vec![],
            priorities: vec![PriorityPolicy {
                name: "EqualPriority".to_string(),
                weight: -1,
            }],
        };
        assert!(policy.build_priorities().is_err());

        let policy = Policy {
            predicates: vec![
                PredicatePolicy {
                    name: "HostName".to_string(),
                },
                PredicatePolicy {
                    name: "HostName".to_string(),
                },
            ],
            priorities: vec![],
        };
        assert!(policy.build_predicates(info()).is_err());
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
predicates:
  - name: PodFitsResources
  - name: HostName
priorities:
  - name: LeastRequestedPriority
    weight: 2
  - name: EqualPriority
    weight: 0
"#;
        let policy: Policy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.predicates.len(), 2);
        let priorities = policy.build_priorities().unwrap();
        assert_eq!(priorities[0].weight, 2);
        assert_eq!(priorities[1].function.name(), "EqualPriority");
    }
}
