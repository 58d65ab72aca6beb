use crate::extender::SchedulerExtender;
use crate::types::{FailedPredicateMap, FitResult, PredicateError};
use crate::{Result, SchedulerError};
use berth_core::{
    object_name, pod_host_ports, Node, NodeInfo, PlacementMap, Pod, ResourceQuantities,
};
use k8s_openapi::api::core::v1::{Taint, Toleration};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Fit predicate trait
///
/// A predicate is a pure check of one pod against one node. It only sees the
/// node's name and the pods already placed there; predicates that need the
/// node object resolve it through a [`NodeInfo`].
pub trait FitPredicate: Send + Sync {
    /// Check whether `pod` fits on `node_name`
    fn predicate(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> FitResult;

    /// Name of the predicate, reported when it rejects a node
    fn name(&self) -> &str;
}

/// Run every predicate over every node, then narrow the survivors through
/// the extenders in order.
///
/// Nodes are evaluated one at a time and the first failing predicate stops
/// evaluation for that node. Survivors keep their relative order. Only
/// rejected nodes show up in the returned failure map; nodes dropped by an
/// extender are recorded under the extender's name.
pub async fn find_nodes_that_fit(
    pod: &Pod,
    placements: &PlacementMap,
    predicates: &[Arc<dyn FitPredicate>],
    nodes: &[Node],
    extenders: &[Arc<dyn SchedulerExtender>],
) -> Result<(Vec<Node>, FailedPredicateMap)> {
    let mut filtered = Vec::new();
    let mut failed = FailedPredicateMap::default();

    for node in nodes {
        let node_name = object_name(&node.metadata);
        let existing = placements
            .get(node_name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut fits = true;
        for predicate in predicates {
            let result = predicate.predicate(pod, existing, node_name);

            let reason = match (result.fits, result.error) {
                (true, None) => continue,
                (true, Some(PredicateError::InsufficientResource { resource_name, .. })) => {
                    return Err(SchedulerError::predicate_invariant_violated(
                        predicate.name(),
                        node_name,
                        resource_name,
                    ));
                }
                (_, Some(PredicateError::Failed(message))) => {
                    return Err(SchedulerError::predicate_failed(
                        predicate.name(),
                        node_name,
                        message,
                    ));
                }
                (false, Some(PredicateError::InsufficientResource { resource_name, .. })) => {
                    resource_name
                }
                (false, None) => predicate.name().to_string(),
            };

            debug!(
                "Node {} filtered out by {}: {}",
                node_name,
                predicate.name(),
                reason
            );
            failed.record(node_name, reason);
            fits = false;
            break;
        }

        if fits {
            filtered.push(node.clone());
        }
    }

    if !filtered.is_empty() {
        for extender in extenders {
            let kept = extender
                .filter(pod, &filtered)
                .await
                .map_err(|e| match e {
                    SchedulerError::ExtenderFailed { .. } => e,
                    other => SchedulerError::extender_failed(extender.name(), other.to_string()),
                })?;

            let kept_names: HashSet<&str> =
                kept.iter().map(|n| object_name(&n.metadata)).collect();
            for node in &filtered {
                let node_name = object_name(&node.metadata);
                if !kept_names.contains(node_name) {
                    failed.record(node_name, extender.name());
                }
            }
            filtered = kept;

            debug!(
                "Extender {} left {} feasible nodes",
                extender.name(),
                filtered.len()
            );

            if filtered.is_empty() {
                break;
            }
        }
    }

    Ok((filtered, failed))
}

/// Filter for pod resource requirements against node allocatable
pub struct PodFitsResources {
    info: Arc<dyn NodeInfo>,
}

impl PodFitsResources {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

impl FitPredicate for PodFitsResources {
    fn predicate(&self, pod: &Pod, existing_pods: &[Pod], node_name: &str) -> FitResult {
        let node = match self.info.get_node_info(node_name) {
            Ok(node) => node,
            Err(e) => return FitResult::failed(e.to_string()),
        };

        let quantities = ResourceQuantities::node_allocatable(&node).and_then(|allocatable| {
            let used = ResourceQuantities::sum_requests(existing_pods)?;
            let requested = ResourceQuantities::pod_requests(pod)?;
            Ok((allocatable, used, requested))
        });
        let (allocatable, used, requested) = match quantities {
            Ok(quantities) => quantities,
            Err(e) => return FitResult::failed(e.to_string()),
        };

        debug!(
            "Node {} has CPU: {} milli, Memory: {} bytes, Pods: {}",
            node_name, allocatable.cpu_millicores, allocatable.memory_bytes, allocatable.pods
        );

        // An unset pod capacity means the node does not cap pod count
        if allocatable.pods > 0 && used.pods >= allocatable.pods {
            return FitResult::insufficient("pods", 1, used.pods, allocatable.pods);
        }

        if requested.cpu_millicores == 0 && requested.memory_bytes == 0 {
            return FitResult::fit();
        }

        if allocatable.cpu_millicores - used.cpu_millicores < requested.cpu_millicores {
            return FitResult::insufficient(
                "cpu",
                requested.cpu_millicores,
                used.cpu_millicores,
                allocatable.cpu_millicores,
            );
        }

        if allocatable.memory_bytes - used.memory_bytes < requested.memory_bytes {
            return FitResult::insufficient(
                "memory",
                requested.memory_bytes,
                used.memory_bytes,
                allocatable.memory_bytes,
            );
        }

        FitResult::fit()
    }

    fn name(&self) -> &str {
        "PodFitsResources"
    }
}

/// Filter for node selector
pub struct MatchNodeSelector {
    info: Arc<dyn NodeInfo>,
}

impl MatchNodeSelector {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

impl FitPredicate for MatchNodeSelector {
    fn predicate(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> FitResult {
        let Some(node_selector) = pod.spec.as_ref().and_then(|s| s.node_selector.as_ref()) else {
            return FitResult::fit();
        };

        let node = match self.info.get_node_info(node_name) {
            Ok(node) => node,
            Err(e) => return FitResult::failed(e.to_string()),
        };
        let node_labels = node.metadata.labels.as_ref();

        let matches = node_selector
            .iter()
            .all(|(key, value)| node_labels.and_then(|labels| labels.get(key)) == Some(value));

        if matches {
            FitResult::fit()
        } else {
            FitResult::unfit()
        }
    }

    fn name(&self) -> &str {
        "MatchNodeSelector"
    }
}

/// Filter for taints and tolerations
///
/// Only `NoSchedule` and `NoExecute` taints block placement.
pub struct PodToleratesNodeTaints {
    info: Arc<dyn NodeInfo>,
}

impl PodToleratesNodeTaints {
    pub fn new(info: Arc<dyn NodeInfo>) -> Self {
        Self { info }
    }
}

fn tolerates(toleration: &Toleration, taint: &Taint) -> bool {
    if let Some(effect) = toleration.effect.as_deref() {
        if !effect.is_empty() && effect != taint.effect {
            return false;
        }
    }

    match toleration.operator.as_deref() {
        Some("Exists") => match toleration.key.as_deref() {
            // An empty key with Exists tolerates everything
            None | Some("") => true,
            Some(key) => key == taint.key,
        },
        // Equal is the default operator
        _ => {
            toleration.key.as_deref() == Some(taint.key.as_str())
                && toleration.value.as_deref().unwrap_or("")
                    == taint.value.as_deref().unwrap_or("")
        }
    }
}

impl FitPredicate for PodToleratesNodeTaints {
    fn predicate(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> FitResult {
        let node = match self.info.get_node_info(node_name) {
            Ok(node) => node,
            Err(e) => return FitResult::failed(e.to_string()),
        };

        let Some(taints) = node.spec.as_ref().and_then(|s| s.taints.as_ref()) else {
            return FitResult::fit();
        };

        let tolerations: &[Toleration] = pod
            .spec
            .as_ref()
            .and_then(|s| s.tolerations.as_deref())
            .unwrap_or(&[]);

        for taint in taints {
            if taint.effect != "NoSchedule" && taint.effect != "NoExecute" {
                continue;
            }

            if !tolerations.iter().any(|t| tolerates(t, taint)) {
                debug!(
                    "Pod does not tolerate taint {}={} on node {}",
                    taint.key, taint.effect, node_name
                );
                return FitResult::unfit();
            }
        }

        FitResult::fit()
    }

    fn name(&self) -> &str {
        "PodToleratesNodeTaints"
    }
}

/// Filter for host port conflicts with pods already on the node
pub struct PodFitsHostPorts;

impl FitPredicate for PodFitsHostPorts {
    fn predicate(&self, pod: &Pod, existing_pods: &[Pod], _node_name: &str) -> FitResult {
        let wanted = pod_host_ports(pod);
        if wanted.is_empty() {
            return FitResult::fit();
        }

        let in_use: HashSet<i32> = existing_pods.iter().flat_map(pod_host_ports).collect();

        if wanted.iter().any(|port| in_use.contains(port)) {
            FitResult::unfit()
        } else {
            FitResult::fit()
        }
    }

    fn name(&self) -> &str {
        "PodFitsHostPorts"
    }
}

/// Filter for pods that already name the node they must run on
pub struct HostName;

impl FitPredicate for HostName {
    fn predicate(&self, pod: &Pod, _existing_pods: &[Pod], node_name: &str) -> FitResult {
        match pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) {
            None | Some("") => FitResult::fit(),
            Some(wanted) if wanted == node_name => FitResult::fit(),
            Some(_) => FitResult::unfit(),
        }
    }

    fn name(&self) -> &str {
        "HostName"
    }
}
