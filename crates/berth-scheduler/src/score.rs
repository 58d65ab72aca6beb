use crate::extender::SchedulerExtender;
use crate::types::{HostPriority, HostPriorityList, PriorityConfig};
use crate::{Result, SchedulerError};
use berth_core::{object_name, Node, NodeLister, PlacementMap, Pod, PodLister, ResourceQuantities};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Highest score a priority function should give a node
pub const MAX_PRIORITY: i64 = 10;

/// Priority function trait
pub trait PriorityFunction: Send + Sync {
    /// Score every node in `nodes` for the pod (0-10, higher is better)
    fn prioritize(
        &self,
        pod: &Pod,
        placements: &PlacementMap,
        pod_lister: &dyn PodLister,
        nodes: &[Node],
    ) -> Result<HostPriorityList>;

    /// Name of the priority function
    fn name(&self) -> &str;
}

/// Run the weighted priority functions and extenders over the nodes
/// returned by `node_lister` and sum their contributions per host.
///
/// Priority functions run concurrently on the blocking pool, one task per
/// function with a nonzero weight. Their results are merged only once every
/// task has finished; any failure fails the whole stage. Extenders then run
/// concurrently over a fresh listing, and their failures are logged and
/// skipped. The returned list is in no particular order.
pub async fn prioritize_nodes(
    pod: &Pod,
    placements: Arc<PlacementMap>,
    pod_lister: Arc<dyn PodLister>,
    priority_configs: &[PriorityConfig],
    node_lister: &dyn NodeLister,
    extenders: &[Arc<dyn SchedulerExtender>],
) -> Result<HostPriorityList> {
    let active: Vec<PriorityConfig> = priority_configs
        .iter()
        .filter(|config| config.weight != 0)
        .cloned()
        .collect();

    // Without anything to rank by, every node is equally good
    if active.is_empty() && extenders.is_empty() {
        let nodes = node_lister.list()?;
        return EqualPriority.prioritize(pod, &placements, pod_lister.as_ref(), &nodes);
    }

    let mut combined: HashMap<String, i64> = HashMap::new();

    if !active.is_empty() {
        let shared_pod = Arc::new(pod.clone());
        let nodes = Arc::new(node_lister.list()?);
        let mut tasks = JoinSet::new();

        for config in active {
            let pod = Arc::clone(&shared_pod);
            let placements = Arc::clone(&placements);
            let pod_lister = Arc::clone(&pod_lister);
            let nodes = Arc::clone(&nodes);

            tasks.spawn_blocking(move || {
                let result = config
                    .function
                    .prioritize(&pod, &placements, pod_lister.as_ref(), &nodes);
                (config, result)
            });
        }

        let mut partials = Vec::new();
        let mut errors = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((config, Ok(list))) => partials.push((list, config.weight)),
                Ok((config, Err(e))) => {
                    errors.push(format!("{}: {}", config.function.name(), e));
                }
                Err(e) => errors.push(format!("priority task did not complete: {}", e)),
            }
        }

        if !errors.is_empty() {
            return Err(SchedulerError::PriorityFailed { errors });
        }

        for (list, weight) in partials {
            add_weighted(&mut combined, list, weight);
        }
    }

    if !extenders.is_empty() {
        let nodes = node_lister.list()?;

        // Every listed node stays rankable even if no extender scores it
        for node in &nodes {
            combined
                .entry(object_name(&node.metadata).to_string())
                .or_insert(0);
        }

        let results = join_all(extenders.iter().map(|extender| {
            let nodes = &nodes;
            async move { (extender.name(), extender.prioritize(pod, nodes).await) }
        }))
        .await;

        for (name, result) in results {
            match result {
                Ok((list, weight)) => add_weighted(&mut combined, list, weight),
                Err(e) => warn!("Ignoring scores from extender {}: {}", name, e),
            }
        }
    }

    Ok(combined
        .into_iter()
        .map(|(host, score)| {
            debug!("Host {} score {}", host, score);
            HostPriority::new(host, score)
        })
        .collect())
}

fn add_weighted(combined: &mut HashMap<String, i64>, list: HostPriorityList, weight: i64) {
    for entry in list {
        *combined.entry(entry.host).or_insert(0) += entry.score * weight;
    }
}

/// Gives every node a score of one
pub struct EqualPriority;

impl PriorityFunction for EqualPriority {
    fn prioritize(
        &self,
        _pod: &Pod,
        _placements: &PlacementMap,
        _pod_lister: &dyn PodLister,
        nodes: &[Node],
    ) -> Result<HostPriorityList> {
        Ok(nodes
            .iter()
            .map(|node| HostPriority::new(object_name(&node.metadata), 1))
            .collect())
    }

    fn name(&self) -> &str {
        "EqualPriority"
    }
}

/// Allocatable of the node and what would be requested on it if the pod landed there
fn requested_with_pod(
    pod: &Pod,
    placements: &PlacementMap,
    node: &Node,
) -> Result<(ResourceQuantities, ResourceQuantities)> {
    let allocatable = ResourceQuantities::node_allocatable(node)?;
    let existing = placements
        .get(object_name(&node.metadata))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let requested = ResourceQuantities::sum_requests(existing)?
        .saturating_add(&ResourceQuantities::pod_requests(pod)?);

    Ok((allocatable, requested))
}

fn unused_score(requested: i64, capacity: i64) -> i64 {
    if capacity <= 0 || requested > capacity {
        return 0;
    }
    let unused = i128::from(capacity - requested) * i128::from(MAX_PRIORITY);
    (unused / i128::from(capacity)) as i64
}

/// Prefers nodes with the most unrequested cpu and memory
pub struct LeastRequested;

impl PriorityFunction for LeastRequested {
    fn prioritize(
        &self,
        pod: &Pod,
        placements: &PlacementMap,
        _pod_lister: &dyn PodLister,
        nodes: &[Node],
    ) -> Result<HostPriorityList> {
        nodes
            .iter()
            .map(|node| {
                let (allocatable, requested) = requested_with_pod(pod, placements, node)?;
                let cpu = unused_score(requested.cpu_millicores, allocatable.cpu_millicores);
                let memory = unused_score(requested.memory_bytes, allocatable.memory_bytes);
                let score = (cpu + memory) / 2;

                let node_name = object_name(&node.metadata);
                debug!(
                    "Node {} least requested score: {} (CPU score: {}, Memory score: {})",
                    node_name, score, cpu, memory
                );

                Ok(HostPriority::new(node_name, score))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "LeastRequestedPriority"
    }
}

/// Prefers nodes whose cpu and memory would end up equally utilized
pub struct BalancedAllocation;

impl PriorityFunction for BalancedAllocation {
    fn prioritize(
        &self,
        pod: &Pod,
        placements: &PlacementMap,
        _pod_lister: &dyn PodLister,
        nodes: &[Node],
    ) -> Result<HostPriorityList> {
        nodes
            .iter()
            .map(|node| {
                let (allocatable, requested) = requested_with_pod(pod, placements, node)?;
                let cpu_fraction = fraction(requested.cpu_millicores, allocatable.cpu_millicores);
                let memory_fraction = fraction(requested.memory_bytes, allocatable.memory_bytes);

                // Over-committed nodes get nothing
                let score = if cpu_fraction >= 1.0 || memory_fraction >= 1.0 {
                    0
                } else {
                    let variance = (cpu_fraction - memory_fraction).abs();
                    (MAX_PRIORITY as f64 - variance * MAX_PRIORITY as f64) as i64
                };

                let node_name = object_name(&node.metadata);
                debug!(
                    "Node {} balanced allocation score: {} (CPU: {:.3}, Memory: {:.3})",
                    node_name, score, cpu_fraction, memory_fraction
                );

                Ok(HostPriority::new(node_name, score))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "BalancedResourceAllocation"
    }
}

fn fraction(requested: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 1.0;
    }
    requested as f64 / capacity as f64
}

/// Spreads pods that share namespace and labels across nodes
pub struct SelectorSpread;

impl PriorityFunction for SelectorSpread {
    fn prioritize(
        &self,
        pod: &Pod,
        _placements: &PlacementMap,
        pod_lister: &dyn PodLister,
        nodes: &[Node],
    ) -> Result<HostPriorityList> {
        let labels = pod.metadata.labels.clone().unwrap_or_default();
        let mut counts: HashMap<String, i64> = HashMap::new();

        if !labels.is_empty() {
            for other in pod_lister.list()? {
                if other.metadata.namespace != pod.metadata.namespace {
                    continue;
                }
                let Some(host) = other.spec.as_ref().and_then(|s| s.node_name.clone()) else {
                    continue;
                };
                let other_labels = other.metadata.labels.as_ref();
                let matches = labels
                    .iter()
                    .all(|(k, v)| other_labels.and_then(|l| l.get(k)) == Some(v));
                if matches {
                    *counts.entry(host).or_insert(0) += 1;
                }
            }
        }

        let max_count = nodes
            .iter()
            .filter_map(|node| counts.get(object_name(&node.metadata)))
            .copied()
            .max()
            .unwrap_or(0);

        Ok(nodes
            .iter()
            .map(|node| {
                let node_name = object_name(&node.metadata);
                let score = if max_count == 0 {
                    MAX_PRIORITY
                } else {
                    let count = counts.get(node_name).copied().unwrap_or(0);
                    MAX_PRIORITY * (max_count - count) / max_count
                };
                HostPriority::new(node_name, score)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "SelectorSpreadPriority"
    }
}
