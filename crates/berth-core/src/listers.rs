use crate::error::{CoreError, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::HashMap;

/// Pods already assigned to each node, keyed by node name
pub type PlacementMap = HashMap<String, Vec<Pod>>;

/// Source of the current candidate nodes
pub trait NodeLister: Send + Sync {
    /// List all nodes
    fn list(&self) -> Result<Vec<Node>>;
}

/// Source of the pods currently known to the cluster
pub trait PodLister: Send + Sync {
    /// List all pods
    fn list(&self) -> Result<Vec<Pod>>;
}

/// Lookup of full node objects by name
///
/// Fit predicates only receive the candidate's name, so the ones that
/// need capacity, labels or taints resolve the node through this.
pub trait NodeInfo: Send + Sync {
    /// Get a node by name
    fn get_node_info(&self, node_name: &str) -> Result<Node>;
}

/// Name of an object, or "unknown" when unset
pub fn object_name(metadata: &ObjectMeta) -> &str {
    metadata.name.as_deref().unwrap_or("unknown")
}

/// In-memory node lister over a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticNodeLister {
    nodes: Vec<Node>,
}

impl StaticNodeLister {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

impl NodeLister for StaticNodeLister {
    fn list(&self) -> Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

impl NodeInfo for StaticNodeLister {
    fn get_node_info(&self, node_name: &str) -> Result<Node> {
        self.nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(node_name))
            .cloned()
            .ok_or_else(|| CoreError::node_not_found(node_name))
    }
}

/// In-memory pod lister over a fixed snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticPodLister {
    pods: Vec<Pod>,
}

impl StaticPodLister {
    pub fn new(pods: Vec<Pod>) -> Self {
        Self { pods }
    }
}

impl PodLister for StaticPodLister {
    fn list(&self) -> Result<Vec<Pod>> {
        Ok(self.pods.clone())
    }
}

/// Group every assigned pod under the node it is bound to.
///
/// Pods without `spec.nodeName` are not placed anywhere yet and are skipped.
pub fn map_pods_to_machines(lister: &dyn PodLister) -> Result<PlacementMap> {
    let mut machines: PlacementMap = HashMap::new();

    for pod in lister.list()? {
        let Some(host) = pod.spec.as_ref().and_then(|s| s.node_name.clone()) else {
            continue;
        };
        machines.entry(host).or_default().push(pod);
    }

    Ok(machines)
}
