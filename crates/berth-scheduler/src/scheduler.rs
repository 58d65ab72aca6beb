use crate::extender::SchedulerExtender;
use crate::filter::{find_nodes_that_fit, FitPredicate};
use crate::policy::Policy;
use crate::score::prioritize_nodes;
use crate::select::select_host;
use crate::types::PriorityConfig;
use crate::{Result, SchedulerError};
use berth_core::{
    map_pods_to_machines, object_name, NodeInfo, NodeLister, Pod, PodLister, StaticNodeLister,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Configuration for the scheduler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seed for tie-breaking; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Predicates and priorities to run
    #[serde(default)]
    pub policy: Policy,
}

/// Filter-then-score pod scheduler
///
/// The registries are fixed at construction. One instance may serve any
/// number of concurrent `schedule` calls; they only share the random source
/// used to break ties.
pub struct GenericScheduler {
    predicates: Vec<Arc<dyn FitPredicate>>,
    prioritizers: Vec<PriorityConfig>,
    extenders: Vec<Arc<dyn SchedulerExtender>>,
    pods: Arc<dyn PodLister>,
    random: Mutex<StdRng>,
}

impl GenericScheduler {
    /// Create a new scheduler with an entropy-seeded random source
    pub fn new(
        predicates: Vec<Arc<dyn FitPredicate>>,
        prioritizers: Vec<PriorityConfig>,
        pods: Arc<dyn PodLister>,
    ) -> Self {
        Self {
            predicates,
            prioritizers,
            extenders: Vec::new(),
            pods,
            random: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Build a scheduler from a policy config
    pub fn from_config(
        config: &SchedulerConfig,
        node_info: Arc<dyn NodeInfo>,
        pods: Arc<dyn PodLister>,
    ) -> Result<Self> {
        let predicates = config.policy.build_predicates(node_info)?;
        let prioritizers = config.policy.build_priorities()?;

        let scheduler = Self::new(predicates, prioritizers, pods);
        Ok(match config.seed {
            Some(seed) => scheduler.with_seed(seed),
            None => scheduler,
        })
    }

    /// Consult these extenders, in order, after the built-in functions
    pub fn with_extenders(mut self, extenders: Vec<Arc<dyn SchedulerExtender>>) -> Self {
        self.extenders = extenders;
        self
    }

    /// Seed the tie-breaking random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Pick the node `pod` should run on
    pub async fn schedule(&self, pod: &Pod, node_lister: &dyn NodeLister) -> Result<String> {
        let pod_name = object_name(&pod.metadata);

        let nodes = node_lister.list()?;
        if nodes.is_empty() {
            return Err(SchedulerError::NoNodesAvailable);
        }

        let placements = Arc::new(map_pods_to_machines(self.pods.as_ref())?);

        let (filtered, failed) =
            find_nodes_that_fit(pod, &placements, &self.predicates, &nodes, &self.extenders)
                .await?;

        if filtered.is_empty() {
            for (node_name, reasons) in failed.iter() {
                debug!(
                    "Failed to find fit for pod {} on node {}: {}",
                    pod_name,
                    node_name,
                    reasons.iter().cloned().collect::<Vec<_>>().join(",")
                );
            }
            return Err(SchedulerError::fit_error(pod_name, failed));
        }

        info!(
            "Pod {} has {} feasible nodes",
            pod_name,
            filtered.len()
        );

        let feasible = StaticNodeLister::new(filtered);
        let priorities = prioritize_nodes(
            pod,
            placements,
            Arc::clone(&self.pods),
            &self.prioritizers,
            &feasible,
            &self.extenders,
        )
        .await?;

        let host = select_host(&self.random, priorities)?;

        info!("Selected node {} for pod {}", host, pod_name);

        Ok(host)
    }
}
