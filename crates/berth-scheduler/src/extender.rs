use crate::types::HostPriorityList;
use crate::Result;
use async_trait::async_trait;
use berth_core::{Node, Pod};

/// An external source of extra filtering and scoring.
///
/// Extenders run after the built-in predicates and priority functions, in the
/// order they were registered. A filter error aborts the scheduling attempt;
/// a prioritize error only drops that extender's scores. How an extender is
/// reached (HTTP, gRPC, in-process) is up to the implementation.
#[async_trait]
pub trait SchedulerExtender: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Return the subset of `nodes` the pod may run on
    async fn filter(&self, pod: &Pod, nodes: &[Node]) -> Result<Vec<Node>>;

    /// Score `nodes` for the pod and return the weight to apply to the scores
    async fn prioritize(&self, pod: &Pod, nodes: &[Node]) -> Result<(HostPriorityList, i64)>;
}
