//! Berth Core - Shared types for the Berth placement scheduler
//!
//! This crate provides:
//! - Re-exported Kubernetes object model (Pod, Node)
//! - Resource quantity parsing and request accounting
//! - Node and pod lister abstractions with in-memory snapshots
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod error;
pub mod listers;
pub mod resources;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use listers::{
    map_pods_to_machines, object_name, NodeInfo, NodeLister, PlacementMap, PodLister,
    StaticNodeLister, StaticPodLister,
};
pub use resources::{pod_host_ports, ResourceQuantities};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{Node, Pod};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Serialize a resource to pretty JSON
pub fn to_json_pretty<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_json::to_string_pretty(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to JSON: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Serialize a resource to YAML
pub fn to_yaml<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from YAML
///
/// JSON is a subset of YAML, so this accepts both formats.
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        CoreError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
