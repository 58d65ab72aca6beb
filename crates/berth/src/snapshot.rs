use berth_core::{from_yaml, Node, Pod};
use berth_scheduler::SchedulerConfig;
use serde::Deserialize;
use std::path::Path;

/// Nodes and pods of a cluster at one point in time
#[derive(Debug, Default, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub pods: Vec<Pod>,
}

fn read(path: &Path) -> miette::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| miette::miette!("Failed to read '{}': {}", path.display(), e))
}

/// Load a YAML or JSON document from disk
fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> miette::Result<T> {
    let data = read(path)?;
    from_yaml(&data).map_err(|e| miette::miette!("Failed to parse '{}': {}", path.display(), e))
}

pub fn load_snapshot(path: &Path) -> miette::Result<ClusterSnapshot> {
    load(path)
}

pub fn load_pod(path: &Path) -> miette::Result<Pod> {
    load(path)
}

pub fn load_config(path: &Path) -> miette::Result<SchedulerConfig> {
    load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_snapshot_yaml() {
        let file = write_temp(
            r#"
nodes:
  - apiVersion: v1
    kind: Node
    metadata:
      name: node1
    status:
      allocatable:
        cpu: "4"
        memory: 8Gi
pods:
  - apiVersion: v1
    kind: Pod
    metadata:
      name: running
      namespace: default
    spec:
      nodeName: node1
      containers:
        - name: app
"#,
        );

        let snapshot = load_snapshot(file.path()).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.pods.len(), 1);
        assert_eq!(
            snapshot.pods[0].spec.as_ref().unwrap().node_name.as_deref(),
            Some("node1")
        );
    }

    #[test]
    fn test_load_pod_json() {
        let file = write_temp(r#"{"apiVersion": "v1", "kind": "Pod", "metadata": {"name": "web"}, "spec": {"containers": [{"name": "web"}]}}"#);
        let pod = load_pod(file.path()).unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("web"));
    }

    #[test]
    fn test_load_config() {
        let file = write_temp(
            r#"
seed: 42
policy:
  predicates:
    - name: PodFitsResources
  priorities:
    - name: LeastRequestedPriority
      weight: 3
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.policy.priorities[0].weight, 3);
    }

    #[test]
    fn test_missing_file() {
        assert!(load_snapshot(Path::new("/nonexistent/snapshot.yaml")).is_err());
    }
}
