use crate::{CoreError, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// Resource quantities for nodes and pods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuantities {
    /// CPU in millicores (1000 = 1 core)
    pub cpu_millicores: i64,
    /// Memory in bytes
    pub memory_bytes: i64,
    /// Pod count (only meaningful for node allocatable)
    pub pods: i64,
}

/// Parse a Kubernetes quantity and return `ceil(value * scale)`.
///
/// Accepts plain and fractional numbers with a binary suffix (`Ki` to `Ei`),
/// a decimal suffix (`n`, `u`, `m`, `k`, `M` to `E`) or a decimal exponent
/// (`1e9`, `5E-3`). Negative values and results outside `i64` are rejected.
fn parse_quantity(resource: &str, s: &str, scale: i128) -> Result<i64> {
    let invalid = |message: &str| CoreError::invalid_quantity(resource, s, message);

    let unsigned = s.trim().strip_prefix('+').unwrap_or(s.trim());
    if unsigned.starts_with('-') {
        return Err(invalid("negative quantities are not allowed"));
    }

    let split = unsigned
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && frac.is_empty()) || frac.contains('.') {
        return Err(invalid("expected a number"));
    }

    let (base, exponent): (i128, i32) = match suffix {
        "" => (10, 0),
        "Ki" => (2, 10),
        "Mi" => (2, 20),
        "Gi" => (2, 30),
        "Ti" => (2, 40),
        "Pi" => (2, 50),
        "Ei" => (2, 60),
        "n" => (10, -9),
        "u" => (10, -6),
        "m" => (10, -3),
        "k" => (10, 3),
        "M" => (10, 6),
        "G" => (10, 9),
        "T" => (10, 12),
        "P" => (10, 15),
        "E" => (10, 18),
        _ => {
            let exponent = suffix
                .strip_prefix(&['e', 'E'][..])
                .and_then(|e| e.parse::<i32>().ok())
                .ok_or_else(|| invalid("unknown suffix"))?;
            (10, exponent)
        }
    };

    let too_large = || invalid("value out of range");

    let mut mantissa: i128 = 0;
    for digit in whole.bytes().chain(frac.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .ok_or_else(too_large)?;
    }

    let frac_digits = u32::try_from(frac.len()).map_err(|_| too_large())?;
    let mut numerator = mantissa.checked_mul(scale).ok_or_else(too_large)?;
    let mut denominator = 10i128.checked_pow(frac_digits).ok_or_else(too_large)?;
    let factor = base
        .checked_pow(exponent.unsigned_abs())
        .ok_or_else(too_large)?;
    if exponent >= 0 {
        numerator = numerator.checked_mul(factor).ok_or_else(too_large)?;
    } else {
        denominator = denominator.checked_mul(factor).ok_or_else(too_large)?;
    }

    // Round up, like the API server does when narrowing a quantity
    let mut value = numerator / denominator;
    if numerator % denominator != 0 {
        value += 1;
    }

    i64::try_from(value).map_err(|_| too_large())
}

impl ResourceQuantities {
    /// Parse CPU string into millicores (e.g., "2", "1000m", "0.5")
    pub fn parse_cpu(s: &str) -> Result<i64> {
        parse_quantity("cpu", s, 1000)
    }

    /// Parse memory string into bytes (e.g., "128Mi", "1.5Gi", "16G", "1e9")
    pub fn parse_memory(s: &str) -> Result<i64> {
        parse_quantity("memory", s, 1)
    }

    /// Parse a pod count
    pub fn parse_pods(s: &str) -> Result<i64> {
        parse_quantity("pods", s, 1)
    }

    /// Read cpu, memory and pods out of a k8s-openapi resource map.
    ///
    /// Missing entries count as zero; unparseable ones are an error.
    pub fn from_k8s_resource_map(resources: &BTreeMap<String, Quantity>) -> Result<Self> {
        let read = |name: &str, parse: fn(&str) -> Result<i64>| match resources.get(name) {
            Some(q) => parse(&q.0),
            None => Ok(0),
        };

        Ok(Self {
            cpu_millicores: read("cpu", Self::parse_cpu)?,
            memory_bytes: read("memory", Self::parse_memory)?,
            pods: read("pods", Self::parse_pods)?,
        })
    }

    /// Allocatable resources of a node
    pub fn node_allocatable(node: &Node) -> Result<Self> {
        match node.status.as_ref().and_then(|s| s.allocatable.as_ref()) {
            Some(allocatable) => Self::from_k8s_resource_map(allocatable),
            None => Ok(Self::default()),
        }
    }

    /// Summed container requests of a pod (`pods` is always 1)
    pub fn pod_requests(pod: &Pod) -> Result<Self> {
        let mut total = Self {
            pods: 1,
            ..Default::default()
        };

        let Some(spec) = &pod.spec else {
            return Ok(total);
        };

        for container in &spec.containers {
            if let Some(requests) = container.resources.as_ref().and_then(|r| r.requests.as_ref()) {
                let r = Self::from_k8s_resource_map(requests)?;
                total = total.saturating_add(&Self { pods: 0, ..r });
            }
        }

        Ok(total)
    }

    /// Summed requests of a set of pods
    pub fn sum_requests<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> Result<Self> {
        pods.into_iter()
            .try_fold(Self::default(), |acc, pod| -> Result<Self> {
                Ok(acc.saturating_add(&Self::pod_requests(pod)?))
            })
    }

    /// Component-wise sum, clamped at `i64::MAX`
    pub fn saturating_add(&self, other: &Self) -> Self {
        Self {
            cpu_millicores: self.cpu_millicores.saturating_add(other.cpu_millicores),
            memory_bytes: self.memory_bytes.saturating_add(other.memory_bytes),
            pods: self.pods.saturating_add(other.pods),
        }
    }
}

/// Host ports requested by any container of the pod (zero ports ignored)
pub fn pod_host_ports(pod: &Pod) -> Vec<i32> {
    pod.spec
        .iter()
        .flat_map(|spec| spec.containers.iter())
        .flat_map(|c| c.ports.iter().flatten())
        .filter_map(|p| p.host_port)
        .filter(|port| *port != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, ResourceRequirements};

    fn pod_with(cpu: &str, memory: &str) -> Pod {
        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), Quantity(cpu.to_string()));
        requests.insert("memory".to_string(), Quantity(memory.to_string()));
        Pod {
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    resources: Some(ResourceRequirements {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(ResourceQuantities::parse_cpu("1").unwrap(), 1000);
        assert_eq!(ResourceQuantities::parse_cpu("0.5").unwrap(), 500);
        assert_eq!(ResourceQuantities::parse_cpu("100m").unwrap(), 100);
        assert!(ResourceQuantities::parse_cpu("lots").is_err());
    }

    #[test]
    fn test_parse_cpu_rounds_up() {
        assert_eq!(ResourceQuantities::parse_cpu("1.5").unwrap(), 1500);
        assert_eq!(ResourceQuantities::parse_cpu("0.0001").unwrap(), 1);
        assert_eq!(ResourceQuantities::parse_cpu("2e-3").unwrap(), 2);
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(ResourceQuantities::parse_memory("1024").unwrap(), 1024);
        assert_eq!(ResourceQuantities::parse_memory("1Ki").unwrap(), 1024);
        assert_eq!(
            ResourceQuantities::parse_memory("128Mi").unwrap(),
            128 * 1024 * 1024
        );
        assert_eq!(
            ResourceQuantities::parse_memory("1Gi").unwrap(),
            1024 * 1024 * 1024
        );
        assert_eq!(
            ResourceQuantities::parse_memory("2Ti").unwrap(),
            2 * 1024 * 1024 * 1024 * 1024
        );
    }

    #[test]
    fn test_parse_memory_decimal_suffixes() {
        assert_eq!(ResourceQuantities::parse_memory("16G").unwrap(), 16_000_000_000);
        assert_eq!(ResourceQuantities::parse_memory("500M").unwrap(), 500_000_000);
        assert_eq!(ResourceQuantities::parse_memory("64k").unwrap(), 64_000);
        assert_eq!(ResourceQuantities::parse_memory("1T").unwrap(), 1_000_000_000_000);
    }

    #[test]
    fn test_parse_memory_fractions_and_exponents() {
        assert_eq!(
            ResourceQuantities::parse_memory("1.5Gi").unwrap(),
            1536 * 1024 * 1024
        );
        assert_eq!(ResourceQuantities::parse_memory("1e9").unwrap(), 1_000_000_000);
        assert_eq!(ResourceQuantities::parse_memory("2.5E3").unwrap(), 2500);
        assert_eq!(ResourceQuantities::parse_memory("+10").unwrap(), 10);
    }

    #[test]
    fn test_parse_memory_rejects_garbage() {
        for bad in ["", "lots", "1.2.3", "12parsecs", "-1Gi", "Gi", "1e"] {
            let err = ResourceQuantities::parse_memory(bad).unwrap_err();
            assert!(
                matches!(err, CoreError::InvalidQuantity { .. }),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_parse_memory_overflow_is_an_error() {
        let err = ResourceQuantities::parse_memory("99999999999Gi").unwrap_err();
        assert!(err.to_string().contains("value out of range"));
        assert!(ResourceQuantities::parse_memory("1e30").is_err());
        assert!(ResourceQuantities::parse_memory(&"9".repeat(41)).is_err());
    }

    #[test]
    fn test_invalid_quantity_in_requests_is_reported() {
        let err = ResourceQuantities::pod_requests(&pod_with("1", "lots")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid memory quantity \"lots\": expected a number"
        );
    }

    #[test]
    fn test_sum_requests() {
        let pods = vec![pod_with("500m", "1Gi"), pod_with("1", "512Mi")];
        let total = ResourceQuantities::sum_requests(&pods).unwrap();
        assert_eq!(total.cpu_millicores, 1500);
        assert_eq!(total.memory_bytes, 1536 * 1024 * 1024);
        assert_eq!(total.pods, 2);
    }

    #[test]
    fn test_pod_without_spec_requests_nothing() {
        let r = ResourceQuantities::pod_requests(&Pod::default()).unwrap();
        assert_eq!(r.cpu_millicores, 0);
        assert_eq!(r.memory_bytes, 0);
        assert_eq!(r.pods, 1);
    }

    #[test]
    fn test_pod_host_ports() {
        let mut pod = pod_with("1", "1Gi");
        pod.spec.as_mut().unwrap().containers[0].ports = Some(vec![
            ContainerPort {
                container_port: 80,
                host_port: Some(8080),
                ..Default::default()
            },
            ContainerPort {
                container_port: 9090,
                host_port: None,
                ..Default::default()
            },
        ]);
        assert_eq!(pod_host_ports(&pod), vec![8080]);
    }
}
