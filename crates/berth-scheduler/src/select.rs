use crate::types::{HostPriority, HostPriorityList};
use crate::{Result, SchedulerError};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Mutex;

/// Sort by score descending; equal scores by host name so a seeded draw is reproducible
fn sort_by_priority(list: &mut [HostPriority]) {
    list.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.host.cmp(&b.host)));
}

/// Hosts sharing the highest score, in sorted order
fn best_hosts(sorted: &[HostPriority]) -> Vec<&str> {
    let Some(top) = sorted.first() else {
        return Vec::new();
    };

    sorted
        .iter()
        .take_while(|entry| entry.score == top.score)
        .map(|entry| entry.host.as_str())
        .collect()
}

/// Pick one of the highest scoring hosts uniformly at random.
///
/// The lock is held only for the draw itself.
pub fn select_host(random: &Mutex<StdRng>, mut list: HostPriorityList) -> Result<String> {
    if list.is_empty() {
        return Err(SchedulerError::EmptyPriorityList);
    }

    sort_by_priority(&mut list);
    let hosts = best_hosts(&list);

    let ix = {
        // A poisoned lock still holds a usable generator
        let mut rng = random.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(0..hosts.len())
    };

    Ok(hosts[ix].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn rng(seed: u64) -> Mutex<StdRng> {
        Mutex::new(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_empty_list() {
        let err = select_host(&rng(0), Vec::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::EmptyPriorityList));
    }

    #[test]
    fn test_single_best_host_wins() {
        let list = vec![
            HostPriority::new("machine1.1", 1),
            HostPriority::new("machine2.1", 2),
            HostPriority::new("machine3.1", 0),
        ];
        for seed in 0..20 {
            assert_eq!(select_host(&rng(seed), list.clone()).unwrap(), "machine2.1");
        }
    }

    #[test]
    fn test_best_hosts_prefix() {
        let mut list = vec![
            HostPriority::new("c", 3),
            HostPriority::new("a", 5),
            HostPriority::new("b", 5),
            HostPriority::new("d", 1),
        ];
        sort_by_priority(&mut list);
        assert_eq!(best_hosts(&list), vec!["a", "b"]);
    }

    #[test]
    fn test_same_seed_same_choice() {
        let list = vec![
            HostPriority::new("a", 1),
            HostPriority::new("b", 1),
            HostPriority::new("c", 1),
        ];
        let mut reversed = list.clone();
        reversed.reverse();

        for seed in 0..10 {
            assert_eq!(
                select_host(&rng(seed), list.clone()).unwrap(),
                select_host(&rng(seed), reversed.clone()).unwrap()
            );
        }
    }

    #[test]
    fn test_ties_are_broken_fairly() {
        let list = vec![
            HostPriority::new("a", 10),
            HostPriority::new("b", 10),
            HostPriority::new("c", 10),
            HostPriority::new("d", 3),
        ];
        let random = rng(42);
        let attempts = 3000;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..attempts {
            *counts.entry(select_host(&random, list.clone()).unwrap()).or_default() += 1;
        }

        assert!(!counts.contains_key("d"));
        for host in ["a", "b", "c"] {
            let n = counts[host];
            assert!((800..=1200).contains(&n), "host {host} chosen {n} times");
        }
    }
}
