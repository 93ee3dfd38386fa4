//! Replica-count decisions driven by queue pressure.
//!
//! Turns a status scan into a desired replica count for a named service.
//! The computation is pure; callers re-run it on every scan and apply the
//! result through whatever actuates their deployment.

use crate::status::StatusTable;

/// Queue-name prefix covering every merger queue.
const MERGER_PREFIX: &str = "merger:";

/// The single queue the executor demand formula reads.
const EXECUTOR_QUEUE: &str = "executor:execute";

/// Outstanding jobs one merger replica is expected to absorb.
const MERGER_JOBS_PER_REPLICA: u32 = 5;

/// Outstanding jobs one executor replica is expected to absorb.
const EXECUTOR_JOBS_PER_REPLICA: u32 = 10;

/// Computes the desired replica count for `service`.
///
/// Demand formulas:
///
/// - `"merger"`: sum of `queued + running` over every queue named
///   `merger:*`, divided by 5 rounding up
/// - `"executor"`: `queued + running` of the `executor:execute` queue,
///   divided by 10 rounding up; zero when that queue is absent
/// - any other service: zero demand (not an error)
///
/// The result is clamped as `min(max(demand, min_replicas), max_replicas)`;
/// `min_replicas <= max_replicas` is the caller's responsibility and is not
/// validated.
pub fn decide(service: &str, status: &StatusTable, min_replicas: u32, max_replicas: u32) -> u32 {
    let demand = match service {
        "merger" => {
            let jobs: u32 = status
                .iter()
                .filter(|(name, _)| name.starts_with(MERGER_PREFIX))
                .map(|(_, entry)| entry.queued + entry.running)
                .sum();
            jobs.div_ceil(MERGER_JOBS_PER_REPLICA)
        }
        "executor" => match status.get(EXECUTOR_QUEUE) {
            Some(entry) => (entry.queued + entry.running).div_ceil(EXECUTOR_JOBS_PER_REPLICA),
            None => 0,
        },
        _ => 0,
    };

    demand.max(min_replicas).min(max_replicas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusEntry;

    fn table(entries: &[(&str, u32, u32, u32)]) -> StatusTable {
        entries
            .iter()
            .map(|&(name, queued, running, workers)| {
                (
                    name.to_string(),
                    StatusEntry {
                        queued,
                        running,
                        workers,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_merger_sums_prefixed_queues() {
        let status = table(&[("merger:1", 3, 2, 1), ("merger:2", 0, 1, 0)]);
        assert_eq!(decide("merger", &status, 1, 10), 2);
    }

    #[test]
    fn test_merger_ignores_other_queues() {
        let status = table(&[
            ("merger:1", 3, 2, 1),
            ("executor:execute", 50, 50, 0),
            ("unrelated", 9, 9, 9),
        ]);
        assert_eq!(decide("merger", &status, 0, 10), 1);
    }

    #[test]
    fn test_executor_reads_the_execute_queue() {
        let status = table(&[("executor:execute", 21, 0, 0)]);
        assert_eq!(decide("executor", &status, 1, 5), 3);
    }

    #[test]
    fn test_executor_counts_running_jobs() {
        let status = table(&[("executor:execute", 5, 6, 2)]);
        assert_eq!(decide("executor", &status, 0, 10), 2);
    }

    #[test]
    fn test_executor_without_queue_scales_to_min() {
        assert_eq!(decide("executor", &StatusTable::new(), 1, 5), 1);
    }

    #[test]
    fn test_unknown_service_scales_to_min() {
        let status = table(&[("merger:1", 100, 100, 1)]);
        assert_eq!(decide("web", &status, 2, 9), 2);
    }

    #[test]
    fn test_demand_is_clamped_to_max() {
        let status = table(&[("merger:1", 100, 0, 1)]);
        assert_eq!(decide("merger", &status, 1, 10), 10);
    }

    #[test]
    fn test_exact_multiple_does_not_round_up() {
        let status = table(&[("merger:1", 10, 0, 1)]);
        assert_eq!(decide("merger", &status, 0, 10), 2);
    }

    #[test]
    fn test_inverted_bounds_yield_the_upper_bound() {
        // min > max is not validated; the clamp order makes max win.
        let status = table(&[("merger:1", 100, 0, 1)]);
        assert_eq!(decide("merger", &status, 8, 3), 3);
    }
}
