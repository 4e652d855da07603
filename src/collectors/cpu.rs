use std::time::Instant;
use log::debug;
use crate::collectors::handles::HandleCache;
use crate::collectors::process::{Lookup, ProcessTable};
use crate::metrics::{CpuUsage, PidSet};

/// Sums per-process incremental CPU usage over a whole subtree.
///
/// Each PID is sampled against its own cached baseline, so children that
/// appeared or exited since the last tick only contribute the time they were
/// actually observed. Processes that vanish or deny access contribute zero.
pub fn aggregate(table: &dyn ProcessTable, cache: &mut HandleCache, pids: &PidSet, now: Instant) -> CpuUsage {
    let mut usage = CpuUsage::default();

    for &pid in pids {
        match cache.get(table, pid) {
            Lookup::Found((handle, times)) => usage += handle.observe(times, now),
            Lookup::NotFound => debug!("pid {} exited before its counters were read", pid),
            Lookup::AccessDenied => debug!("pid {} cannot be inspected, skipping", pid),
        }
    }

    usage
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::process::{CpuTimes, ProcessEntry};
    use crate::metrics::Pid;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        times: RefCell<HashMap<Pid, CpuTimes>>,
        reads: Cell<usize>,
    }

    impl Counters {
        fn set(&self, pid: Pid, user: f64, system: f64) {
            self.times.borrow_mut().insert(pid, CpuTimes { user_seconds: user, system_seconds: system, start_time: 1 });
        }

        fn remove(&self, pid: Pid) {
            self.times.borrow_mut().remove(&pid);
        }
    }

    impl ProcessTable for Counters {
        fn refresh(&mut self) {}

        fn processes(&self) -> Vec<ProcessEntry> {
            Vec::new()
        }

        fn cpu_times(&self, pid: Pid) -> Lookup<CpuTimes> {
            self.reads.set(self.reads.get() + 1);
            match self.times.borrow().get(&pid) {
                Some(times) => Lookup::Found(*times),
                None => Lookup::NotFound,
            }
        }
    }

    fn pid_set(pids: &[Pid]) -> PidSet {
        pids.iter().copied().collect()
    }

    fn assert_balanced(usage: CpuUsage) {
        assert!((usage.usr_percent + usage.sys_percent - usage.total_percent).abs() < 1e-9);
    }

    #[test]
    fn first_sample_is_zero() {
        let table = Counters::default();
        table.set(1, 5.0, 5.0);
        table.set(2, 1.0, 0.0);
        let mut cache = HandleCache::new();
        let usage = aggregate(&table, &mut cache, &pid_set(&[1, 2]), Instant::now());
        assert_eq!(usage, CpuUsage::default());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_elapsed_time_is_zero() {
        let table = Counters::default();
        table.set(1, 5.0, 5.0);
        let mut cache = HandleCache::new();
        let t0 = Instant::now();
        aggregate(&table, &mut cache, &pid_set(&[1]), t0);

        table.set(1, 9.0, 7.0);
        assert_eq!(aggregate(&table, &mut cache, &pid_set(&[1]), t0), CpuUsage::default());
    }

    #[test]
    fn sums_subtree_with_per_process_split() {
        let table = Counters::default();
        table.set(1, 3.0, 1.0);
        table.set(2, 1.0, 1.0);
        table.set(3, 0.0, 2.0);
        let pids = pid_set(&[1, 2, 3]);
        let mut cache = HandleCache::new();
        let t0 = Instant::now();
        aggregate(&table, &mut cache, &pids, t0);

        table.set(1, 3.075, 1.025);
        table.set(2, 1.05, 1.05);
        table.set(3, 0.0, 2.1);
        let usage = aggregate(&table, &mut cache, &pids, t0 + Duration::from_secs(1));

        assert!((usage.total_percent - 30.0).abs() < 1e-6);
        let expected_usr = 10.0 * (3.075 / 4.1) + 10.0 * 0.5;
        assert!((usage.usr_percent - expected_usr).abs() < 1e-6);
        assert_balanced(usage);
    }

    #[test]
    fn vanished_process_contributes_nothing() {
        let table = Counters::default();
        table.set(1, 1.0, 0.0);
        table.set(2, 1.0, 0.0);
        let pids = pid_set(&[1, 2]);
        let mut cache = HandleCache::new();
        let t0 = Instant::now();
        aggregate(&table, &mut cache, &pids, t0);

        table.set(1, 1.5, 0.0);
        table.remove(2);
        let usage = aggregate(&table, &mut cache, &pids, t0 + Duration::from_secs(1));
        assert!((usage.total_percent - 50.0).abs() < 1e-6);
        assert!(!cache.contains(2));
        assert_balanced(usage);
    }

    #[test]
    fn child_appearing_mid_run_starts_from_zero() {
        let table = Counters::default();
        table.set(1, 1.0, 0.0);
        let mut cache = HandleCache::new();
        let t0 = Instant::now();
        aggregate(&table, &mut cache, &pid_set(&[1]), t0);

        table.set(1, 1.2, 0.0);
        table.set(2, 30.0, 10.0);
        let usage = aggregate(&table, &mut cache, &pid_set(&[1, 2]), t0 + Duration::from_secs(1));
        assert!((usage.total_percent - 20.0).abs() < 1e-6);
    }

    #[test]
    fn empty_set_is_zero() {
        let table = Counters::default();
        let mut cache = HandleCache::new();
        assert_eq!(aggregate(&table, &mut cache, &PidSet::new(), Instant::now()), CpuUsage::default());
    }

    #[test]
    fn counters_are_read_once_per_process() {
        let table = Counters::default();
        table.set(1, 1.0, 0.0);
        table.set(2, 1.0, 0.0);
        let pids = pid_set(&[1, 2, 3]);
        let mut cache = HandleCache::new();
        let t0 = Instant::now();
        aggregate(&table, &mut cache, &pids, t0);
        assert_eq!(table.reads.get(), 3);

        aggregate(&table, &mut cache, &pids, t0 + Duration::from_secs(1));
        assert_eq!(table.reads.get(), 6);
    }
}
