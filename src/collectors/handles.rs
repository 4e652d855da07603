//! Per-PID handles whose CPU-time baselines persist between ticks.

use std::collections::HashMap;
use std::time::Instant;
use log::debug;
use crate::collectors::process::{CpuTimes, Lookup, ProcessTable};
use crate::metrics::{CpuUsage, Pid, PidSet};

#[derive(Clone, Copy, Debug)]
struct Baseline {
    total_seconds: f64,
    observed_at: Instant,
}

#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    start_time: u64,
    baseline: Option<Baseline>,
}

impl ProcessHandle {
    fn open(pid: Pid, start_time: u64) -> Self {
        Self { pid, start_time, baseline: None }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Folds a fresh counter reading into the handle and returns the usage
    /// since the previous reading. The baseline moves to `now` in the same
    /// step, so the next call only sees time after this one.
    pub fn observe(&mut self, times: CpuTimes, now: Instant) -> CpuUsage {
        let total_seconds = times.total_seconds();
        let total_percent = match self.baseline {
            Some(prev) => {
                let elapsed = now.saturating_duration_since(prev.observed_at).as_secs_f64();
                if elapsed > 0.0 {
                    (total_seconds - prev.total_seconds).max(0.0) / elapsed * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.baseline = Some(Baseline { total_seconds, observed_at: now });
        CpuUsage::apportion(total_percent, times.user_seconds, times.system_seconds)
    }
}

/// Owns every [`ProcessHandle`]. Entries are removed as soon as their process
/// is observed gone, and never brought back: a recycled PID gets a new handle.
#[derive(Debug, Default)]
pub struct HandleCache {
    handles: HashMap<Pid, ProcessHandle>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.handles.contains_key(&pid)
    }

    /// Returns the cached handle for `pid`, opening one on first use, along
    /// with the counters read to check its identity. A process that is gone
    /// (or not readable) evicts any stale entry.
    pub fn get(&mut self, table: &dyn ProcessTable, pid: Pid) -> Lookup<(&mut ProcessHandle, CpuTimes)> {
        let times = match table.cpu_times(pid) {
            Lookup::Found(times) => times,
            Lookup::NotFound => {
                self.evict(pid);
                return Lookup::NotFound;
            }
            Lookup::AccessDenied => {
                self.evict(pid);
                return Lookup::AccessDenied;
            }
        };

        if let Some(handle) = self.handles.get(&pid) {
            if handle.start_time != times.start_time {
                debug!("pid {} was recycled, dropping its old handle", pid);
                self.handles.remove(&pid);
            }
        }

        let handle = self
            .handles
            .entry(pid)
            .or_insert_with(|| ProcessHandle::open(pid, times.start_time));
        Lookup::Found((handle, times))
    }

    pub fn evict(&mut self, pid: Pid) {
        if self.handles.remove(&pid).is_some() {
            debug!("evicted handle for pid {}", pid);
        }
    }

    /// Drops handles whose PID is absent from the current process listing.
    pub fn retain_live(&mut self, live: &PidSet) {
        let before = self.handles.len();
        self.handles.retain(|pid, _| live.contains(pid));
        let dropped = before - self.handles.len();
        if dropped > 0 {
            debug!("evicted {} handles of exited processes", dropped);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::process::ProcessEntry;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeTable {
        times: RefCell<HashMap<Pid, Lookup<CpuTimes>>>,
    }

    impl FakeTable {
        fn set(&self, pid: Pid, lookup: Lookup<CpuTimes>) {
            self.times.borrow_mut().insert(pid, lookup);
        }
    }

    impl ProcessTable for FakeTable {
        fn refresh(&mut self) {}

        fn processes(&self) -> Vec<ProcessEntry> {
            Vec::new()
        }

        fn cpu_times(&self, pid: Pid) -> Lookup<CpuTimes> {
            self.times.borrow().get(&pid).copied().unwrap_or(Lookup::NotFound)
        }
    }

    fn times(user: f64, system: f64, start_time: u64) -> CpuTimes {
        CpuTimes { user_seconds: user, system_seconds: system, start_time }
    }

    #[test]
    fn repeated_get_returns_the_same_handle() {
        let table = FakeTable::default();
        table.set(7, Lookup::Found(times(1.0, 1.0, 500)));
        let mut cache = HandleCache::new();

        let first = match cache.get(&table, 7) {
            Lookup::Found((handle, _)) => handle as *const ProcessHandle,
            _ => panic!("expected a cached handle"),
        };
        let second = match cache.get(&table, 7) {
            Lookup::Found((handle, _)) => handle as *const ProcessHandle,
            _ => panic!("expected a cached handle"),
        };
        assert!(std::ptr::eq(first, second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_process_is_not_cached() {
        let table = FakeTable::default();
        let mut cache = HandleCache::new();
        assert!(matches!(cache.get(&table, 9), Lookup::NotFound));
        assert!(cache.is_empty());
    }

    #[test]
    fn exited_process_is_evicted() {
        let table = FakeTable::default();
        table.set(7, Lookup::Found(times(1.0, 1.0, 500)));
        let mut cache = HandleCache::new();
        assert!(matches!(cache.get(&table, 7), Lookup::Found(_)));

        table.set(7, Lookup::NotFound);
        assert!(matches!(cache.get(&table, 7), Lookup::NotFound));
        assert!(!cache.contains(7));
    }

    #[test]
    fn denied_process_is_evicted() {
        let table = FakeTable::default();
        table.set(7, Lookup::Found(times(1.0, 1.0, 500)));
        let mut cache = HandleCache::new();
        assert!(matches!(cache.get(&table, 7), Lookup::Found(_)));

        table.set(7, Lookup::AccessDenied);
        assert!(matches!(cache.get(&table, 7), Lookup::AccessDenied));
        assert!(cache.is_empty());
    }

    #[test]
    fn recycled_pid_starts_without_baseline() {
        let table = FakeTable::default();
        let mut cache = HandleCache::new();
        let t0 = Instant::now();

        table.set(7, Lookup::Found(times(1.0, 0.0, 500)));
        if let Lookup::Found((handle, _)) = cache.get(&table, 7) {
            handle.observe(times(1.0, 0.0, 500), t0);
            assert!(handle.has_baseline());
        }

        table.set(7, Lookup::Found(times(4.0, 0.0, 900)));
        match cache.get(&table, 7) {
            Lookup::Found((handle, read)) => {
                assert_eq!(handle.start_time(), 900);
                assert_eq!(read.user_seconds, 4.0);
                assert!(!handle.has_baseline());
                let usage = handle.observe(read, t0 + Duration::from_secs(1));
                assert_eq!(usage, CpuUsage::default());
            }
            _ => panic!("recycled pid should resolve to a fresh handle"),
        }
    }

    #[test]
    fn observe_measures_since_previous_reading() {
        let mut handle = ProcessHandle::open(3, 1);
        let t0 = Instant::now();
        assert_eq!(handle.observe(times(1.0, 1.0, 1), t0), CpuUsage::default());

        let usage = handle.observe(times(1.3, 1.1, 1), t0 + Duration::from_secs(2));
        assert!((usage.total_percent - 20.0).abs() < 1e-9);
        assert!((usage.usr_percent + usage.sys_percent - usage.total_percent).abs() < 1e-9);
        assert!((usage.usr_percent - 20.0 * 1.3 / 2.4).abs() < 1e-9);
    }

    #[test]
    fn observe_with_no_elapsed_time_is_zero() {
        let mut handle = ProcessHandle::open(3, 1);
        let t0 = Instant::now();
        handle.observe(times(1.0, 1.0, 1), t0);
        assert_eq!(handle.observe(times(5.0, 1.0, 1), t0), CpuUsage::default());
    }

    #[test]
    fn retain_live_drops_exited_pids() {
        let table = FakeTable::default();
        table.set(3, Lookup::Found(times(0.0, 0.0, 1)));
        table.set(4, Lookup::Found(times(0.0, 0.0, 1)));
        let mut cache = HandleCache::new();
        let _ = cache.get(&table, 3);
        let _ = cache.get(&table, 4);

        cache.retain_live(&PidSet::from([8, 1, 4]));
        assert!(!cache.contains(3));
        assert!(cache.contains(4));
    }
}
