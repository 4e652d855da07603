use sysinfo::{System, Pid as SysPid, ProcessRefreshKind, ProcessesToUpdate};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use crate::metrics::{Pid, PidSet};

/// Outcome of querying a single process or device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    AccessDenied,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub name: String,
    pub cmdline: Vec<String>,
}

/// Cumulative CPU counters of one process, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CpuTimes {
    pub user_seconds: f64,
    pub system_seconds: f64,
    /// Start time in clock ticks since boot; identifies the process across PID reuse.
    pub start_time: u64,
}

impl CpuTimes {
    pub fn total_seconds(&self) -> f64 {
        self.user_seconds + self.system_seconds
    }
}

pub trait ProcessTable {
    /// Re-reads the process list. Called once at the start of every tick.
    fn refresh(&mut self);

    /// Live processes in ascending PID order.
    fn processes(&self) -> Vec<ProcessEntry>;

    fn cpu_times(&self, pid: Pid) -> Lookup<CpuTimes>;
}

/// Collects the root and all of its transitive children from one table listing.
/// Returns an empty set when the root is gone.
pub fn descendants(root: Pid, processes: &[ProcessEntry]) -> PidSet {
    let mut pids = PidSet::new();
    if !processes.iter().any(|p| p.pid == root) {
        return pids;
    }

    let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for process in processes {
        if let Some(parent) = process.parent {
            if parent != process.pid {
                children.entry(parent).or_default().push(process.pid);
            }
        }
    }

    let mut pending = vec![root];
    while let Some(pid) = pending.pop() {
        if !pids.insert(pid) {
            continue;
        }
        if let Some(kids) = children.get(&pid) {
            pending.extend(kids.iter().copied());
        }
    }
    pids
}

/// Process table backed by `sysinfo` for the listing and `/proc/<pid>/stat`
/// for the split user/system counters.
pub struct SysinfoProcessTable {
    system: System,
    clock_ticks: f64,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        let clock_ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        Self {
            system: System::new(),
            clock_ticks: if clock_ticks > 0 { clock_ticks as f64 } else { 100.0 },
        }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn refresh(&mut self) {
        self.system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::everything());
    }

    fn processes(&self) -> Vec<ProcessEntry> {
        let mut entries: Vec<ProcessEntry> = self
            .system
            .processes()
            .iter()
            // Threads show up as processes on Linux; only real processes form the tree.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                parent: process.parent().map(SysPid::as_u32),
                name: process.name().to_string_lossy().into_owned(),
                cmdline: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.pid);
        entries
    }

    fn cpu_times(&self, pid: Pid) -> Lookup<CpuTimes> {
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => match parse_stat(&stat, self.clock_ticks) {
                Some(times) => Lookup::Found(times),
                None => Lookup::NotFound,
            },
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Lookup::AccessDenied,
            Err(_) => Lookup::NotFound,
        }
    }
}

/// Parses utime, stime and starttime out of a `/proc/<pid>/stat` line.
fn parse_stat(stat: &str, clock_ticks: f64) -> Option<CpuTimes> {
    // The command name may contain spaces and parentheses; fields resume after the last ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // Field 3 (state) is fields[0], so field N lives at N - 3.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let start_time: u64 = fields.get(19)?.parse().ok()?;
    Some(CpuTimes {
        user_seconds: utime as f64 / clock_ticks,
        system_seconds: stime as f64 / clock_ticks,
        start_time,
    })
}
