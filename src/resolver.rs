use std::collections::HashMap;
use crate::collectors::process::ProcessEntry;
use crate::metrics::{Pid, PidSet};

/// Maps logical worker names to an OS process.
///
/// Matching is by substring, first against the joined command line and then
/// against the process name. The first process (in table order) that matches
/// wins; several processes matching the same name is not detected.
///
/// The monitor's own process and its ancestors are never matched, since the
/// search term usually appears in the command line that launched it.
#[derive(Clone, Debug, Default)]
pub struct WorkerResolver {
    aliases: HashMap<String, String>,
    monitor_pid: Option<Pid>,
}

impl WorkerResolver {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases, monitor_pid: None }
    }

    /// Skips `pid` and every process above it in the tree when matching.
    pub fn excluding(mut self, pid: Pid) -> Self {
        self.monitor_pid = Some(pid);
        self
    }

    /// The monitor process and its ancestor chain in `processes`.
    pub fn excluded(&self, processes: &[ProcessEntry]) -> PidSet {
        let mut excluded = PidSet::new();
        let Some(pid) = self.monitor_pid else {
            return excluded;
        };

        let parents: HashMap<Pid, Option<Pid>> = processes.iter().map(|p| (p.pid, p.parent)).collect();
        excluded.insert(pid);
        let mut current = pid;
        while let Some(&Some(parent)) = parents.get(&current) {
            if !parents.contains_key(&parent) || !excluded.insert(parent) {
                break;
            }
            current = parent;
        }
        excluded
    }

    /// The string actually searched for: namespace stripped, alias applied.
    pub fn search_term<'a>(&'a self, worker: &'a str) -> &'a str {
        let clean = worker.trim_start_matches('/');
        self.aliases.get(clean).map(String::as_str).unwrap_or(clean)
    }

    pub fn resolve(&self, worker: &str, processes: &[ProcessEntry]) -> Option<Pid> {
        let term = self.search_term(worker);
        if term.is_empty() {
            return None;
        }

        let excluded = self.excluded(processes);
        processes
            .iter()
            .filter(|process| !excluded.contains(&process.pid))
            .find(|process| {
                (!process.cmdline.is_empty() && process.cmdline.join(" ").contains(term))
                    || process.name.contains(term)
            })
            .map(|process| process.pid)
    }
}
