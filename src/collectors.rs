pub mod cpu;
pub mod gpu;
pub mod handles;
pub mod process;

use std::time::{Instant, SystemTime, UNIX_EPOCH};
use log::debug;
use crate::collectors::gpu::AcceleratorCorrelator;
use crate::collectors::handles::HandleCache;
use crate::collectors::process::{ProcessTable, descendants};
use crate::metrics::{PidSet, Snapshot, WorkerRow, WorkerStatus};
use crate::registry::WorkerRegistry;
use crate::resolver::WorkerResolver;


/// Owns every collaborator and the handle cache, and builds one [`Snapshot`] per tick.
pub struct Monitor {
    table: Box<dyn ProcessTable>,
    registry: Box<dyn WorkerRegistry>,
    resolver: WorkerResolver,
    accelerator: AcceleratorCorrelator,
    cache: HandleCache,
}

impl Monitor {
    pub fn new(
        table: Box<dyn ProcessTable>,
        registry: Box<dyn WorkerRegistry>,
        resolver: WorkerResolver,
        accelerator: AcceleratorCorrelator,
    ) -> Self {
        Self {
            table,
            registry,
            resolver,
            accelerator,
            cache: HandleCache::new(),
        }
    }

    pub fn accelerator_supported(&self) -> bool {
        self.accelerator.is_supported()
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    pub fn tick(&mut self) -> Snapshot {
        self.tick_at(Instant::now())
    }

    /// Runs one full sample with `now` as the observation time for every process.
    pub fn tick_at(&mut self, now: Instant) -> Snapshot {
        let mut workers = self.registry.list_workers();
        workers.sort();

        self.table.refresh();
        let processes = self.table.processes();
        let live: PidSet = processes.iter().map(|p| p.pid).collect();
        self.cache.retain_live(&live);

        let rows = workers
            .into_iter()
            .map(|name| {
                let status = match self.resolver.resolve(&name, &processes) {
                    Some(pid) => {
                        let pids = descendants(pid, &processes);
                        debug!("{} -> pid {} ({} processes)", name, pid, pids.len());
                        WorkerStatus::Resolved {
                            pid,
                            cpu: cpu::aggregate(self.table.as_ref(), &mut self.cache, &pids, now),
                            accelerator: self.accelerator.correlate(&pids),
                        }
                    }
                    None => {
                        debug!("{} did not match any process", name);
                        WorkerStatus::Unresolved
                    }
                };
                WorkerRow { name, status }
            })
            .collect();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Snapshot {
            timestamp,
            accelerator_columns: self.accelerator.is_supported(),
            rows,
        }
    }
}
