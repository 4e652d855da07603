use serde::Serialize;
use std::collections::BTreeSet;

pub type Pid = u32;
pub type GPUIndex = u32;

/// A root process plus every live descendant at one sampling instant.
pub type PidSet = BTreeSet<Pid>;


#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct CpuUsage {
    pub usr_percent: f64,
    pub sys_percent: f64,
    pub total_percent: f64,
}

impl CpuUsage {
    /// Splits an instantaneous total between user and system time in
    /// proportion to the cumulative counters. Zero cumulative time yields 0/0.
    pub fn apportion(total_percent: f64, user_seconds: f64, system_seconds: f64) -> Self {
        let cumulative = user_seconds + system_seconds;
        if cumulative <= 0.0 {
            return CpuUsage::default();
        }
        let usr_percent = total_percent * (user_seconds / cumulative);
        CpuUsage {
            usr_percent,
            sys_percent: total_percent - usr_percent,
            total_percent,
        }
    }
}

impl std::ops::AddAssign for CpuUsage {
    fn add_assign(&mut self, other: Self) {
        self.usr_percent += other.usr_percent;
        self.sys_percent += other.sys_percent;
        self.total_percent += other.total_percent;
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceleratorReading {
    Usage {
        memory_bytes: u64,
        utilization_percent: u32,
    },
    Unsupported,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerStatus {
    Resolved {
        pid: Pid,
        cpu: CpuUsage,
        accelerator: AcceleratorReading,
    },
    Unresolved,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct WorkerRow {
    pub name: String,
    #[serde(flatten)]
    pub status: WorkerStatus,
}

#[derive(Serialize, Clone, Debug)]
pub struct Snapshot {
    pub timestamp: i64,
    pub accelerator_columns: bool,
    pub rows: Vec<WorkerRow>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apportion_follows_cumulative_share() {
        let usage = CpuUsage::apportion(10.0, 3.0, 1.0);
        assert!((usage.usr_percent - 7.5).abs() < 1e-9);
        assert!((usage.sys_percent - 2.5).abs() < 1e-9);
        assert!((usage.usr_percent + usage.sys_percent - usage.total_percent).abs() < 1e-9);
    }

    #[test]
    fn apportion_without_cumulative_time_is_zero() {
        assert_eq!(CpuUsage::apportion(12.0, 0.0, 0.0), CpuUsage::default());
    }
}
