use nvml_wrapper::Nvml;
use nvml_wrapper::enums::device::UsedGpuMemory;
use nvml_wrapper::struct_wrappers::device::ProcessInfo;
use log::{debug, info, warn};
use crate::errors::MonitorError;
use crate::metrics::{AcceleratorReading, GPUIndex, Pid, PidSet};

/// One row of a device's resident-process table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceleratorProcess {
    pub pid: Pid,
    pub device: GPUIndex,
    pub memory_bytes: u64,
}

pub trait AcceleratorBackend {
    fn device_count(&self) -> u32;
    fn compute_processes(&self, device: GPUIndex) -> Result<Vec<AcceleratorProcess>, MonitorError>;
    fn graphics_processes(&self, device: GPUIndex) -> Result<Vec<AcceleratorProcess>, MonitorError>;
    /// Device-wide utilization in percent.
    fn utilization(&self, device: GPUIndex) -> Result<u32, MonitorError>;
}

pub struct NvmlBackend {
    nvml: Nvml,
    device_count: u32,
}

impl NvmlBackend {
    pub fn init() -> Result<Self, MonitorError> {
        let nvml = Nvml::init()?;
        let device_count = nvml.device_count()?;
        Ok(Self { nvml, device_count })
    }
}

fn to_entries(device: GPUIndex, processes: Vec<ProcessInfo>) -> Vec<AcceleratorProcess> {
    processes
        .into_iter()
        .map(|proc_info| AcceleratorProcess {
            pid: proc_info.pid,
            device,
            memory_bytes: match proc_info.used_gpu_memory {
                UsedGpuMemory::Used(bytes) => bytes,
                UsedGpuMemory::Unavailable => 0,
            },
        })
        .collect()
}

impl AcceleratorBackend for NvmlBackend {
    fn device_count(&self) -> u32 {
        self.device_count
    }

    fn compute_processes(&self, device: GPUIndex) -> Result<Vec<AcceleratorProcess>, MonitorError> {
        let handle = self.nvml.device_by_index(device)?;
        Ok(to_entries(device, handle.running_compute_processes()?))
    }

    fn graphics_processes(&self, device: GPUIndex) -> Result<Vec<AcceleratorProcess>, MonitorError> {
        let handle = self.nvml.device_by_index(device)?;
        Ok(to_entries(device, handle.running_graphics_processes()?))
    }

    fn utilization(&self, device: GPUIndex) -> Result<u32, MonitorError> {
        let handle = self.nvml.device_by_index(device)?;
        Ok(handle.utilization_rates()?.gpu)
    }
}

/// Attributes accelerator memory and utilization to a set of PIDs.
/// Whether a driver is present is decided once, when the correlator is built.
pub enum AcceleratorCorrelator {
    Supported(Box<dyn AcceleratorBackend>),
    Unsupported,
}

impl AcceleratorCorrelator {
    pub fn detect() -> Self {
        match NvmlBackend::init() {
            Ok(backend) => {
                info!("Accelerator monitoring enabled for {} device(s)", backend.device_count());
                AcceleratorCorrelator::Supported(Box::new(backend))
            }
            Err(e) => {
                warn!("Failed to initialize NVML: {}", e);
                warn!("GPU monitoring will not be available");
                AcceleratorCorrelator::Unsupported
            }
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, AcceleratorCorrelator::Supported(_))
    }

    pub fn correlate(&self, pids: &PidSet) -> AcceleratorReading {
        let backend = match self {
            AcceleratorCorrelator::Supported(backend) => backend,
            AcceleratorCorrelator::Unsupported => return AcceleratorReading::Unsupported,
        };

        let mut memory_bytes = 0u64;
        let mut max_utilization = 0u32;

        for device in 0..backend.device_count() {
            let mut matched = false;

            // A process may hold both a compute and a graphics context.
            for table in [backend.compute_processes(device), backend.graphics_processes(device)] {
                let entries = match table {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!("Skipping process table of device {}: {}", device, e);
                        continue;
                    }
                };
                for entry in entries.iter().filter(|entry| pids.contains(&entry.pid)) {
                    memory_bytes += entry.memory_bytes;
                    matched = true;
                }
            }

            // Utilization is device-wide, so only the busiest matched device is reported.
            if matched {
                match backend.utilization(device) {
                    Ok(utilization) => max_utilization = max_utilization.max(utilization),
                    Err(e) => debug!("No utilization reading for device {}: {}", device, e),
                }
            }
        }

        AcceleratorReading::Usage {
            memory_bytes,
            utilization_percent: max_utilization,
        }
    }
}
