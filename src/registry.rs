use std::process::Command;
use log::{debug, warn};

pub trait WorkerRegistry {
    /// Logical worker names as reported by the registry. Any failure yields
    /// an empty list.
    fn list_workers(&self) -> Vec<String>;
}

/// Runs an external command and reads one worker name per output line.
#[derive(Clone, Debug)]
pub struct CommandRegistry {
    program: String,
    args: Vec<String>,
}

impl CommandRegistry {
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self { program: program.clone(), args: args.to_vec() })
    }

    pub fn ros2() -> Self {
        Self {
            program: "ros2".to_string(),
            args: vec!["node".to_string(), "list".to_string()],
        }
    }
}

impl WorkerRegistry for CommandRegistry {
    fn list_workers(&self) -> Vec<String> {
        let output = match Command::new(&self.program).args(&self.args).output() {
            Ok(output) => output,
            Err(e) => {
                warn!("Cannot run registry command {}: {}", self.program, e);
                return Vec::new();
            }
        };

        if !output.status.success() {
            debug!(
                "Registry command {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }

        parse_worker_list(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Fixed worker list, for tests and for monitoring without a registry.
#[derive(Clone, Debug, Default)]
pub struct StaticRegistry {
    pub workers: Vec<String>,
}

impl WorkerRegistry for StaticRegistry {
    fn list_workers(&self) -> Vec<String> {
        self.workers.clone()
    }
}

pub fn parse_worker_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
