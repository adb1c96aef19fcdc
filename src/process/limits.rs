use serde::{Deserialize, Serialize};

/// Resource limits for a watched process.
///
/// Limits are checked against sampled usage after the fact; nothing is
/// enforced on the process itself. An unset limit never trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum CPU percentage, summed over the process tree
    #[serde(default)]
    pub cpu_percent: Option<f32>,
    /// Maximum resident memory in KiB, summed over the process tree
    #[serde(default)]
    pub ram_kb: Option<u64>,
}

impl ResourceLimits {
    pub fn new(cpu_percent: Option<f32>, ram_kb: Option<u64>) -> Self {
        Self {
            cpu_percent,
            ram_kb,
        }
    }

    /// Whether sampled CPU usage is strictly above the limit
    pub fn cpu_exceeded(&self, usage: Option<f32>) -> bool {
        match (self.cpu_percent, usage) {
            (Some(limit), Some(usage)) => usage > limit,
            _ => false,
        }
    }

    /// Whether sampled RAM usage (KiB) is strictly above the limit
    pub fn ram_exceeded(&self, usage_kb: Option<u64>) -> bool {
        match (self.ram_kb, usage_kb) {
            (Some(limit), Some(usage)) => usage > limit,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_percent.is_none() && self.ram_kb.is_none()
    }
}
