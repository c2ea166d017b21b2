//! Host platform descriptor recorded alongside inference runs.
//!
//! Detection sits behind [`PlatformDetector`] so callers (and tests) can swap
//! the host detector for a fixed descriptor.

use serde::Serialize;

/// One detected GPU or accelerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceleratorInfo {
    pub name: String,
    /// `nvidia`, `amd`, `intel` or `apple`.
    pub vendor: String,
    pub memory_mb: Option<u64>,
    pub driver_version: Option<String>,
}

/// Platform information for inference tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub os_name: String,
    pub arch: String,
    pub accelerators: Vec<AcceleratorInfo>,
    /// `cuda`, `rocm`, `mps`, `oneapi` or `cpu`.
    pub compute_backend: Option<String>,
}

impl PlatformInfo {
    /// One-line summary, e.g. `linux/x86_64 (cpu)`.
    pub fn summary(&self) -> String {
        let backend = self.compute_backend.as_deref().unwrap_or("unknown");
        if self.accelerators.is_empty() {
            format!("{}/{} ({backend})", self.os_name, self.arch)
        } else {
            let names: Vec<&str> = self.accelerators.iter().map(|a| a.name.as_str()).collect();
            format!(
                "{}/{} ({backend}: {})",
                self.os_name,
                self.arch,
                names.join(", ")
            )
        }
    }
}

pub trait PlatformDetector {
    fn detect(&self) -> PlatformInfo;
}

/// Reports what the standard library knows about the host. Apple Silicon is
/// the only accelerator inferred without vendor tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDetector;

impl PlatformDetector for HostDetector {
    fn detect(&self) -> PlatformInfo {
        let os_name = std::env::consts::OS;
        let arch = std::env::consts::ARCH;

        let (accelerators, backend) = if os_name == "macos" && arch == "aarch64" {
            (
                vec![AcceleratorInfo {
                    name: "Apple Silicon".to_string(),
                    vendor: "apple".to_string(),
                    memory_mb: None,
                    driver_version: None,
                }],
                "mps",
            )
        } else {
            (Vec::new(), "cpu")
        };

        PlatformInfo {
            os_name: os_name.to_string(),
            arch: arch.to_string(),
            accelerators,
            compute_backend: Some(backend.to_string()),
        }
    }
}

/// Returns a fixed descriptor.
#[derive(Debug, Clone)]
pub struct StaticDetector(pub PlatformInfo);

impl PlatformDetector for StaticDetector {
    fn detect(&self) -> PlatformInfo {
        self.0.clone()
    }
}
