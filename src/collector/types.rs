//! Metrics snapshot payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Full point-in-time snapshot served by `/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Host and OS metrics.
    pub system: SystemMetrics,
    /// Heap metrics. The key name is kept for existing dashboard consumers.
    #[serde(rename = "v8")]
    pub heap: RuntimeHeapMetrics,
    /// Process metrics.
    pub process: ProcessMetrics,
    /// Capture time.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

// === Host ===

/// Host and OS metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// OS identifier (`linux`, `macos`, `windows`, ...).
    pub platform: String,
    /// CPU architecture identifier.
    pub arch: String,
    /// Per-core information.
    pub cpus: Vec<CpuInfo>,
    /// Total physical memory in bytes.
    pub total_memory: u64,
    /// Free physical memory in bytes.
    pub free_memory: u64,
    /// Memory used by this process.
    pub memory_usage: MemoryUsage,
    /// 1, 5 and 15 minute load averages.
    pub load_avg: [f64; 3],
    /// Uptimes in seconds.
    pub uptime: Uptime,
}

/// One logical CPU.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuInfo {
    /// CPU model name.
    pub model: String,
    /// Clock speed in MHz.
    pub speed: u64,
    /// Time breakdown in milliseconds.
    pub times: CpuTimes,
}

/// Cumulative CPU time spent per mode, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub sys: u64,
    pub idle: u64,
    pub irq: u64,
}

/// Process memory in bytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Resident set size.
    pub rss: u64,
    /// Virtual memory size.
    #[serde(rename = "virtual")]
    pub virtual_memory: u64,
}

/// Uptimes in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Uptime {
    /// Seconds since boot.
    pub system: u64,
    /// Seconds since this process started.
    pub process: f64,
}

// === Heap ===

/// Heap statistics and per-space breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeHeapMetrics {
    pub heap_statistics: HeapStatistics,
    pub heap_space_statistics: Vec<HeapSpaceStatistics>,
}

/// Aggregate heap sizes, all in bytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeapStatistics {
    pub total_heap_size: u64,
    pub total_heap_size_executable: u64,
    pub total_physical_size: u64,
    pub total_available_size: u64,
    pub used_heap_size: u64,
    pub heap_size_limit: u64,
    pub malloced_memory: u64,
    pub peak_malloced_memory: u64,
}

/// One heap space, all sizes in bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeapSpaceStatistics {
    pub space_name: String,
    pub space_size: u64,
    pub space_used_size: u64,
    pub space_available_size: u64,
}

// === Process ===

/// Process identity and resource usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub pid: u32,
    pub title: String,
    pub argv: Vec<String>,
    pub exec_path: String,
    /// Service version.
    pub version: String,
    /// Versions of the service and the platform it runs on.
    pub versions: BTreeMap<String, String>,
    /// Environment variable names. Values are never collected.
    pub env: Vec<String>,
    pub resource_usage: ResourceUsage,
    pub cpu_usage: CpuUsage,
}

/// Process resource usage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    /// Resident set size in bytes.
    pub rss: u64,
    /// Virtual memory in bytes.
    pub virtual_memory: u64,
    /// Bytes read from disk since start.
    pub disk_read_bytes: u64,
    /// Bytes written to disk since start.
    pub disk_written_bytes: u64,
    /// Process start, seconds since the Unix epoch.
    pub start_time: u64,
    /// Seconds the process has been running.
    pub run_time: u64,
}

/// CPU time consumed by the process.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CpuUsage {
    /// User mode time in microseconds.
    pub user: u64,
    /// Kernel mode time in microseconds.
    pub system: u64,
    /// Usage percentage as reported by the OS since the previous refresh.
    pub percent: f32,
}
