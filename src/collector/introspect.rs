//! Introspection capability and its live implementation.

use std::collections::BTreeMap;
use std::time::Instant;

use once_cell::sync::Lazy;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, RefreshKind, System};

use crate::collector::procfs;
use crate::collector::types::{
    CpuInfo, CpuUsage, HeapSpaceStatistics, HeapStatistics, MemoryUsage, ProcessMetrics,
    ResourceUsage, RuntimeHeapMetrics, SystemMetrics, Uptime,
};
use crate::error::CollectionError;
use crate::heap::{self, HeapUsage};

/// Name under which the service reports its own version.
pub const SERVICE_NAME: &str = "multiport-status";

/// Toolchain and dependency versions recorded by the build script.
#[allow(dead_code)]
mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Version of the compiler the service was built with.
pub fn runtime_version() -> &'static str {
    build_info::RUSTC_VERSION
}

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the process start instant. Call once at startup so process uptime
/// counts from launch rather than from the first `/metrics` request.
pub fn mark_process_start() {
    Lazy::force(&PROCESS_START);
}

/// Read-only access to host, heap, and process state.
///
/// The collector only talks to the machine through this trait, so tests can
/// substitute fakes.
pub trait Introspect: Send + Sync {
    /// Host and OS metrics.
    fn read_host_info(&self) -> Result<SystemMetrics, CollectionError>;
    /// Heap statistics.
    fn read_heap_info(&self) -> Result<RuntimeHeapMetrics, CollectionError>;
    /// Process identity and resource usage.
    fn read_process_info(&self) -> Result<ProcessMetrics, CollectionError>;
}

/// Reads the real machine through `sysinfo`, `/proc`, and the tracking allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveIntrospector;

impl LiveIntrospector {
    /// Create a live introspector.
    pub fn new() -> Self {
        Self
    }
}

fn current_pid() -> Result<Pid, CollectionError> {
    sysinfo::get_current_pid().map_err(|e| CollectionError::CurrentPid(e.to_string()))
}

/// Refresh memory and the current process into a fresh [`System`].
fn process_system() -> Result<(System, Pid), CollectionError> {
    let pid = current_pid()?;
    let mut sys = System::new_with_specifics(
        RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
    );
    if !sys.refresh_process(pid) {
        return Err(CollectionError::ProcessNotFound(pid.as_u32()));
    }
    Ok((sys, pid))
}

fn process_memory(sys: &System, pid: Pid) -> Result<MemoryUsage, CollectionError> {
    let process = sys
        .process(pid)
        .ok_or(CollectionError::ProcessNotFound(pid.as_u32()))?;
    Ok(MemoryUsage {
        rss: process.memory(),
        virtual_memory: process.virtual_memory(),
    })
}

impl Introspect for LiveIntrospector {
    fn read_host_info(&self) -> Result<SystemMetrics, CollectionError> {
        let (mut sys, pid) = process_system()?;
        sys.refresh_cpu_specifics(CpuRefreshKind::everything());

        let times = procfs::read_cpu_times()?;
        let cpus = sys
            .cpus()
            .iter()
            .enumerate()
            .map(|(i, cpu)| CpuInfo {
                model: cpu.brand().to_string(),
                speed: cpu.frequency(),
                times: times.get(i).copied().unwrap_or_default(),
            })
            .collect();

        let load = System::load_average();

        Ok(SystemMetrics {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpus,
            total_memory: sys.total_memory(),
            free_memory: sys.free_memory(),
            memory_usage: process_memory(&sys, pid)?,
            load_avg: [load.one, load.five, load.fifteen],
            uptime: Uptime {
                system: System::uptime(),
                process: PROCESS_START.elapsed().as_secs_f64(),
            },
        })
    }

    fn read_heap_info(&self) -> Result<RuntimeHeapMetrics, CollectionError> {
        let (sys, pid) = process_system()?;
        let rss = process_memory(&sys, pid)?.rss;
        Ok(heap_metrics(&heap::usage(), rss, sys.total_memory()))
    }

    fn read_process_info(&self) -> Result<ProcessMetrics, CollectionError> {
        let (sys, pid) = process_system()?;
        let process = sys
            .process(pid)
            .ok_or(CollectionError::ProcessNotFound(pid.as_u32()))?;

        let exec_path = std::env::current_exe().map_err(CollectionError::ExecutablePath)?;
        let title = match process.name() {
            "" => exec_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name => name.to_string(),
        };

        let (user, system) = procfs::read_process_cpu()?;
        let disk = process.disk_usage();

        Ok(ProcessMetrics {
            pid: pid.as_u32(),
            title,
            argv: std::env::args_os()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
            exec_path: exec_path.to_string_lossy().into_owned(),
            version: runtime_version().to_string(),
            versions: versions(),
            env: env_names(std::env::vars_os().map(|(name, _)| name)),
            resource_usage: ResourceUsage {
                rss: process.memory(),
                virtual_memory: process.virtual_memory(),
                disk_read_bytes: disk.total_read_bytes,
                disk_written_bytes: disk.total_written_bytes,
                start_time: process.start_time(),
                run_time: process.run_time(),
            },
            cpu_usage: CpuUsage {
                user,
                system,
                percent: process.cpu_usage(),
            },
        })
    }
}

/// Dependency versions from the lockfile, plus the service and platform.
fn versions() -> BTreeMap<String, String> {
    let mut versions: BTreeMap<String, String> = build_info::DEPENDENCIES
        .iter()
        .map(|&(name, version)| (name.to_string(), version.to_string()))
        .collect();
    versions.insert("rustc".to_string(), runtime_version().to_string());
    versions.insert(SERVICE_NAME.to_string(), env!("CARGO_PKG_VERSION").to_string());
    if let Some(kernel) = System::kernel_version() {
        versions.insert("kernel".to_string(), kernel);
    }
    if let Some(os) = System::os_version() {
        versions.insert("os".to_string(), os);
    }
    versions
}

/// Sorted environment variable names. Only names ever reach this function.
pub fn env_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = std::ffi::OsString>,
{
    let mut names: Vec<String> = names
        .into_iter()
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    names.sort_unstable();
    names
}

/// Convert allocator counters into the heap statistics payload.
pub fn heap_metrics(usage: &HeapUsage, rss: u64, limit: u64) -> RuntimeHeapMetrics {
    let spaces: Vec<HeapSpaceStatistics> = usage
        .spaces
        .iter()
        .map(|space| HeapSpaceStatistics {
            space_name: space.name.to_string(),
            space_size: space.peak as u64,
            space_used_size: space.live as u64,
            space_available_size: space.peak.saturating_sub(space.live) as u64,
        })
        .collect();

    let used = usage.live as u64;
    RuntimeHeapMetrics {
        heap_statistics: HeapStatistics {
            total_heap_size: spaces.iter().map(|s| s.space_size).sum(),
            total_heap_size_executable: 0,
            total_physical_size: rss,
            total_available_size: limit.saturating_sub(used),
            used_heap_size: used,
            heap_size_limit: limit,
            malloced_memory: used,
            peak_malloced_memory: (usage.peak as u64).max(used),
        },
        heap_space_statistics: spaces,
    }
}
