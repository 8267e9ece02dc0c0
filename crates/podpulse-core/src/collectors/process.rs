//! Process introspection through the `/proc` filesystem.
//!
//! `ProcFs` takes a root directory (normally `/proc`) so tests can point it
//! at a fixture tree. On hosts without `/proc` every read fails with an I/O
//! error, which the registry turns into a skipped metric.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SampleError};
use crate::metric::{Metric, MetricKind, Sample};
use crate::registry::Registry;

type SampleResult<T> = std::result::Result<T, SampleError>;

/// Fields of `/proc/self/stat` used by the process collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStat {
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub starttime_ticks: u64,
    pub vsize_bytes: u64,
    pub rss_pages: u64,
}

/// Parse the single line of `/proc/<pid>/stat`.
///
/// The command name is wrapped in parentheses and may itself contain spaces
/// or parentheses, so fields are counted from the last `)`.
pub fn parse_stat(line: &str) -> SampleResult<ProcStat> {
    let (_, rest) = line
        .rsplit_once(')')
        .ok_or_else(|| SampleError::Parse("stat: missing comm terminator".into()))?;
    // rest[0] is field 3 (state); field n lives at rest[n - 3].
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let field = |n: usize| -> SampleResult<u64> {
        let raw = fields
            .get(n - 3)
            .ok_or_else(|| SampleError::Parse(format!("stat: missing field {n}")))?;
        raw.parse::<i64>()
            .map(|v| v.max(0) as u64)
            .map_err(|e| SampleError::Parse(format!("stat field {n} ({raw}): {e}")))
    };
    Ok(ProcStat {
        utime_ticks: field(14)?,
        stime_ticks: field(15)?,
        starttime_ticks: field(22)?,
        vsize_bytes: field(23)?,
        rss_pages: field(24)?,
    })
}

/// Soft `Max open files` limit from `/proc/<pid>/limits`; `unlimited` is +Inf.
pub fn parse_max_fds(limits: &str) -> SampleResult<f64> {
    let line = limits
        .lines()
        .find(|l| l.starts_with("Max open files"))
        .ok_or_else(|| SampleError::Parse("limits: no 'Max open files' row".into()))?;
    let soft = line["Max open files".len()..]
        .split_whitespace()
        .next()
        .ok_or_else(|| SampleError::Parse("limits: empty 'Max open files' row".into()))?;
    if soft == "unlimited" {
        return Ok(f64::INFINITY);
    }
    soft.parse::<u64>()
        .map(|v| v as f64)
        .map_err(|e| SampleError::Parse(format!("limits soft value ({soft}): {e}")))
}

/// `btime` row of `/proc/stat`, in seconds since the epoch.
pub fn parse_boot_time(stat: &str) -> SampleResult<u64> {
    let raw = stat
        .lines()
        .find_map(|l| l.strip_prefix("btime "))
        .ok_or_else(|| SampleError::Parse("stat: no btime row".into()))?;
    raw.trim()
        .parse()
        .map_err(|e| SampleError::Parse(format!("btime ({raw}): {e}")))
}

/// Host constants needed to convert `/proc` units.
#[derive(Debug, Clone, Copy)]
pub struct HostUnits {
    pub clock_ticks_per_sec: f64,
    pub page_size_bytes: f64,
}

impl HostUnits {
    #[cfg(unix)]
    pub fn detect() -> Self {
        // SAFETY: sysconf only reads static configuration values.
        let (ticks, page) = unsafe { (libc::sysconf(libc::_SC_CLK_TCK), libc::sysconf(libc::_SC_PAGESIZE)) };
        Self {
            clock_ticks_per_sec: if ticks > 0 { ticks as f64 } else { 100.0 },
            page_size_bytes: if page > 0 { page as f64 } else { 4096.0 },
        }
    }

    #[cfg(not(unix))]
    pub fn detect() -> Self {
        Self { clock_ticks_per_sec: 100.0, page_size_bytes: 4096.0 }
    }
}

/// Reader over a `/proc`-shaped directory tree.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    units: HostUnits,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>, units: HostUnits) -> Self {
        Self { root: root.into(), units }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, rel: &str) -> SampleResult<String> {
        Ok(fs::read_to_string(self.root.join(rel))?)
    }

    pub fn self_stat(&self) -> SampleResult<ProcStat> {
        parse_stat(&self.read("self/stat")?)
    }

    pub fn cpu_seconds(&self) -> SampleResult<(f64, f64)> {
        let st = self.self_stat()?;
        let hz = self.units.clock_ticks_per_sec;
        Ok((st.utime_ticks as f64 / hz, st.stime_ticks as f64 / hz))
    }

    pub fn resident_bytes(&self) -> SampleResult<f64> {
        Ok(self.self_stat()?.rss_pages as f64 * self.units.page_size_bytes)
    }

    pub fn virtual_bytes(&self) -> SampleResult<f64> {
        Ok(self.self_stat()?.vsize_bytes as f64)
    }

    pub fn open_fds(&self) -> SampleResult<usize> {
        Ok(fs::read_dir(self.root.join("self/fd"))?.count())
    }

    pub fn max_fds(&self) -> SampleResult<f64> {
        parse_max_fds(&self.read("self/limits")?)
    }

    /// Process start in seconds since the epoch.
    pub fn start_time_seconds(&self) -> SampleResult<f64> {
        let boot = parse_boot_time(&self.read("stat")?)?;
        let st = self.self_stat()?;
        Ok(boot as f64 + st.starttime_ticks as f64 / self.units.clock_ticks_per_sec)
    }
}

fn scalar<F>(name: &str, kind: MetricKind, help: &str, f: F) -> Result<Metric>
where
    F: Fn() -> SampleResult<f64> + Send + Sync + 'static,
{
    Metric::from_fn(name, kind, help, move || Ok(vec![Sample::new(f()?)]))
}

/// Register the `process_*` metrics. `start_time` is captured by the caller
/// once and reported unchanged for the life of the registry.
pub fn register(registry: &Registry, procfs: Arc<ProcFs>, start_time: f64) -> Result<()> {
    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_cpu_user_seconds_total",
        MetricKind::Counter,
        "Total user CPU time spent in seconds.",
        move || Ok(p.cpu_seconds()?.0),
    )?)?;

    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_cpu_system_seconds_total",
        MetricKind::Counter,
        "Total system CPU time spent in seconds.",
        move || Ok(p.cpu_seconds()?.1),
    )?)?;

    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_cpu_seconds_total",
        MetricKind::Counter,
        "Total user and system CPU time spent in seconds.",
        move || {
            let (user, system) = p.cpu_seconds()?;
            Ok(user + system)
        },
    )?)?;

    registry.register(scalar(
        "process_start_time_seconds",
        MetricKind::Gauge,
        "Start time of the process since unix epoch in seconds.",
        move || Ok(start_time),
    )?)?;

    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_resident_memory_bytes",
        MetricKind::Gauge,
        "Resident memory size in bytes.",
        move || p.resident_bytes(),
    )?)?;

    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_virtual_memory_bytes",
        MetricKind::Gauge,
        "Virtual memory size in bytes.",
        move || p.virtual_bytes(),
    )?)?;

    let p = Arc::clone(&procfs);
    registry.register(scalar(
        "process_open_fds",
        MetricKind::Gauge,
        "Number of open file descriptors.",
        move || Ok(p.open_fds()? as f64),
    )?)?;

    registry.register(scalar(
        "process_max_fds",
        MetricKind::Gauge,
        "Maximum number of open file descriptors.",
        move || procfs.max_fds(),
    )?)?;

    Ok(())
}
