//! Linux `/proc` readers for values `sysinfo` does not expose.
//!
//! On other platforms the readers return empty or zeroed values.

use crate::collector::types::CpuTimes;
use crate::error::CollectionError;

/// Milliseconds per clock tick. USER_HZ is 100 on every Linux ABI.
const MS_PER_TICK: u64 = 10;
/// Microseconds per clock tick.
const US_PER_TICK: u64 = MS_PER_TICK * 1000;

const PROC_STAT: &str = "/proc/stat";
const PROC_SELF_STAT: &str = "/proc/self/stat";

/// Parse per-core lines (`cpu0`, `cpu1`, ...) of `/proc/stat`.
pub fn parse_cpu_times(contents: &str) -> Result<Vec<CpuTimes>, CollectionError> {
    contents
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .map(|line| {
            let ticks: Vec<u64> = line
                .split_whitespace()
                .skip(1)
                .map(str::parse::<u64>)
                .collect::<Result<_, _>>()
                .map_err(|e| CollectionError::ProcParse {
                    path: PROC_STAT,
                    reason: format!("{e} in line {line:?}"),
                })?;
            if ticks.len() < 6 {
                return Err(CollectionError::ProcParse {
                    path: PROC_STAT,
                    reason: format!("expected at least 6 counters in line {line:?}"),
                });
            }
            // user nice system idle iowait irq ...
            Ok(CpuTimes {
                user: ticks[0] * MS_PER_TICK,
                nice: ticks[1] * MS_PER_TICK,
                sys: ticks[2] * MS_PER_TICK,
                idle: ticks[3] * MS_PER_TICK,
                irq: ticks[5] * MS_PER_TICK,
            })
        })
        .collect()
}

/// Parse user and system CPU time, in microseconds, from `/proc/self/stat`.
pub fn parse_process_cpu(contents: &str) -> Result<(u64, u64), CollectionError> {
    let parse_err = |reason: &str| CollectionError::ProcParse {
        path: PROC_SELF_STAT,
        reason: reason.to_string(),
    };

    // comm (field 2) may contain spaces and parens; fields resume after the last ')'
    let close = contents.rfind(')').ok_or_else(|| parse_err("missing comm terminator"))?;
    let fields: Vec<&str> = contents[close + 1..].split_whitespace().collect();

    // fields[0] is field 3 (state); utime is field 14, stime field 15
    let field = |index: usize, name: &str| -> Result<u64, CollectionError> {
        fields
            .get(index)
            .ok_or_else(|| parse_err(&format!("missing {name}")))?
            .parse::<u64>()
            .map_err(|e| parse_err(&format!("bad {name}: {e}")))
    };

    Ok((field(11, "utime")? * US_PER_TICK, field(12, "stime")? * US_PER_TICK))
}

/// Per-core CPU times for the host.
#[cfg(target_os = "linux")]
pub fn read_cpu_times() -> Result<Vec<CpuTimes>, CollectionError> {
    let contents = std::fs::read_to_string(PROC_STAT).map_err(|source| CollectionError::ProcRead {
        path: PROC_STAT,
        source,
    })?;
    parse_cpu_times(&contents)
}

/// Per-core CPU times for the host.
#[cfg(not(target_os = "linux"))]
pub fn read_cpu_times() -> Result<Vec<CpuTimes>, CollectionError> {
    Ok(Vec::new())
}

/// User and system CPU time of this process in microseconds.
#[cfg(target_os = "linux")]
pub fn read_process_cpu() -> Result<(u64, u64), CollectionError> {
    let contents =
        std::fs::read_to_string(PROC_SELF_STAT).map_err(|source| CollectionError::ProcRead {
            path: PROC_SELF_STAT,
            source,
        })?;
    parse_process_cpu(&contents)
}

/// User and system CPU time of this process in microseconds.
#[cfg(not(target_os = "linux"))]
pub fn read_process_cpu() -> Result<(u64, u64), CollectionError> {
    Ok((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STAT: &str = "cpu  1000 20 300 40000 50 6 7 0 0 0\n\
                        cpu0 600 10 200 20000 25 4 3 0 0 0\n\
                        cpu1 400 10 100 20000 25 2 4 0 0 0\n\
                        intr 12345 0 0\n\
                        ctxt 999\n";

    #[test]
    fn parses_per_core_lines_only() {
        let times = parse_cpu_times(STAT).unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(
            times[0],
            CpuTimes {
                user: 6000,
                nice: 100,
                sys: 2000,
                idle: 200_000,
                irq: 40,
            }
        );
        assert_eq!(times[1].irq, 20);
    }

    #[test]
    fn rejects_short_cpu_line() {
        assert!(parse_cpu_times("cpu0 1 2 3\n").is_err());
    }

    #[test]
    fn rejects_non_numeric_counter() {
        assert!(parse_cpu_times("cpu0 1 2 x 4 5 6\n").is_err());
    }

    #[test]
    fn parses_process_cpu_with_spaces_in_comm() {
        let stat = "4242 (my (odd) proc) S 1 4242 4242 0 -1 4194560 100 0 0 0 25 7 0 0 20 0 4 0 1000 0 0";
        let (user, system) = parse_process_cpu(stat).unwrap();
        assert_eq!(user, 250_000);
        assert_eq!(system, 70_000);
    }

    #[test]
    fn rejects_truncated_process_stat() {
        assert!(parse_process_cpu("1 (x) S 1 2").is_err());
        assert!(parse_process_cpu("garbage").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_live_proc() {
        assert!(!read_cpu_times().unwrap().is_empty());
        assert!(read_process_cpu().is_ok());
    }
}
