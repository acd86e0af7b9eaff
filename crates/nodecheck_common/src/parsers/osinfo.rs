//! Whole-file extraction of static OS facts from an `os_info.txt` dump.
//!
//! The dump is a concatenation of `lscpu`, `/proc/meminfo` and friends,
//! so extraction is regex-based over the whole blob rather than
//! line-oriented.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static MEM_TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MemTotal:\s+(\d+)\s*kB").unwrap());
static CPU_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"CPU\(s\):\s+(\d+)").unwrap());
static ONLINE_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"On-line CPU\(s\) list:\s+([0-9,-]+)").unwrap());

/// Total physical memory in KB, from the `MemTotal:` line.
pub fn parse_total_memory_kb(content: &str) -> Option<u64> {
    first_u64(&MEM_TOTAL_RE, content)
}

/// Total logical CPU count, from the first `CPU(s):` line.
pub fn parse_total_cpu_count(content: &str) -> Option<u64> {
    first_u64(&CPU_COUNT_RE, content)
}

/// Raw on-line CPU list expression, e.g. `"0-15,20"`.
pub fn parse_online_cpu_list(content: &str) -> Option<&str> {
    ONLINE_LIST_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn first_u64(re: &Regex, content: &str) -> Option<u64> {
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Expand a compact CPU list like `"0-15,20"` into sorted, deduplicated ids.
///
/// Each comma-separated part is a single id or an inclusive
/// `start-end` range.
pub fn expand_cpu_ranges(expr: &str) -> Result<Vec<u64>> {
    let mut cpus = BTreeSet::new();
    for part in expr.split(',') {
        let part = part.trim();
        if let Some((start_str, end_str)) = part.split_once('-') {
            let start: u64 = start_str
                .trim()
                .parse()
                .with_context(|| format!("bad CPU range start in {part:?}"))?;
            let end: u64 = end_str
                .trim()
                .parse()
                .with_context(|| format!("bad CPU range end in {part:?}"))?;
            if end < start {
                bail!("descending CPU range {part:?}");
            }
            cpus.extend(start..=end);
        } else {
            let cpu: u64 = part
                .parse()
                .with_context(|| format!("bad CPU id {part:?}"))?;
            cpus.insert(cpu);
        }
    }
    Ok(cpus.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OS_INFO: &str = "\
Architecture:        x86_64
CPU op-mode(s):      32-bit, 64-bit
CPU(s):              16
On-line CPU(s) list: 0-15
Model name:          Intel(R) Xeon(R)

MemTotal:       32768000 kB
MemFree:         8192000 kB
";

    #[test]
    fn test_extracts_memory_and_cpu_scalars() {
        assert_eq!(parse_total_memory_kb(OS_INFO), Some(32_768_000));
        assert_eq!(parse_total_cpu_count(OS_INFO), Some(16));
        assert_eq!(parse_online_cpu_list(OS_INFO), Some("0-15"));
    }

    #[test]
    fn test_missing_sections_yield_none() {
        let blob = "Architecture: x86_64\n";
        assert_eq!(parse_total_memory_kb(blob), None);
        assert_eq!(parse_total_cpu_count(blob), None);
        assert_eq!(parse_online_cpu_list(blob), None);
    }

    #[test]
    fn test_cpu_count_takes_first_match() {
        // lscpu prints "CPU(s): N" before the per-NUMA lists; the first
        // match is the total.
        let blob = "CPU(s):  8\nNUMA node0 CPU(s):   0-7\n";
        assert_eq!(parse_total_cpu_count(blob), Some(8));
    }

    #[test]
    fn test_expand_single_range() {
        assert_eq!(expand_cpu_ranges("0-3").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_expand_mixed_ranges_and_singles() {
        assert_eq!(expand_cpu_ranges("0-3,7").unwrap(), vec![0, 1, 2, 3, 7]);
        assert_eq!(
            expand_cpu_ranges("0-15,20").unwrap().len(),
            17,
        );
    }

    #[test]
    fn test_expand_dedupes_and_sorts() {
        assert_eq!(expand_cpu_ranges("7,0-3,2").unwrap(), vec![0, 1, 2, 3, 7]);
    }

    #[test]
    fn test_expand_rejects_garbage() {
        assert!(expand_cpu_ranges("0-x").is_err());
        assert!(expand_cpu_ranges("five").is_err());
        assert!(expand_cpu_ranges("3-1").is_err());
    }
}
