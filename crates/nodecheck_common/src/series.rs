//! Accumulated per-node series and scalars parsed from diagnostic dumps.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// One fully parsed `%Cpu(s):` snapshot.
///
/// Samples are staged as a whole before touching any series, so a
/// malformed line can never leave columns with unequal lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuSample {
    pub us: f64,
    pub sy: f64,
    pub ni: f64,
    pub id: f64,
    pub wa: f64,
    pub hi: f64,
    pub si: f64,
    pub st: f64,
}

impl CpuSample {
    /// Derived busy share of this sample.
    pub fn total(&self) -> f64 {
        100.0 - self.id
    }

    /// System-to-user ratio used to classify the dominant CPU consumer.
    ///
    /// Both shares zero yields 0. A zero `us` with non-zero `sy` is
    /// substituted with `sy * 10` before dividing, which pins the ratio
    /// at 10% instead of letting it blow up. Intentional heuristic,
    /// keep as is.
    pub fn jpdm(&self) -> f64 {
        if self.us == 0.0 && self.sy == 0.0 {
            return 0.0;
        }
        let us = if self.us == 0.0 {
            self.sy * 10.0
        } else {
            self.us
        };
        self.sy / us * 100.0
    }
}

/// Fixed-schema CPU time series for one node.
///
/// One column per `top` CPU field plus the derived `total` and `jpdm`
/// columns. All columns always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSeries {
    pub us: Vec<f64>,
    pub sy: Vec<f64>,
    pub ni: Vec<f64>,
    pub id: Vec<f64>,
    pub wa: Vec<f64>,
    pub hi: Vec<f64>,
    pub si: Vec<f64>,
    pub st: Vec<f64>,
    pub total: Vec<f64>,
    pub jpdm: Vec<f64>,
}

impl CpuSeries {
    /// Append one sample to every column, derived columns included.
    pub fn push(&mut self, sample: CpuSample) {
        self.us.push(sample.us);
        self.sy.push(sample.sy);
        self.ni.push(sample.ni);
        self.id.push(sample.id);
        self.wa.push(sample.wa);
        self.hi.push(sample.hi);
        self.si.push(sample.si);
        self.st.push(sample.st);
        self.total.push(sample.total());
        self.jpdm.push(sample.jpdm());
    }

    pub fn len(&self) -> usize {
        self.us.len()
    }

    pub fn is_empty(&self) -> bool {
        self.us.is_empty()
    }
}

/// Load averages over time for one node.
///
/// Stored as independent sequences: if parsing a dump fails part-way,
/// these are not guaranteed to match the CPU series length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSeries {
    pub times: Vec<NaiveTime>,
    pub one_min: Vec<f64>,
    pub five_min: Vec<f64>,
    pub fifteen_min: Vec<f64>,
}

impl LoadSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// One-shot OS facts for a node, from the `os_info.txt` dump.
///
/// Every field is optional: a dump may be truncated, and rules that
/// read a missing scalar skip silently rather than fail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsFacts {
    pub total_memory_kb: Option<u64>,
    pub total_cpu_count: Option<u64>,
    /// Raw on-line CPU list expression, e.g. `"0-15,20"`.
    pub online_cpu_list: Option<String>,
    pub online_cpu_count: Option<u64>,
}

/// Arithmetic mean, or `None` for an empty series.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
