//! Line parsers for periodic `top` snapshot dumps.
//!
//! Both parsers are stateless and all-or-nothing: a line either fully
//! matches and appends one value to every series it feeds, or it
//! appends nothing and reports no match. Dumps in the wild are often
//! truncated mid-write, so "no match" is the common case, not an error.

use crate::series::{CpuSample, CpuSeries, LoadSeries};
use chrono::NaiveTime;

const CPU_PREFIX: &str = "%Cpu(s):";
const LOAD_PREFIX: &str = "top - ";
const LOAD_SEPARATOR: &str = ",  load average: ";

/// Parse one `%Cpu(s):` line into the series.
///
/// Expected shape:
/// ```text
/// %Cpu(s): 12.3 us,  4.5 sy,  0.0 ni, 80.0 id,  2.0 wa,  0.1 hi,  0.1 si,  1.0 st
/// ```
///
/// Returns `true` when the line was consumed. A line carrying the
/// prefix but failing to parse in any field leaves the series
/// untouched and reports no match.
pub fn parse_cpu_line(series: &mut CpuSeries, line: &str) -> bool {
    let Some(rest) = line.strip_prefix(CPU_PREFIX) else {
        return false;
    };

    let mut partial = PartialCpuSample::default();
    for part in rest.trim().split(',') {
        let mut fields = part.split_whitespace();
        let (Some(value_str), Some(key), None) = (fields.next(), fields.next(), fields.next())
        else {
            return false;
        };
        let Ok(value) = value_str.parse::<f64>() else {
            return false;
        };
        if !partial.set(key, value) {
            return false;
        }
    }

    match partial.complete() {
        Some(sample) => {
            series.push(sample);
            true
        }
        None => false,
    }
}

/// Parse one `top - <time> ... load average: a, b, c` header line.
///
/// The timestamp is the third whitespace field of the head
/// (`top - 15:06:43 up 3 days` yields `15:06:43`), parsed as
/// `HH:MM:SS`. Exactly three comma-separated load values are required;
/// anything else appends nothing.
pub fn parse_load_line(series: &mut LoadSeries, line: &str) -> bool {
    if !line.starts_with(LOAD_PREFIX) {
        return false;
    }
    let Some((head, tail)) = line.split_once(LOAD_SEPARATOR) else {
        return false;
    };

    let Some(time_str) = head.split_whitespace().nth(2) else {
        return false;
    };
    let Ok(time) = NaiveTime::parse_from_str(time_str, "%H:%M:%S") else {
        return false;
    };

    let loads: Vec<&str> = tail.trim().split(", ").collect();
    if loads.len() != 3 {
        return false;
    }
    let mut parsed = [0.0f64; 3];
    for (slot, raw) in parsed.iter_mut().zip(&loads) {
        match raw.trim().parse::<f64>() {
            Ok(value) => *slot = value,
            Err(_) => return false,
        }
    }

    series.times.push(time);
    series.one_min.push(parsed[0]);
    series.five_min.push(parsed[1]);
    series.fifteen_min.push(parsed[2]);
    true
}

/// Staging area for a CPU line. `complete` only succeeds once every
/// one of the eight keys has been seen.
#[derive(Debug, Default)]
struct PartialCpuSample {
    us: Option<f64>,
    sy: Option<f64>,
    ni: Option<f64>,
    id: Option<f64>,
    wa: Option<f64>,
    hi: Option<f64>,
    si: Option<f64>,
    st: Option<f64>,
}

impl PartialCpuSample {
    fn set(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "us" => &mut self.us,
            "sy" => &mut self.sy,
            "ni" => &mut self.ni,
            "id" => &mut self.id,
            "wa" => &mut self.wa,
            "hi" => &mut self.hi,
            "si" => &mut self.si,
            "st" => &mut self.st,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    fn complete(self) -> Option<CpuSample> {
        Some(CpuSample {
            us: self.us?,
            sy: self.sy?,
            ni: self.ni?,
            id: self.id?,
            wa: self.wa?,
            hi: self.hi?,
            si: self.si?,
            st: self.st?,
        })
    }
}
