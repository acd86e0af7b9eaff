//! Diagnostic input sources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of diagnostic facts for one node.
///
/// Each `(node, source)` pair is one independent analysis unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Periodic `top` CPU/load snapshot stream (`ttop.txt`).
    Top,
    /// One-shot static OS facts dump (`os_info.txt`).
    OsInfo,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Top, Source::OsInfo];

    /// Directory under a bundle's capture root that holds this source.
    pub fn subdir(self) -> &'static str {
        match self {
            Source::Top => "ttop",
            Source::OsInfo => "node-info",
        }
    }

    /// File name of the dump inside the per-node directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Source::Top => "ttop.txt",
            Source::OsInfo => "os_info.txt",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Top => f.write_str("top"),
            Source::OsInfo => f.write_str("os_info"),
        }
    }
}
