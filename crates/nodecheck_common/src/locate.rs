//! Locating one node's dump file inside an extracted bundle.

use crate::source::Source;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of locating the dump for one `(node, source)` unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Exactly one regular file found.
    File(PathBuf),
    /// No candidate under any capture directory.
    Missing,
    /// A single candidate exists but is not a regular file.
    NotAFile(PathBuf),
    /// More than one capture directory carries this node's dump.
    /// Ambiguity is surfaced, never resolved by picking one.
    Ambiguous(Vec<PathBuf>),
}

/// Find `<extract_root>/*/<subdir>/<node>/<file>` for one source.
///
/// The first path segment is a wildcard because bundles unpack into a
/// top-level directory named by the collector. Candidates are scanned
/// in name order so repeated runs see the same result.
pub fn locate_source_file(extract_root: &Path, source: Source, node: &str) -> Located {
    let entries = match fs::read_dir(extract_root) {
        Ok(entries) => entries,
        Err(_) => return Located::Missing,
    };

    let mut candidates: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| {
            entry
                .path()
                .join(source.subdir())
                .join(node)
                .join(source.file_name())
        })
        .filter(|candidate| candidate.exists())
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Located::Missing,
        1 => {
            let path = candidates.remove(0);
            if path.is_file() {
                Located::File(path)
            } else {
                Located::NotAFile(path)
            }
        }
        _ => Located::Ambiguous(candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn plant_dump(root: &Path, capture: &str, source: Source, node: &str) -> PathBuf {
        let dir = root.join(capture).join(source.subdir()).join(node);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(source.file_name());
        let mut file = File::create(&path).unwrap();
        writeln!(file, "placeholder").unwrap();
        path
    }

    #[test]
    fn test_single_match_is_found() {
        let root = tempfile::tempdir().unwrap();
        let expected = plant_dump(root.path(), "bundle-2024", Source::Top, "node-a");
        assert_eq!(
            locate_source_file(root.path(), Source::Top, "node-a"),
            Located::File(expected)
        );
    }

    #[test]
    fn test_missing_node_reports_missing() {
        let root = tempfile::tempdir().unwrap();
        plant_dump(root.path(), "bundle-2024", Source::Top, "node-a");
        assert_eq!(
            locate_source_file(root.path(), Source::Top, "node-b"),
            Located::Missing
        );
        assert_eq!(
            locate_source_file(root.path(), Source::OsInfo, "node-a"),
            Located::Missing
        );
    }

    #[test]
    fn test_nonexistent_root_reports_missing() {
        let root = tempfile::tempdir().unwrap();
        let gone = root.path().join("never-extracted");
        assert_eq!(
            locate_source_file(&gone, Source::Top, "node-a"),
            Located::Missing
        );
    }

    #[test]
    fn test_directory_in_place_of_dump_is_not_a_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root
            .path()
            .join("bundle-2024")
            .join(Source::Top.subdir())
            .join("node-a")
            .join(Source::Top.file_name());
        fs::create_dir_all(&dir).unwrap();
        assert_eq!(
            locate_source_file(root.path(), Source::Top, "node-a"),
            Located::NotAFile(dir)
        );
    }

    #[test]
    fn test_two_captures_are_ambiguous_in_name_order() {
        let root = tempfile::tempdir().unwrap();
        let second = plant_dump(root.path(), "bundle-b", Source::Top, "node-a");
        let first = plant_dump(root.path(), "bundle-a", Source::Top, "node-a");
        assert_eq!(
            locate_source_file(root.path(), Source::Top, "node-a"),
            Located::Ambiguous(vec![first, second])
        );
    }
}
