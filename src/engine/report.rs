//! engine::report
//!
//! What a walk copied, and how big it is.

use std::path::PathBuf;

use serde::Serialize;

/// Number of files listed in the size summary.
pub const LARGEST_SHOWN: usize = 10;

/// One file in the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopiedFile {
    /// Path relative to the output directory
    pub path: PathBuf,
    /// Size on disk after stripping
    pub bytes: u64,
}

/// All files copied by a walk, in copy order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyReport {
    files: Vec<CopiedFile>,
}

impl CopyReport {
    pub fn new(files: Vec<CopiedFile>) -> Self {
        Self { files }
    }

    /// Files in copy order.
    pub fn files(&self) -> &[CopiedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of all file sizes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    /// The `n` largest files, biggest first. Ties keep copy order.
    pub fn largest(&self, n: usize) -> Vec<&CopiedFile> {
        let mut sorted: Vec<&CopiedFile> = self.files.iter().collect();
        sorted.sort_by(|a, b| b.bytes.cmp(&a.bytes));
        sorted.truncate(n);
        sorted
    }

    /// Swap the path of a file, after it was renamed in the output tree.
    pub fn rename(&mut self, from: &std::path::Path, to: PathBuf) {
        if let Some(file) = self.files.iter_mut().find(|f| f.path == from) {
            file.path = to;
        }
    }

    /// Record the new size of a file rewritten after the copy.
    pub fn resize(&mut self, path: &std::path::Path, bytes: u64) {
        if let Some(file) = self.files.iter_mut().find(|f| f.path == path) {
            file.bytes = bytes;
        }
    }

    /// Serializable summary for `--json`.
    pub fn summary(&self, n: usize) -> ReportSummary<'_> {
        ReportSummary {
            file_count: self.len(),
            total_bytes: self.total_bytes(),
            largest: self.largest(n),
        }
    }
}

/// Size summary of a report.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub file_count: usize,
    pub total_bytes: u64,
    pub largest: Vec<&'a CopiedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sizes: &[(&str, u64)]) -> CopyReport {
        CopyReport::new(
            sizes
                .iter()
                .map(|(p, b)| CopiedFile {
                    path: PathBuf::from(p),
                    bytes: *b,
                })
                .collect(),
        )
    }

    #[test]
    fn largest_sorted_descending() {
        let r = report(&[("a", 5), ("b", 50), ("c", 20)]);
        let names: Vec<_> = r.largest(2).iter().map(|f| f.path.clone()).collect();
        assert_eq!(names, vec![PathBuf::from("b"), PathBuf::from("c")]);
    }

    #[test]
    fn ties_keep_copy_order() {
        let r = report(&[("first", 7), ("second", 7)]);
        assert_eq!(r.largest(10)[0].path, PathBuf::from("first"));
    }

    #[test]
    fn totals() {
        let r = report(&[("a", 1024), ("b", 2048)]);
        assert_eq!(r.total_bytes(), 3072);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn rename_updates_path() {
        let mut r = report(&[("main.tex", 1)]);
        r.rename(std::path::Path::new("main.tex"), PathBuf::from("ms.tex"));
        assert_eq!(r.files()[0].path, PathBuf::from("ms.tex"));
    }

    #[test]
    fn resize_updates_size_and_total() {
        let mut r = report(&[("main.tex", 10), ("fig.png", 30)]);
        r.resize(std::path::Path::new("main.tex"), 53);
        assert_eq!(r.files()[0].bytes, 53);
        assert_eq!(r.total_bytes(), 83);
    }

    #[test]
    fn summary_serializes() {
        let r = report(&[("main.tex", 10), ("fig.png", 30)]);
        let json = serde_json::to_value(r.summary(LARGEST_SHOWN)).unwrap();
        assert_eq!(json["file_count"], 2);
        assert_eq!(json["total_bytes"], 40);
        assert_eq!(json["largest"][0]["path"], "fig.png");
    }
}
