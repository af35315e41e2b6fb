//! core::include
//!
//! Include directive detection and target resolution.
//!
//! # Overview
//!
//! Every directive kind is described by an immutable [`IncludeSpec`]. Two
//! fixed tables exist:
//!
//! - [`DOCUMENT_SPECS`] - sub-documents, style packages and bibliography
//!   files, copied and (for some) walked recursively
//! - [`STATIC_SPECS`] - graphics, copied as leaves
//!
//! The [`IncludeResolver`] matches an expanded line against these tables and
//! maps each written path to a file relative to the root directory.
//!
//! # Resolution
//!
//! - With a written extension, the extension must fit the directive and the
//!   file must exist when the directive requires it.
//! - Without one, the directory is scanned for `<base>.<anything>` files with
//!   a fitting final extension. Exactly one match is accepted.
//!
//! # Example
//!
//! ```no_run
//! use texbundle::core::include::IncludeResolver;
//!
//! let resolver = IncludeResolver::new("paper");
//! let docs = resolver.find_document_includes("\\input{sections/intro}\n").unwrap();
//! for doc in docs {
//!     println!("{} (walk: {})", doc.rel_path.display(), doc.recurse);
//! }
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::error::ParseError;
use super::types::{StaticFile, TextFile};

/// Extensions accepted for graphics.
pub const ASSET_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "eps", "ps", "svg", "tif", "tiff", "gif", "bmp",
];

/// Descriptor of one include directive kind.
#[derive(Debug)]
pub struct IncludeSpec {
    /// Directive name, for diagnostics
    pub directive: &'static str,
    /// Pattern matching the directive
    pub pattern: Regex,
    /// Capture group holding the written path
    pub capture: usize,
    /// Allowed extensions without the dot; empty means any graphics format
    pub extensions: &'static [&'static str],
    /// Whether the target is walked for further includes
    pub recurse: bool,
    /// Whether a missing target is an error
    pub required: bool,
    /// Whether the capture is a comma-separated list of names
    pub list: bool,
}

impl IncludeSpec {
    fn new(
        directive: &'static str,
        pattern: &str,
        extensions: &'static [&'static str],
        recurse: bool,
        required: bool,
        list: bool,
    ) -> Self {
        Self {
            directive,
            pattern: Regex::new(pattern).expect("include pattern is valid"),
            capture: 1,
            extensions,
            recurse,
            required,
            list,
        }
    }

    /// Extensions a resolved file may carry.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        if self.extensions.is_empty() {
            ASSET_EXTENSIONS
        } else {
            self.extensions
        }
    }

    fn allows(&self, ext: &str) -> bool {
        self.allowed_extensions()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    fn describe_extensions(&self) -> String {
        self.allowed_extensions()
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Written paths of every occurrence on `line`, with their byte offset.
    fn written_paths<'l>(&self, line: &'l str) -> Vec<(usize, &'l str)> {
        let mut found = Vec::new();
        for caps in self.pattern.captures_iter(line) {
            let Some(m) = caps.get(self.capture) else {
                continue;
            };
            if self.list {
                found.extend(
                    m.as_str()
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(|name| (m.start(), name)),
                );
            } else {
                found.push((m.start(), m.as_str().trim()));
            }
        }
        found
    }
}

/// Directives that pull in text documents.
pub static DOCUMENT_SPECS: Lazy<Vec<IncludeSpec>> = Lazy::new(|| {
    vec![
        IncludeSpec::new("input", r"\\input\s*\{([^}]*)\}", &["tex"], true, true, false),
        IncludeSpec::new("include", r"\\include\s*\{([^}]*)\}", &["tex"], true, true, false),
        IncludeSpec::new("subfile", r"\\subfile\s*\{([^}]*)\}", &["tex"], true, true, false),
        IncludeSpec::new(
            "usepackage",
            r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}",
            &["sty"],
            true,
            false,
            true,
        ),
        IncludeSpec::new(
            "bibliographystyle",
            r"\\bibliographystyle\s*\{([^}]*)\}",
            &["bst"],
            false,
            false,
            false,
        ),
        IncludeSpec::new(
            "bibliography",
            r"\\bibliography\s*\{([^}]*)\}",
            &["bib"],
            false,
            true,
            true,
        ),
        IncludeSpec::new(
            "addbibresource",
            r"\\addbibresource\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}",
            &["bib"],
            false,
            true,
            false,
        ),
    ]
});

/// Directives that pull in graphics.
pub static STATIC_SPECS: Lazy<Vec<IncludeSpec>> = Lazy::new(|| {
    vec![
        IncludeSpec::new(
            "includegraphics",
            r"\\includegraphics\*?\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}",
            &[],
            false,
            true,
            false,
        ),
        IncludeSpec::new(
            "overpic",
            r"\\begin\s*\{overpic\}\s*(?:\[[^\]]*\])?\s*\{([^}]*)\}",
            &[],
            false,
            true,
            false,
        ),
    ]
});

/// Resolves include directives against a root directory.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    root_dir: PathBuf,
}

impl IncludeResolver {
    /// Create a resolver for documents rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Text documents included by `line`, in order of appearance.
    ///
    /// # Errors
    ///
    /// Any resolution failure of a required include.
    pub fn find_document_includes(&self, line: &str) -> Result<Vec<TextFile>, ParseError> {
        let mut found = Vec::new();
        for spec in DOCUMENT_SPECS.iter() {
            for (at, written) in spec.written_paths(line) {
                if let Some(rel_path) = self.resolve(spec, written)? {
                    found.push((
                        at,
                        TextFile {
                            rel_path,
                            recurse: spec.recurse,
                        },
                    ));
                }
            }
        }
        found.sort_by_key(|(at, _)| *at);
        Ok(found.into_iter().map(|(_, file)| file).collect())
    }

    /// Graphics included by `line`, in order of appearance.
    ///
    /// # Errors
    ///
    /// Any resolution failure; graphics are always required.
    pub fn find_static_includes(&self, line: &str) -> Result<Vec<StaticFile>, ParseError> {
        let mut found = Vec::new();
        for spec in STATIC_SPECS.iter() {
            for (at, written) in spec.written_paths(line) {
                if let Some(rel_path) = self.resolve(spec, written)? {
                    found.push((
                        at,
                        StaticFile {
                            written: written.to_string(),
                            rel_path,
                        },
                    ));
                }
            }
        }
        found.sort_by_key(|(at, _)| *at);
        Ok(found.into_iter().map(|(_, file)| file).collect())
    }

    /// Map a written path to an existing file relative to the root.
    ///
    /// `Ok(None)` means the include is skipped.
    fn resolve(&self, spec: &IncludeSpec, written: &str) -> Result<Option<PathBuf>, ParseError> {
        if written.contains('#') {
            warn!(
                directive = spec.directive,
                path = written,
                "skipping include with unexpanded parameter"
            );
            return Ok(None);
        }
        if written.is_empty() {
            return self.missing(spec, written, "empty path");
        }

        let rel = normalize(written)?;
        let ext = rel.extension().and_then(|e| e.to_str());

        match ext {
            Some(ext) if spec.allows(ext) => {
                if self.root_dir.join(&rel).is_file() {
                    debug!(directive = spec.directive, path = %rel.display(), "resolved include");
                    Ok(Some(rel))
                } else {
                    self.missing(spec, written, "no such file")
                }
            }
            // a dotted document name is a wrong extension, not a base name
            Some(_) if !spec.extensions.is_empty() => Err(ParseError::ExtensionMismatch {
                written: written.to_string(),
                expected: spec.describe_extensions(),
            }),
            _ => self.resolve_by_scan(spec, written, &rel, ext.is_some()),
        }
    }

    /// Find `<base>.<anything>` with an allowed final extension.
    fn resolve_by_scan(
        &self,
        spec: &IncludeSpec,
        written: &str,
        rel: &Path,
        had_extension: bool,
    ) -> Result<Option<PathBuf>, ParseError> {
        let rel_dir = rel.parent().unwrap_or_else(|| Path::new(""));
        let Some(base) = rel.file_name().and_then(|n| n.to_str()) else {
            return self.missing(spec, written, "not a file name");
        };
        let prefix = format!("{}.", base);

        let mut candidates: Vec<String> = match fs::read_dir(self.root_dir.join(rel_dir)) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_file())
                .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                .filter(|name| name.starts_with(&prefix))
                .filter(|name| {
                    Path::new(name)
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| spec.allows(e))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        candidates.sort();

        match candidates.as_slice() {
            [] if had_extension => Err(ParseError::ExtensionMismatch {
                written: written.to_string(),
                expected: spec.describe_extensions(),
            }),
            [] => self.missing(
                spec,
                written,
                &format!("no file with extension {}", spec.describe_extensions()),
            ),
            [single] => {
                let resolved = rel_dir.join(single);
                debug!(directive = spec.directive, path = %resolved.display(), "resolved include by extension");
                Ok(Some(resolved))
            }
            many => Err(ParseError::UnresolvedInclude {
                written: written.to_string(),
                reason: format!("ambiguous, matches {}", many.join(", ")),
            }),
        }
    }

    fn missing(
        &self,
        spec: &IncludeSpec,
        written: &str,
        reason: &str,
    ) -> Result<Option<PathBuf>, ParseError> {
        if spec.required {
            Err(ParseError::UnresolvedInclude {
                written: written.to_string(),
                reason: reason.to_string(),
            })
        } else {
            debug!(directive = spec.directive, path = written, "optional include not found locally");
            Ok(None)
        }
    }
}

/// Lexically normalize a written path, refusing to leave the root.
fn normalize(written: &str) -> Result<PathBuf, ParseError> {
    let escapes = || ParseError::EscapesRoot {
        written: written.to_string(),
    };
    let mut out = PathBuf::new();
    for component in Path::new(written).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return Err(escapes());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(files: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for file in files {
            let path = temp.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        temp
    }

    mod documents {
        use super::*;

        #[test]
        fn infers_tex_extension() {
            let temp = tree(&["sections/intro.tex"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver.find_document_includes("\\input{sections/intro}\n").unwrap();
            assert_eq!(
                docs,
                vec![TextFile {
                    rel_path: PathBuf::from("sections/intro.tex"),
                    recurse: true,
                }]
            );
        }

        #[test]
        fn explicit_extension() {
            let temp = tree(&["a.tex"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver.find_document_includes("\\include{a.tex}").unwrap();
            assert_eq!(docs[0].rel_path, PathBuf::from("a.tex"));
        }

        #[test]
        fn wrong_extension() {
            let temp = tree(&["a.txt"]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_document_includes("\\input{a.txt}").unwrap_err();
            assert_eq!(
                err,
                ParseError::ExtensionMismatch {
                    written: "a.txt".into(),
                    expected: ".tex".into(),
                }
            );
        }

        #[test]
        fn missing_required() {
            let temp = tree(&[]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_document_includes("\\input{appendix}").unwrap_err();
            match err {
                ParseError::UnresolvedInclude { written, .. } => assert_eq!(written, "appendix"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn ambiguous_base_name() {
            let temp = tree(&["chapter.tex", "chapter.bak.tex"]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_document_includes("\\input{chapter}").unwrap_err();
            assert!(matches!(err, ParseError::UnresolvedInclude { .. }));
            assert!(err.to_string().contains("ambiguous"));
        }

        #[test]
        fn system_packages_are_skipped() {
            let temp = tree(&["local.sty"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver
                .find_document_includes("\\usepackage[utf8]{inputenc, local,amsmath}\n")
                .unwrap();
            assert_eq!(
                docs,
                vec![TextFile {
                    rel_path: PathBuf::from("local.sty"),
                    recurse: true,
                }]
            );
        }

        #[test]
        fn bibliography_list() {
            let temp = tree(&["refs.bib", "more.bib", "plainnat.bst"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver
                .find_document_includes("\\bibliographystyle{plainnat}\\bibliography{refs,more}")
                .unwrap();
            let paths: Vec<_> = docs.iter().map(|d| d.rel_path.clone()).collect();
            assert_eq!(
                paths,
                vec![
                    PathBuf::from("plainnat.bst"),
                    PathBuf::from("refs.bib"),
                    PathBuf::from("more.bib"),
                ]
            );
            assert!(docs.iter().all(|d| !d.recurse));
        }

        #[test]
        fn missing_bibliography_style_is_fine() {
            let temp = tree(&[]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver.find_document_includes("\\bibliographystyle{plain}").unwrap();
            assert!(docs.is_empty());
        }

        #[test]
        fn biblatex_resource() {
            let temp = tree(&["lib.bib"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver
                .find_document_includes("\\addbibresource[label=x]{lib.bib}")
                .unwrap();
            assert_eq!(docs[0].rel_path, PathBuf::from("lib.bib"));
        }

        #[test]
        fn order_of_appearance() {
            let temp = tree(&["b.tex", "a.tex"]);
            let resolver = IncludeResolver::new(temp.path());
            let docs = resolver.find_document_includes("\\include{b} \\input{a}").unwrap();
            assert_eq!(docs[0].rel_path, PathBuf::from("b.tex"));
            assert_eq!(docs[1].rel_path, PathBuf::from("a.tex"));
        }

        #[test]
        fn graphics_are_not_documents() {
            let temp = tree(&["fig.png"]);
            let resolver = IncludeResolver::new(temp.path());
            assert!(resolver
                .find_document_includes("\\includegraphics{fig}")
                .unwrap()
                .is_empty());
        }

        #[test]
        fn parameter_placeholder_skipped() {
            let temp = tree(&[]);
            let resolver = IncludeResolver::new(temp.path());
            assert!(resolver.find_document_includes("\\input{#1}").unwrap().is_empty());
        }
    }

    mod statics {
        use super::*;

        #[test]
        fn options_and_inferred_extension() {
            let temp = tree(&["imgs/cat.png"]);
            let resolver = IncludeResolver::new(temp.path());
            let files = resolver
                .find_static_includes("\\includegraphics[width=0.5\\linewidth]{imgs/cat}")
                .unwrap();
            assert_eq!(
                files,
                vec![StaticFile {
                    written: "imgs/cat".into(),
                    rel_path: PathBuf::from("imgs/cat.png"),
                }]
            );
        }

        #[test]
        fn overpic() {
            let temp = tree(&["plot.pdf"]);
            let resolver = IncludeResolver::new(temp.path());
            let files = resolver
                .find_static_includes("\\begin{overpic}[scale=.5]{plot.pdf}")
                .unwrap();
            assert_eq!(files[0].rel_path, PathBuf::from("plot.pdf"));
        }

        #[test]
        fn dotted_base_name() {
            let temp = tree(&["fig.v2.pdf"]);
            let resolver = IncludeResolver::new(temp.path());
            let files = resolver.find_static_includes("\\includegraphics{fig.v2}").unwrap();
            assert_eq!(files[0].rel_path, PathBuf::from("fig.v2.pdf"));
        }

        #[test]
        fn unknown_extension() {
            let temp = tree(&["fig.xcf"]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_static_includes("\\includegraphics{fig.xcf}").unwrap_err();
            assert!(matches!(err, ParseError::ExtensionMismatch { .. }));
        }

        #[test]
        fn always_required() {
            let temp = tree(&[]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_static_includes("\\includegraphics{gone.png}").unwrap_err();
            assert!(matches!(err, ParseError::UnresolvedInclude { .. }));
        }

        #[test]
        fn ambiguous_formats() {
            let temp = tree(&["fig.png", "fig.pdf"]);
            let resolver = IncludeResolver::new(temp.path());
            let err = resolver.find_static_includes("\\includegraphics{fig}").unwrap_err();
            assert!(err.to_string().contains("fig.pdf, fig.png"));
        }

        #[test]
        fn escaping_root_rejected() {
            let temp = tree(&[]);
            let resolver = IncludeResolver::new(temp.path().join("paper"));
            let err = resolver
                .find_static_includes("\\includegraphics{../shared/logo.png}")
                .unwrap_err();
            assert_eq!(
                err,
                ParseError::EscapesRoot {
                    written: "../shared/logo.png".into()
                }
            );
        }

        #[test]
        fn parent_inside_root_is_fine() {
            let temp = tree(&["imgs/a.png"]);
            let resolver = IncludeResolver::new(temp.path());
            let files = resolver
                .find_static_includes("\\includegraphics{other/../imgs/./a.png}")
                .unwrap();
            assert_eq!(files[0].rel_path, PathBuf::from("imgs/a.png"));
        }
    }
}
