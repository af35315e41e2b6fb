//! engine::post
//!
//! Steps run on the output tree after the walk.
//!
//! # Steps
//!
//! In the order the pack command applies them:
//!
//! 1. [`stamp_revision`] - `% <commit id>` as the first line of the root
//! 2. [`rename_root`] - give the copied root a new name
//! 3. [`keep_bibliography`] - compile once, keep only the `.bbl`
//! 4. [`archive`] - zip the output tree next to it
//!
//! Typesetting goes through the [`Compiler`] trait so it can be replaced in
//! tests.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::types::Oid;
use crate::ui::output::{self, Verbosity};
use crate::ui::prompts::{self, PromptError};

/// Errors from post-processing.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("failed to {action} '{}': {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot rename root to '{}': file exists", .path.display())]
    RenameConflict { path: PathBuf },

    #[error("'{}' already holds a bibliography file before compiling", .path.display())]
    BibliographyPresent { path: PathBuf },

    #[error("no .bbl file in '{}' after compiling", .dir.display())]
    BibliographyMissing { dir: PathBuf },

    #[error("'{program}' not found: {source}")]
    CompilerNotFound {
        program: String,
        source: which::Error,
    },

    #[error("manual compile was not confirmed")]
    CompileCancelled,

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("failed to write archive '{}': {source}", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> PostError + 'a {
    move |source| PostError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Something that typesets a document in place.
pub trait Compiler {
    /// Compile `document` (relative to `dir`) with `dir` as working directory.
    fn compile(&self, dir: &Path, document: &Path) -> Result<(), PostError>;
}

/// Runs latexmk (or a configured replacement) as a child process.
#[derive(Debug, Clone)]
pub struct LatexmkCompiler {
    program: String,
    args: Vec<String>,
    interactive: bool,
}

impl LatexmkCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>, interactive: bool) -> Self {
        Self {
            program: program.into(),
            args,
            interactive,
        }
    }

    /// Ask the user to do the compile when the program is not installed.
    fn compile_manually(&self, dir: &Path, document: &Path, err: which::Error) -> Result<(), PostError> {
        if !self.interactive {
            return Err(PostError::CompilerNotFound {
                program: self.program.clone(),
                source: err,
            });
        }
        output::warn(
            format!(
                "'{}' not found; compile '{}' in '{}' yourself so that a .bbl file exists",
                self.program,
                document.display(),
                dir.display()
            ),
            Verbosity::Normal,
        );
        if prompts::confirm("Done compiling?", false, true)? {
            Ok(())
        } else {
            Err(PostError::CompileCancelled)
        }
    }
}

impl Compiler for LatexmkCompiler {
    fn compile(&self, dir: &Path, document: &Path) -> Result<(), PostError> {
        let program = match which::which(&self.program) {
            Ok(path) => path,
            Err(err) => return self.compile_manually(dir, document, err),
        };

        debug!(program = %program.display(), args = ?self.args, document = %document.display(), "compiling");
        let status = Command::new(&program)
            .args(&self.args)
            .arg(document)
            .current_dir(dir)
            .stdout(Stdio::null())
            .status()
            .map_err(io_err("run", &program))?;

        // a failed run may still have produced the bibliography
        if !status.success() {
            warn!(program = %program.display(), %status, "compiler exited unsuccessfully");
        }
        Ok(())
    }
}

/// What [`keep_bibliography`] left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographyOutcome {
    /// The kept `.bbl` file
    pub bbl: PathBuf,
    /// The rendered document, moved next to the output directory
    pub pdf: Option<PathBuf>,
    /// Newly created entries that were deleted
    pub removed: Vec<PathBuf>,
}

/// Compile once and keep only the generated bibliography.
///
/// # Errors
///
/// - [`PostError::BibliographyPresent`] if a `.bbl` exists beforehand
/// - [`PostError::BibliographyMissing`] if compiling produced none
pub fn keep_bibliography(
    out_dir: &Path,
    root: &Path,
    compiler: &dyn Compiler,
) -> Result<BibliographyOutcome, PostError> {
    let before = top_level_entries(out_dir)?;
    if let Some(existing) = before.iter().find(|p| has_extension(p, "bbl")) {
        return Err(PostError::BibliographyPresent {
            path: existing.clone(),
        });
    }

    compiler.compile(out_dir, root)?;

    let after = top_level_entries(out_dir)?;
    let created: Vec<&PathBuf> = after.difference(&before).collect();

    let bbl = created
        .iter()
        .find(|p| has_extension(p, "bbl"))
        .map(|p| (*p).clone())
        .ok_or_else(|| PostError::BibliographyMissing {
            dir: out_dir.to_path_buf(),
        })?;

    let pdf_name = root.with_extension("pdf");
    let pdf_src = out_dir.join(&pdf_name);
    let pdf = if created.contains(&&pdf_src) {
        let target = out_dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(pdf_name.file_name().unwrap_or(pdf_name.as_os_str()));
        fs::rename(&pdf_src, &target).map_err(io_err("move", &pdf_src))?;
        debug!(pdf = %target.display(), "moved rendered document");
        Some(target)
    } else {
        None
    };

    let mut removed = Vec::new();
    for path in created {
        if *path == bbl || *path == pdf_src {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(io_err("remove", path))?;
        } else {
            fs::remove_file(path).map_err(io_err("remove", path))?;
        }
        removed.push(path.clone());
    }
    debug!(bbl = %bbl.display(), removed = removed.len(), "kept bibliography");

    Ok(BibliographyOutcome { bbl, pdf, removed })
}

fn top_level_entries(dir: &Path) -> Result<BTreeSet<PathBuf>, PostError> {
    let mut entries = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(io_err("list", dir))? {
        entries.insert(entry.map_err(io_err("list", dir))?.path());
    }
    Ok(entries)
}

/// Insert `% <commit id>` as the first line of `document`.
///
/// The stamp is ASCII, so it is prepended as raw bytes whatever the
/// document's encoding. Returns the size of the stamped file.
pub fn stamp_revision(document: &Path, oid: &Oid) -> Result<u64, PostError> {
    let body = fs::read(document).map_err(io_err("read", document))?;
    let mut stamped = format!("% {}\n", oid).into_bytes();
    stamped.extend_from_slice(&body);

    let mut tmp_name = document.as_os_str().to_owned();
    tmp_name.push("_tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, &stamped).map_err(io_err("write", &tmp))?;
    fs::rename(&tmp, document).map_err(io_err("replace", document))?;
    debug!(document = %document.display(), %oid, "stamped revision");
    Ok(stamped.len() as u64)
}

/// The file name a rename request results in; `.tex` is added when the
/// name has no extension.
pub fn renamed_file_name(new_name: &str) -> String {
    if Path::new(new_name).extension().is_some() {
        new_name.to_string()
    } else {
        format!("{}.tex", new_name)
    }
}

/// Rename the copied root inside `out_dir`; returns its new relative path.
///
/// # Errors
///
/// - [`PostError::RenameConflict`] if another copied file has that name
pub fn rename_root(out_dir: &Path, root: &Path, new_name: &str) -> Result<PathBuf, PostError> {
    let new_rel = root.with_file_name(renamed_file_name(new_name));
    if new_rel == root {
        return Ok(new_rel);
    }
    let from = out_dir.join(root);
    let to = out_dir.join(&new_rel);
    if to.exists() {
        return Err(PostError::RenameConflict { path: to });
    }
    fs::rename(&from, &to).map_err(io_err("rename", &from))?;
    debug!(from = %root.display(), to = %new_rel.display(), "renamed root");
    Ok(new_rel)
}

/// Zip the output tree into `<output parent>/<name>.zip`.
pub fn archive(out_dir: &Path, name: &str) -> Result<PathBuf, PostError> {
    let zip_path = out_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{}.zip", name));

    let mut files = Vec::new();
    collect_files(out_dir, out_dir, &mut files)?;
    files.sort();

    let zip_err = |source| PostError::Archive {
        path: zip_path.clone(),
        source,
    };

    let file = fs::File::create(&zip_path).map_err(io_err("create", &zip_path))?;
    let mut zip = ZipWriter::new(file);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for rel in &files {
        let entry = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let full = out_dir.join(rel);
        let contents = fs::read(&full).map_err(io_err("read", &full))?;
        zip.start_file(entry, deflated).map_err(zip_err)?;
        zip.write_all(&contents).map_err(io_err("write", &zip_path))?;
    }
    zip.finish().map_err(zip_err)?;

    debug!(archive = %zip_path.display(), files = files.len(), "wrote archive");
    Ok(zip_path)
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), PostError> {
    for entry in fs::read_dir(dir).map_err(io_err("list", dir))? {
        let path = entry.map_err(io_err("list", dir))?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Writes the files a real typesetting run would leave behind.
    struct FakeCompiler {
        outputs: Vec<&'static str>,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl FakeCompiler {
        fn new(outputs: Vec<&'static str>) -> Self {
            Self {
                outputs,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Compiler for FakeCompiler {
        fn compile(&self, dir: &Path, document: &Path) -> Result<(), PostError> {
            self.calls.borrow_mut().push(document.to_path_buf());
            for name in &self.outputs {
                fs::write(dir.join(name), "generated").unwrap();
            }
            Ok(())
        }
    }

    fn out_tree() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("paper_arXiv");
        fs::create_dir_all(out.join("imgs")).unwrap();
        fs::write(out.join("main.tex"), "\\documentclass{article}\n").unwrap();
        fs::write(out.join("imgs/cat.png"), "PNG").unwrap();
        (temp, out)
    }

    mod bibliography {
        use super::*;

        #[test]
        fn keeps_bbl_moves_pdf_removes_rest() {
            let (temp, out) = out_tree();
            let compiler = FakeCompiler::new(vec!["main.bbl", "main.pdf", "main.aux", "main.log"]);

            let outcome = keep_bibliography(&out, Path::new("main.tex"), &compiler).unwrap();

            assert_eq!(outcome.bbl, out.join("main.bbl"));
            assert_eq!(outcome.pdf, Some(temp.path().join("main.pdf")));
            assert_eq!(outcome.removed.len(), 2);
            assert!(out.join("main.bbl").exists());
            assert!(!out.join("main.aux").exists());
            assert!(!out.join("main.pdf").exists());
            assert!(out.join("main.tex").exists());
            assert!(out.join("imgs/cat.png").exists());
            assert_eq!(*compiler.calls.borrow(), vec![PathBuf::from("main.tex")]);
        }

        #[test]
        fn missing_bbl() {
            let (_temp, out) = out_tree();
            let compiler = FakeCompiler::new(vec!["main.log"]);

            let err = keep_bibliography(&out, Path::new("main.tex"), &compiler).unwrap_err();
            assert!(matches!(err, PostError::BibliographyMissing { .. }));
        }

        #[test]
        fn existing_bbl_refused() {
            let (_temp, out) = out_tree();
            fs::write(out.join("old.bbl"), "stale").unwrap();
            let compiler = FakeCompiler::new(vec!["main.bbl"]);

            let err = keep_bibliography(&out, Path::new("main.tex"), &compiler).unwrap_err();
            assert!(matches!(err, PostError::BibliographyPresent { .. }));
            assert!(compiler.calls.borrow().is_empty());
        }

        #[test]
        fn missing_program_non_interactive() {
            let (_temp, out) = out_tree();
            let compiler = LatexmkCompiler::new("texbundle-no-such-compiler", vec![], false);

            let err = compiler.compile(&out, Path::new("main.tex")).unwrap_err();
            assert!(matches!(err, PostError::CompilerNotFound { .. }));
        }
    }

    mod stamp_and_rename {
        use super::*;

        #[test]
        fn stamp_prepends_line() {
            let (_temp, out) = out_tree();
            let oid = Oid::new("a".repeat(40)).unwrap();

            let bytes = stamp_revision(&out.join("main.tex"), &oid).unwrap();

            let text = fs::read_to_string(out.join("main.tex")).unwrap();
            assert_eq!(text, format!("% {}\n\\documentclass{{article}}\n", "a".repeat(40)));
            assert_eq!(bytes, text.len() as u64);
        }

        #[test]
        fn stamp_missing_document() {
            let (_temp, out) = out_tree();
            let oid = Oid::new("a".repeat(40)).unwrap();

            let err = stamp_revision(&out.join("gone.tex"), &oid).unwrap_err();
            assert!(matches!(err, PostError::Io { action: "read", .. }));
        }

        #[test]
        fn rename_adds_extension() {
            let (_temp, out) = out_tree();
            let new_rel = rename_root(&out, Path::new("main.tex"), "ms").unwrap();

            assert_eq!(new_rel, PathBuf::from("ms.tex"));
            assert!(out.join("ms.tex").exists());
            assert!(!out.join("main.tex").exists());
        }

        #[test]
        fn rename_keeps_given_extension() {
            assert_eq!(renamed_file_name("paper.ltx"), "paper.ltx");
            assert_eq!(renamed_file_name("paper"), "paper.tex");
        }

        #[test]
        fn rename_conflict() {
            let (_temp, out) = out_tree();
            fs::write(out.join("other.tex"), "x").unwrap();

            let err = rename_root(&out, Path::new("main.tex"), "other.tex").unwrap_err();
            assert!(matches!(err, PostError::RenameConflict { .. }));
        }
    }

    mod archiving {
        use super::*;

        #[test]
        fn zips_every_file() {
            let (temp, out) = out_tree();

            let path = archive(&out, "main").unwrap();

            assert_eq!(path, temp.path().join("main.zip"));
            let mut zip = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
            let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
            names.sort();
            assert_eq!(names, vec!["imgs/cat.png", "main.tex"]);

            let mut contents = String::new();
            std::io::Read::read_to_string(&mut zip.by_name("imgs/cat.png").unwrap(), &mut contents)
                .unwrap();
            assert_eq!(contents, "PNG");
        }
    }
}
