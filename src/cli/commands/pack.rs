//! pack command - Bundle a document with the files it includes

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;

use crate::core::config::Config;
use crate::core::types::EncodingList;
use crate::engine::output::default_out_dir;
use crate::engine::post::LatexmkCompiler;
use crate::engine::report::{ReportSummary, LARGEST_SHOWN};
use crate::engine::{self, Context, PackOptions, PackOutcome};
use crate::ui::output::{self, format_kib, format_list, Verbosity};

/// Arguments of `texbundle pack`, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct PackArgs {
    pub main: PathBuf,
    pub out: Option<PathBuf>,
    pub encodings: Vec<String>,
    pub force: bool,
    pub git_hash: bool,
    pub rename: Option<String>,
    pub compile: bool,
    pub archive: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    out_dir: &'a PathBuf,
    root: &'a PathBuf,
    revision: Option<String>,
    archive: Option<&'a PathBuf>,
    #[serde(flatten)]
    report: ReportSummary<'a>,
}

/// Bundle the document named in `args`.
pub fn pack(ctx: &Context, args: PackArgs) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);

    let main = ctx.resolve(&args.main);
    if !main.is_file() {
        bail!("'{}' is not a file", main.display());
    }
    let mut options = PackOptions::new(&main, PathBuf::new(), EncodingList::default());
    let root_dir = options.root_dir();

    let loaded = Config::load(Some(&root_dir)).context("failed to load configuration")?;
    for warning in &loaded.warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            verbosity,
        );
    }
    let config = loaded.config;
    if let Some(path) = config.global_config_loaded_from() {
        output::debug(format!("global config: {}", path.display()), verbosity);
    }
    if let Some(path) = config.project_config_loaded_from() {
        output::debug(format!("project config: {}", path.display()), verbosity);
    }

    let labels = if args.encodings.is_empty() {
        config.encodings()
    } else {
        args.encodings
    };
    options.encodings = EncodingList::new(labels).context("invalid encoding list")?;
    options.out_dir = args
        .out
        .map(|out| ctx.resolve(&out))
        .or_else(|| config.out_dir())
        .unwrap_or_else(|| default_out_dir(&root_dir));
    options.force = args.force;
    options.max_clean_bytes = config.max_clean_bytes();
    options.store_revision = args.git_hash || config.store_revision();
    options.rename = args.rename.or_else(|| config.rename().map(str::to_string));
    options.compile = args.compile || config.compile();
    options.archive = args.archive || config.archive();

    let compiler = LatexmkCompiler::new(
        config.compile_program(),
        config.compile_args(),
        ctx.interactive,
    );

    let outcome = engine::pack(&options, &compiler)
        .with_context(|| format!("failed to pack '{}'", main.display()))?;

    for warning in &outcome.warnings {
        output::warn(warning, verbosity);
    }

    if args.json {
        let json = JsonOutput {
            out_dir: &options.out_dir,
            root: &outcome.root,
            revision: outcome.revision.as_ref().map(|oid| oid.to_string()),
            archive: outcome.archive.as_ref(),
            report: outcome.report.summary(LARGEST_SHOWN),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    print_outcome(&options, &outcome, verbosity);
    Ok(())
}

fn print_outcome(options: &PackOptions, outcome: &PackOutcome, verbosity: Verbosity) {
    let report = &outcome.report;
    let largest: Vec<String> = report
        .largest(LARGEST_SHOWN)
        .iter()
        .map(|file| format!("{:>12}  {}", format_kib(file.bytes), file.path.display()))
        .collect();

    output::print(
        format!("Largest of {} copied files:", report.len()),
        verbosity,
    );
    output::print(format_list(&largest, "  "), verbosity);
    output::print(
        format!("Total: {}", format_kib(report.total_bytes())),
        verbosity,
    );

    if let Some(oid) = &outcome.revision {
        output::print(format!("Stamped revision {}", oid.short(12)), verbosity);
    }
    if let Some(bib) = &outcome.bibliography {
        output::print(format!("Kept bibliography {}", bib.bbl.display()), verbosity);
        if let Some(pdf) = &bib.pdf {
            output::print(format!("Rendered document at {}", pdf.display()), verbosity);
        }
    }
    if let Some(archive) = &outcome.archive {
        output::print(format!("Wrote archive {}", archive.display()), verbosity);
    }

    output::success(
        format!(
            "Bundled {} into {}",
            outcome.root.display(),
            options.out_dir.display()
        ),
        verbosity,
    );
}
