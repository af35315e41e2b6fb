//! strip command - Remove comments from one file

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::core::strip::strip_file_to;
use crate::core::types::EncodingList;
use crate::engine::Context;
use crate::ui::output::{self, format_kib, Verbosity};

/// Strip `file` in place, or into `output` when given.
pub fn strip(
    ctx: &Context,
    file: &Path,
    output: Option<&Path>,
    encodings: Vec<String>,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let source = ctx.resolve(file);
    let dest = output.map(|o| ctx.resolve(o)).unwrap_or_else(|| source.clone());

    let labels = if encodings.is_empty() {
        let loaded = Config::load(source.parent()).context("failed to load configuration")?;
        loaded.config.encodings()
    } else {
        encodings
    };
    let encodings = EncodingList::new(labels).context("invalid encoding list")?;

    let outcome = strip_file_to(&source, &dest, &encodings)
        .with_context(|| format!("failed to strip '{}'", source.display()))?;

    output::success(
        format!(
            "Stripped {}: {} -> {}",
            dest.display(),
            format_kib(outcome.bytes_before),
            format_kib(outcome.bytes_after)
        ),
        verbosity,
    );
    Ok(())
}
