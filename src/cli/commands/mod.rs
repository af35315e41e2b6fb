//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves paths and merges flags with configuration
//! 2. Calls the engine to do the work
//! 3. Formats and displays output
//!
//! Handlers return `anyhow::Result` and attach context to engine errors.

mod completion;
mod pack;
mod strip;

pub use completion::completion;
pub use pack::{pack, PackArgs};
pub use strip::strip;

use anyhow::Result;

use super::args::Command;
use crate::engine::Context;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Pack {
            main,
            out,
            encodings,
            force,
            git_hash,
            rename,
            compile,
            archive,
            json,
        } => pack::pack(
            ctx,
            PackArgs {
                main,
                out,
                encodings,
                force,
                git_hash,
                rename,
                compile,
                archive,
                json,
            },
        ),
        Command::Strip {
            file,
            output,
            encodings,
        } => strip::strip(ctx, &file, output.as_deref(), encodings),
        Command::Completion { shell } => completion::completion(shell),
    }
}
