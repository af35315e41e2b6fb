//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// texbundle - Bundle a LaTeX document with exactly the files it uses
#[derive(Parser, Debug)]
#[command(name = "texbundle")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if texbundle was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(long = "interactive", global = true, conflicts_with = "no_interactive")]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Returns true if:
    /// - `--interactive` was explicitly set, OR
    /// - Neither `--no-interactive` nor `--quiet` was set AND stdin is a TTY
    pub fn interactive(&self) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            std::io::stdin().is_terminal()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy a document and every file it includes into a clean tree
    #[command(
        name = "pack",
        long_about = "Copy a document and every file it includes into a clean tree.\n\n\
            Starting from MAIN, every \\input, \\include, \\subfile, local \\usepackage, \
            bibliography and graphics include is followed, including those hidden \
            behind \\newcommand definitions. Only the reachable files are copied, \
            mirroring their place below MAIN's directory. Copied .tex files have their \
            comments removed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bundle into paper_arXiv/ next to paper/
    texbundle pack paper/main.tex

    # Replace a previous bundle, stamp the commit and zip it
    texbundle pack paper/main.tex --force --git-hash --archive

    # Sources in a legacy encoding
    texbundle pack main.tex --encodings utf-8,latin1

    # Submission systems that want the .bbl but not the .bib
    texbundle pack main.tex --rename ms --compile"
    )]
    Pack {
        /// The root document
        main: PathBuf,

        /// Output directory (default: <main's dir>_arXiv beside it)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Candidate encodings, tried in order
        #[arg(long, value_name = "ENCODING", num_args = 1.., value_delimiter = ',')]
        encodings: Vec<String>,

        /// Replace an existing output directory
        #[arg(short, long)]
        force: bool,

        /// Insert the current commit id as the first line of the copied root
        #[arg(long)]
        git_hash: bool,

        /// New file name for the copied root (.tex is added if missing)
        #[arg(long, value_name = "NAME")]
        rename: Option<String>,

        /// Compile once and keep only the generated .bbl
        #[arg(long)]
        compile: bool,

        /// Write <name>.zip of the output tree beside it
        #[arg(long)]
        archive: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove comments from a single file
    #[command(
        name = "strip",
        long_about = "Remove comments from a single LaTeX file.\n\n\
            Pure comment lines collapse into a single '%' line, inline comments are \
            cut, lines ending in '%' are kept as they are. Everything after \
            \\end{document} is dropped. By default the file is rewritten in place.",
        after_help = "\
WORKFLOW EXAMPLES:
    # In place
    texbundle strip chapter.tex

    # To another file
    texbundle strip chapter.tex -o chapter.clean.tex"
    )]
    Strip {
        /// The file to strip
        file: PathBuf,

        /// Write the result here instead of in place
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Candidate encodings, tried in order
        #[arg(long, value_name = "ENCODING", num_args = 1.., value_delimiter = ',')]
        encodings: Vec<String>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for texbundle.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    texbundle completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    texbundle completion zsh >> ~/.zshrc

    # Fish
    texbundle completion fish > ~/.config/fish/completions/texbundle.fish

    # PowerShell
    texbundle completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pack_flags() {
        let cli = Cli::try_parse_from([
            "texbundle",
            "pack",
            "paper/main.tex",
            "-o",
            "out",
            "--encodings",
            "utf-8,latin1",
            "-f",
            "--git-hash",
            "--rename",
            "ms",
            "--archive",
        ])
        .unwrap();

        match cli.command {
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
            } => {
                assert_eq!(main, PathBuf::from("paper/main.tex"));
                assert_eq!(out, Some(PathBuf::from("out")));
                assert_eq!(encodings, vec!["utf-8", "latin1"]);
                assert!(force && git_hash && archive);
                assert!(!compile && !json);
                assert_eq!(rename.as_deref(), Some("ms"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn quiet_disables_prompts() {
        let cli = Cli::try_parse_from(["texbundle", "-q", "strip", "a.tex"]).unwrap();
        assert!(!cli.interactive());
    }

    #[test]
    fn interactive_flag_wins() {
        let cli = Cli::try_parse_from(["texbundle", "--interactive", "strip", "a.tex"]).unwrap();
        assert!(cli.interactive());
    }

    #[test]
    fn interactive_conflicts() {
        assert!(Cli::try_parse_from([
            "texbundle",
            "--interactive",
            "--no-interactive",
            "strip",
            "a.tex"
        ])
        .is_err());
    }
}
