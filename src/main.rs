//! texbundle binary entry point.

use std::process::ExitCode;

use texbundle::ui::output;

fn main() -> ExitCode {
    match texbundle::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&err);
            let mut shown = err.to_string();
            for cause in err.chain().skip(1) {
                let text = cause.to_string();
                // wrappers that embed their source already printed it
                if !shown.contains(&text) {
                    eprintln!("  caused by: {}", text);
                }
                shown = text;
            }
            ExitCode::FAILURE
        }
    }
}
