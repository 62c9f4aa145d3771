use std::io::{self, BufRead, Write};

use bitfile_loader::{api, slot::Slot};

use crate::cli;
use crate::context;
use crate::exit_codes;
use crate::output::{Event, OperationRecorder, Reporter};

pub fn run(args: cli::DeleteArgs, out: &mut dyn Reporter) -> i32 {
    // Reject a bad slot before asking anything.
    if let Err(e) = Slot::new(args.slot) {
        out.emit(Event::Error {
            code: exit_codes::EXIT_INVALID_INPUT,
            message: e.to_string(),
        });
        return exit_codes::EXIT_INVALID_INPUT;
    }

    let port = match context::require_port(&args.link) {
        Ok(p) => p,
        Err(message) => {
            out.emit(Event::Error {
                code: exit_codes::EXIT_NO_PORT,
                message,
            });
            return exit_codes::EXIT_NO_PORT;
        }
    };

    if !args.yes && !confirm(args.slot) {
        out.emit(Event::Error {
            code: exit_codes::EXIT_ABORTED,
            message: format!("slot {} left untouched", args.slot),
        });
        return exit_codes::EXIT_ABORTED;
    }

    let link = context::link_opts(&args.link);
    let mut recorder = OperationRecorder::new("delete", Some(args.slot));
    let r = api::delete(port, args.slot, &link, |ev| {
        recorder.observe(&ev);
        out.emit(Event::Operation(ev));
    });

    let (code, message) = match r {
        Ok(()) => (exit_codes::EXIT_OK, None),
        Err(e) => {
            let code = context::exit_code_for(&e);
            out.emit(Event::Error {
                code,
                message: e.to_string(),
            });
            (code, Some(e.to_string()))
        }
    };
    out.emit(Event::OperationSummary(recorder.finish(code, message)));
    code
}

fn confirm(slot: u8) -> bool {
    eprint!("erase slot {slot}? [y/N] ");
    let _ = io::stderr().flush();

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    is_yes(&line)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::is_yes;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yeah"));
    }
}
