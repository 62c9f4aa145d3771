use bitfile_loader::api;

use crate::cli;
use crate::context;
use crate::exit_codes;
use crate::output::{Event, OperationRecorder, Reporter};

pub fn run(args: cli::ConfigureArgs, out: &mut dyn Reporter) -> i32 {
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

    let link = context::link_opts(&args.link);
    let mut recorder = OperationRecorder::new("configure", Some(args.slot));
    let r = api::configure(port, args.slot, &link, |ev| {
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
