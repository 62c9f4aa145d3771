use bitfile_loader::{api, operation::OperationEvent};

use crate::cli;
use crate::context;
use crate::exit_codes;
use crate::output::{DryRunSummary, Event, OperationRecorder, Reporter};

pub fn run(args: cli::StoreArgs, out: &mut dyn Reporter) -> i32 {
    if args.dry_run {
        return dry_run(&args, out);
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

    let opts = api::StoreOptions {
        link: context::link_opts(&args.link),
        verify: args.verify,
    };

    let mut recorder = OperationRecorder::new("store", Some(args.slot));
    let r = api::store(port, args.slot, &args.bitfile, &opts, |ev| {
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

fn dry_run(args: &cli::StoreArgs, out: &mut dyn Reporter) -> i32 {
    // Only the file-level events; the frame plan is reported in one piece.
    let r = api::plan_store(args.slot, &args.bitfile, |ev| {
        if matches!(ev, OperationEvent::BitfileLoaded { .. }) {
            out.emit(Event::Operation(ev));
        }
    });

    match r {
        Ok(plan) => {
            out.emit(Event::DryRun(DryRunSummary {
                slot: args.slot,
                pages: plan.bitfile.page_count(),
                bytes: plan.bitfile.len(),
                name: plan.bitfile.name,
                frames: plan.frames,
            }));
            exit_codes::EXIT_OK
        }
        Err(e) => {
            let code = context::exit_code_for(&e);
            out.emit(Event::Error {
                code,
                message: e.to_string(),
            });
            code
        }
    }
}
