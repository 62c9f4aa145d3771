use std::process;

use clap::Parser;

mod cli;
mod commands;
mod context;
mod exit_codes;
mod logging;
mod output;

fn main() {
    logging::init_tracing();

    let cli = cli::Cli::parse();

    let exit_code = match cli.command {
        cli::Command::List(args) => {
            let mut out = output::make_for_list(&args);
            let code = commands::list::run(args, &mut *out);
            out.finish();
            code
        }
        cli::Command::Read(args) => {
            let mut out = output::make_for_read(&args);
            let code = commands::read::run(args, &mut *out);
            out.finish();
            code
        }
        cli::Command::Store(args) => {
            let mut out = output::make_for_store(&args);
            let code = commands::store::run(args, &mut *out);
            out.finish();
            code
        }
        cli::Command::Delete(args) => {
            let mut out = output::make_for_delete(&args);
            let code = commands::delete::run(args, &mut *out);
            out.finish();
            code
        }
        cli::Command::Configure(args) => {
            let mut out = output::make_for_configure(&args);
            let code = commands::configure::run(args, &mut *out);
            out.finish();
            code
        }
    };

    process::exit(exit_code);
}
