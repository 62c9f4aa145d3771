use std::time::Duration;

use bitfile_loader::api;
use bitfile_loader::transport::LinkOptions;

use crate::cli;
use crate::exit_codes;

pub fn link_opts(args: &cli::LinkArgs) -> LinkOptions {
    LinkOptions {
        baud_rate: args.baud,
        timeout: Duration::from_millis(args.timeout_ms),
        validate_readback: args.strict_readback,
    }
}

/// The port is optional on the command line so `store --dry-run` works
/// without one; every command that talks to the board goes through here.
pub fn require_port(args: &cli::LinkArgs) -> Result<&str, String> {
    args.port
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| "no serial port given (use --port, see `bitfile-loader list`)".to_string())
}

pub fn exit_code_for(e: &api::LoaderError) -> i32 {
    match e.kind() {
        api::ErrorKind::InvalidSlot | api::ErrorKind::InvalidBitfile => {
            exit_codes::EXIT_INVALID_INPUT
        }
        api::ErrorKind::TransportUnavailable => exit_codes::EXIT_NO_PORT,
        api::ErrorKind::AckTimeout
        | api::ErrorKind::AckRejected
        | api::ErrorKind::FrameDecode
        | api::ErrorKind::SessionAborted
        | api::ErrorKind::Io => exit_codes::EXIT_PROTOCOL,
        api::ErrorKind::VerifyFailed => exit_codes::EXIT_VERIFY_FAILED,
    }
}
