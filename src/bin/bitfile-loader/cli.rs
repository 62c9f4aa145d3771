use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bitfile-loader")]
#[command(about = "Store FPGA bitfiles in configuration flash slots over a serial link")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List serial ports.
    List(ListArgs),

    /// Show the header stored in every slot.
    Read(ReadArgs),

    /// Erase a slot and store a bitfile in it.
    Store(StoreArgs),

    /// Erase a slot.
    Delete(DeleteArgs),

    /// Configure the FPGA from a slot.
    Configure(ConfigureArgs),
}

#[derive(Parser, Clone)]
pub struct LinkArgs {
    /// Serial port of the board (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, short)]
    pub port: Option<String>,

    #[arg(long, default_value_t = bitfile_loader::board::BAUD_RATE)]
    pub baud: u32,

    /// Max time to wait for an acknowledgment or readback.
    #[arg(long, default_value_t = bitfile_loader::board::READ_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Check the trailing byte of every readback.
    #[arg(long)]
    pub strict_readback: bool,
}

#[derive(Parser, Clone)]
pub struct ListArgs {
    /// Emit JSON lines on stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct ReadArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Emit JSON lines on stdout.
    #[arg(long)]
    pub json: bool,

    /// Log every frame.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Parser, Clone)]
pub struct StoreArgs {
    /// Slot number (1-5).
    pub slot: u8,

    /// Bitfile to store.
    pub bitfile: PathBuf,

    #[command(flatten)]
    pub link: LinkArgs,

    /// Read the slot back after writing and compare it with the file.
    #[arg(long)]
    pub verify: bool,

    /// Print the frames that would be sent without opening a port.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit JSON lines on stdout.
    #[arg(long)]
    pub json: bool,

    /// Only print errors.
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print every frame instead of a progress line.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Parser, Clone)]
pub struct DeleteArgs {
    /// Slot number (1-5).
    pub slot: u8,

    #[command(flatten)]
    pub link: LinkArgs,

    /// Do not ask for confirmation.
    #[arg(long, short)]
    pub yes: bool,

    /// Emit JSON lines on stdout.
    #[arg(long)]
    pub json: bool,

    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Parser, Clone)]
pub struct ConfigureArgs {
    /// Slot to configure from. Passed to the board as is.
    pub slot: u8,

    #[command(flatten)]
    pub link: LinkArgs,

    /// Emit JSON lines on stdout.
    #[arg(long)]
    pub json: bool,

    #[arg(long, short)]
    pub verbose: bool,
}
