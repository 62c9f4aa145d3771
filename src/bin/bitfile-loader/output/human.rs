use std::io::{IsTerminal, Write};

use bitfile_loader::operation::OperationEvent;

use crate::output::{
    format_header_lines, DryRunSummary, Event, OperationSummary, OutputOptions, Reporter,
};

// Erase, address, four header fields, data address, first page.
const HEAD_FRAMES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Quiet,
    Verbose,
    Progress,
}

pub struct HumanOutput {
    opts: OutputOptions,
    is_tty: bool,
    progress_active: bool,
    last_percent: Option<u64>,
}

impl HumanOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self {
            opts,
            is_tty: std::io::stderr().is_terminal(),
            progress_active: false,
            last_percent: None,
        }
    }

    fn mode(&self) -> Mode {
        if self.opts.quiet {
            Mode::Quiet
        } else if self.opts.verbose {
            Mode::Verbose
        } else {
            Mode::Progress
        }
    }

    fn finish_line(&mut self) {
        if self.progress_active {
            eprintln!();
            self.progress_active = false;
        }
    }

    fn println(&mut self, msg: &str) {
        if self.mode() == Mode::Quiet {
            return;
        }
        self.finish_line();
        eprintln!("{msg}");
    }

    fn progress_update(&mut self, percent: u64, i: usize, n: usize, address: u32) {
        if self.mode() != Mode::Progress {
            return;
        }

        if self.is_tty {
            eprint!("\r  writing {percent:3}% ({i}/{n}) @ 0x{address:06X}");
            let _ = std::io::stderr().flush();
            self.progress_active = true;
            self.last_percent = Some(percent);
            return;
        }

        let last = self.last_percent.unwrap_or(0);
        if percent == 0 || percent == 100 || percent >= last + 10 {
            self.last_percent = Some(percent);
            self.println(&format!("  writing {percent:3}% ({i}/{n})"));
        }
    }

    fn on_operation_event(&mut self, ev: OperationEvent) {
        match ev {
            OperationEvent::PortOpen { port } => {
                if self.mode() == Mode::Verbose {
                    self.println(&format!("opened {port}"));
                }
            }
            OperationEvent::BitfileLoaded { name, bytes, pages } => {
                if self.mode() != Mode::Quiet {
                    self.println(&format!("bitfile {name}: {bytes} bytes ({pages} pages)"));
                }
            }
            OperationEvent::Erase { slot } => {
                if self.mode() != Mode::Quiet {
                    self.println(&format!("erasing slot {slot}..."));
                }
                self.last_percent = None;
            }
            OperationEvent::AddressSet { address } => {
                if self.mode() == Mode::Verbose {
                    self.println(&format!("set address 0x{address:06X}"));
                }
            }
            OperationEvent::Metadata { field } => {
                if self.mode() == Mode::Verbose {
                    self.println(&format!("write header {field}"));
                }
            }
            OperationEvent::Page {
                index,
                total,
                address,
                len,
            } => {
                if self.mode() == Mode::Verbose {
                    self.println(&format!(
                        "write page {}/{} @ 0x{address:06X} ({len} bytes)",
                        index + 1,
                        total
                    ));
                } else if self.mode() == Mode::Progress {
                    let percent = ((index + 1) as u64 * 100).saturating_div(total.max(1) as u64);
                    self.progress_update(percent, index + 1, total, address);
                }
            }
            OperationEvent::VerifyStart { slot } => {
                if self.mode() != Mode::Quiet {
                    self.println(&format!("verifying slot {slot}..."));
                }
            }
            OperationEvent::Verified { slot } => {
                if self.mode() != Mode::Quiet {
                    self.println(&format!("slot {slot} matches the bitfile"));
                }
            }
            OperationEvent::Configure { slot } => {
                if self.mode() != Mode::Quiet {
                    self.println(&format!("configuring FPGA from slot {slot}"));
                }
            }
            OperationEvent::Header { slot, header } => {
                for line in format_header_lines(slot, &header) {
                    self.println(&line);
                }
            }
            OperationEvent::Done => self.finish_line(),
        }
    }
}

impl Reporter for HumanOutput {
    fn emit(&mut self, event: Event) {
        match event {
            Event::Operation(ev) => self.on_operation_event(ev),
            Event::OperationSummary(summary) => emit_summary(summary, self),
            Event::DryRun(summary) => emit_dry_run(summary, self),
            Event::ListPorts(ports) => {
                if ports.is_empty() {
                    self.println("No serial ports found");
                }
                for (i, p) in ports.iter().enumerate() {
                    self.println(&format!("[{i}] {}", p.describe()));
                }
            }
            Event::Error { code: _, message } => {
                self.finish_line();
                eprintln!("error: {message}");
            }
        }
    }

    fn finish(&mut self) {
        self.finish_line();
    }
}

fn emit_summary(summary: OperationSummary, out: &mut HumanOutput) {
    if out.mode() != Mode::Verbose || summary.exit_code != 0 {
        return;
    }
    out.println(&format!(
        "{} ok: {} frames, {} pages",
        summary.operation, summary.frames, summary.pages
    ));
}

/// Non-verbose runs list the erase and header frames and elide the pages.
pub(crate) fn dry_run_lines(summary: &DryRunSummary, all_frames: bool) -> Vec<String> {
    let mut lines = vec![
        "Dry run OK".to_string(),
        format!(
            "Bitfile: {} ({} bytes, {} pages) -> slot {}",
            summary.name, summary.bytes, summary.pages, summary.slot
        ),
        format!("Frames: {}", summary.frames.len()),
    ];
    let shown = if all_frames {
        summary.frames.len()
    } else {
        summary.frames.len().min(HEAD_FRAMES)
    };
    for (i, f) in summary.frames.iter().take(shown).enumerate() {
        lines.push(format!("  [{i}] {f}"));
    }
    if shown < summary.frames.len() {
        lines.push(format!("  ... {} more (use --verbose)", summary.frames.len() - shown));
    }
    lines
}

fn emit_dry_run(summary: DryRunSummary, out: &mut HumanOutput) {
    if out.mode() == Mode::Quiet {
        return;
    }
    let all = out.mode() == Mode::Verbose;
    for line in dry_run_lines(&summary, all) {
        out.println(&line);
    }
}
