use crate::cli;

use bitfile_loader::{
    frame::Frame,
    header::SlotHeader,
    operation::OperationEvent,
    ports::PortInfo,
    slot::Slot,
};

pub mod human;
pub mod json;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub verbose: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct DryRunSummary {
    pub slot: u8,
    pub name: String,
    pub bytes: usize,
    pub pages: usize,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Operation(OperationEvent),
    OperationSummary(OperationSummary),
    DryRun(DryRunSummary),
    ListPorts(Vec<PortInfo>),
    Error { code: i32, message: String },
}

#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub operation: &'static str,
    pub slot: Option<u8>,
    pub exit_code: i32,
    pub message: Option<String>,

    pub frames: u64,
    pub pages: u64,
    pub verified: bool,
}

/// Tallies what an operation did from its events, for the closing summary.
pub struct OperationRecorder {
    operation: &'static str,
    slot: Option<u8>,
    frames: u64,
    pages: u64,
    verified: bool,
}

impl OperationRecorder {
    pub fn new(operation: &'static str, slot: Option<u8>) -> Self {
        Self {
            operation,
            slot,
            frames: 0,
            pages: 0,
            verified: false,
        }
    }

    pub fn observe(&mut self, ev: &OperationEvent) {
        match ev {
            OperationEvent::Page { .. } => {
                self.pages = self.pages.saturating_add(1);
                self.frames = self.frames.saturating_add(1);
            }
            OperationEvent::Erase { .. }
            | OperationEvent::AddressSet { .. }
            | OperationEvent::Metadata { .. }
            | OperationEvent::Configure { .. }
            | OperationEvent::Header { .. } => {
                self.frames = self.frames.saturating_add(1);
            }
            OperationEvent::Verified { .. } => {
                self.verified = true;
            }
            _ => {}
        }
    }

    pub fn finish(self, exit_code: i32, message: Option<String>) -> OperationSummary {
        OperationSummary {
            operation: self.operation,
            slot: self.slot,
            exit_code,
            message,
            frames: self.frames,
            pages: self.pages,
            verified: self.verified,
        }
    }
}

pub trait Reporter {
    fn emit(&mut self, event: Event);
    fn finish(&mut self);
}

fn make(json: bool, opts: OutputOptions) -> Box<dyn Reporter> {
    if json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

pub fn make_for_list(args: &cli::ListArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: false,
        quiet: false,
    };
    make(args.json, opts)
}

pub fn make_for_read(args: &cli::ReadArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        quiet: false,
    };
    make(args.json, opts)
}

pub fn make_for_store(args: &cli::StoreArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        quiet: args.quiet,
    };
    make(args.json, opts)
}

pub fn make_for_delete(args: &cli::DeleteArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        quiet: false,
    };
    make(args.json, opts)
}

pub fn make_for_configure(args: &cli::ConfigureArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.verbose,
        quiet: false,
    };
    make(args.json, opts)
}

pub fn header_to_value(slot: Slot, header: &SlotHeader) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("slot".to_string(), serde_json::Value::from(slot.number()));
    match header {
        SlotHeader::Empty => {
            obj.insert("empty".to_string(), serde_json::Value::from(true));
        }
        SlotHeader::Stored(h) => {
            obj.insert("empty".to_string(), serde_json::Value::from(false));
            obj.insert("filename".to_string(), serde_json::Value::from(h.name()));
            obj.insert("size".to_string(), serde_json::Value::from(h.size));
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::from(h.timestamp.to_string()),
            );
            obj.insert("md5".to_string(), serde_json::Value::from(h.digest_hex()));
        }
    }
    serde_json::Value::Object(obj)
}

pub fn format_header_lines(slot: Slot, header: &SlotHeader) -> Vec<String> {
    let mut lines = vec![format!("{:-^48}", format!(" slot {slot} "))];
    match header {
        SlotHeader::Empty => lines.push("Bitfile is ERASED".to_string()),
        SlotHeader::Stored(h) => {
            lines.push(format!("Filename:      {}", h.name()));
            lines.push(format!("Size:          {} bytes", h.size));
            lines.push(format!("Date and time: {}", h.timestamp));
            lines.push(format!("MD5 checksum:  {}", h.digest_hex()));
        }
    }
    lines
}
