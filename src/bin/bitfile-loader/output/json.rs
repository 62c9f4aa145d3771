use std::collections::BTreeMap;

use bitfile_loader::{operation::OperationEvent, ports::PortInfo};

use crate::output::{
    header_to_value, DryRunSummary, Event, OperationSummary, OutputOptions, Reporter,
};

#[derive(serde::Serialize)]
pub struct JsonEvent {
    schema: u32,
    event: &'static str,
    #[serde(flatten)]
    fields: BTreeMap<&'static str, serde_json::Value>,
}

impl JsonEvent {
    pub fn status(event: &'static str) -> Self {
        Self {
            schema: 1,
            event,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_u64(mut self, k: &'static str, v: u64) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_str(mut self, k: &'static str, v: &str) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_value(mut self, k: &'static str, v: serde_json::Value) -> Self {
        self.fields.insert(k, v);
        self
    }
}

pub struct JsonOutput {
    opts: OutputOptions,
}

impl JsonOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self { opts }
    }

    fn json_event(&mut self, ev: JsonEvent) {
        println!(
            "{}",
            serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string())
        );
    }

    fn error_event(&mut self, code: i32, msg: &str) {
        self.json_event(
            JsonEvent::status("error")
                .with_u64("code", code as u64)
                .with_str("message", msg),
        );

        if self.opts.verbose {
            eprintln!("error: {msg}");
        }
    }
}

impl Reporter for JsonOutput {
    fn emit(&mut self, event: Event) {
        match event {
            Event::Operation(ev) => {
                // Per-page events are noise for scripted callers unless asked for.
                if matches!(ev, OperationEvent::Page { .. }) && !self.opts.verbose {
                    return;
                }
                self.json_event(operation_event_to_json(ev));
            }
            Event::OperationSummary(summary) => {
                self.json_event(operation_summary_to_json(summary));
            }
            Event::DryRun(summary) => self.json_event(dry_run_to_json(summary)),
            Event::ListPorts(ports) => self.json_event(list_to_json(&ports)),
            Event::Error { code, message } => self.error_event(code, &message),
        }
    }

    fn finish(&mut self) {}
}

pub fn list_to_json(ports: &[PortInfo]) -> JsonEvent {
    JsonEvent::status("list")
        .with_u64("count", ports.len() as u64)
        .with_value(
            "ports",
            serde_json::to_value(ports).unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
        )
}

pub fn dry_run_to_json(summary: DryRunSummary) -> JsonEvent {
    JsonEvent::status("dry_run")
        .with_u64("slot", summary.slot as u64)
        .with_str("bitfile", &summary.name)
        .with_u64("bytes", summary.bytes as u64)
        .with_u64("pages", summary.pages as u64)
        .with_value(
            "frames",
            serde_json::Value::Array(
                summary
                    .frames
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "command": f.command.name(),
                            "len": f.payload.len(),
                        })
                    })
                    .collect(),
            ),
        )
}

pub fn operation_summary_to_json(summary: OperationSummary) -> JsonEvent {
    let OperationSummary {
        operation,
        slot,
        exit_code,
        message,
        frames,
        pages,
        verified,
    } = summary;

    let mut ev = JsonEvent::status("operation_summary")
        .with_str("operation", operation)
        .with_u64("ok", if exit_code == 0 { 1 } else { 0 })
        .with_u64("exit_code", exit_code.max(0) as u64)
        .with_u64("frames", frames)
        .with_u64("pages", pages)
        .with_u64("verified", if verified { 1 } else { 0 });

    if let Some(s) = slot {
        ev = ev.with_u64("slot", s as u64);
    }
    if let Some(msg) = &message {
        ev = ev.with_str("message", msg);
    }

    ev
}

pub fn operation_event_to_json(ev: OperationEvent) -> JsonEvent {
    match ev {
        OperationEvent::PortOpen { port } => JsonEvent::status("port_open").with_str("port", &port),
        OperationEvent::BitfileLoaded { name, bytes, pages } => {
            JsonEvent::status("bitfile_loaded")
                .with_str("name", &name)
                .with_u64("bytes", bytes as u64)
                .with_u64("pages", pages as u64)
        }
        OperationEvent::Erase { slot } => JsonEvent::status("erase").with_u64("slot", slot as u64),
        OperationEvent::AddressSet { address } => {
            JsonEvent::status("address_set").with_u64("address", address as u64)
        }
        OperationEvent::Metadata { field } => {
            JsonEvent::status("metadata").with_str("field", &field.to_string())
        }
        OperationEvent::Page {
            index,
            total,
            address,
            len,
        } => JsonEvent::status("page")
            .with_u64("i", index as u64)
            .with_u64("n", total as u64)
            .with_u64("address", address as u64)
            .with_u64("len", len as u64),
        OperationEvent::VerifyStart { slot } => {
            JsonEvent::status("verify_start").with_u64("slot", slot as u64)
        }
        OperationEvent::Verified { slot } => {
            JsonEvent::status("verified").with_u64("slot", slot as u64)
        }
        OperationEvent::Configure { slot } => {
            JsonEvent::status("configure").with_u64("slot", slot as u64)
        }
        OperationEvent::Header { slot, header } => {
            JsonEvent::status("header").with_value("header", header_to_value(slot, &header))
        }
        OperationEvent::Done => JsonEvent::status("done"),
    }
}
