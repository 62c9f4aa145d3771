use bitfile_loader::frame::{Command, Frame};
use bitfile_loader::header::{BitfileHeader, HeaderField, SlotHeader, Timestamp};
use bitfile_loader::operation::OperationEvent;
use bitfile_loader::slot::Slot;

use super::{format_header_lines, header_to_value, DryRunSummary, OperationRecorder};

fn stored_header() -> SlotHeader {
    let ts = Timestamp {
        year: 16,
        month: 9,
        day: 4,
        hour: 13,
        minute: 37,
        second: 5,
    };
    SlotHeader::Stored(BitfileHeader::new(600, "top.rbf", ts, [0xAB; 16]))
}

#[test]
fn json_event_has_schema_and_event() {
    let ev = super::json::operation_event_to_json(OperationEvent::BitfileLoaded {
        name: "top.rbf".to_string(),
        bytes: 600,
        pages: 3,
    });
    let v = serde_json::to_value(&ev).unwrap();
    assert_eq!(v.get("schema").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(v.get("event").and_then(|v| v.as_str()), Some("bitfile_loaded"));
    assert_eq!(v.get("bytes").and_then(|v| v.as_u64()), Some(600));
    assert_eq!(v.get("pages").and_then(|v| v.as_u64()), Some(3));
}

#[test]
fn metadata_event_names_the_field() {
    let ev = super::json::operation_event_to_json(OperationEvent::Metadata {
        field: HeaderField::Digest,
    });
    let v = serde_json::to_value(&ev).unwrap();
    assert_eq!(v.get("field").and_then(|v| v.as_str()), Some("digest"));
}

#[test]
fn header_lines_show_stored_fields() {
    let slot = Slot::new(1).unwrap();
    let lines = format_header_lines(slot, &stored_header());
    assert!(lines[0].contains(" slot 1 "));
    assert!(lines.iter().any(|l| l.ends_with("top.rbf")));
    assert!(lines.iter().any(|l| l.contains("600 bytes")));
    assert!(lines.iter().any(|l| l.contains("16/09/04 - 13:37:05")));
    assert!(lines.iter().any(|l| l.contains(&"ab".repeat(16))));
}

#[test]
fn erased_slot_is_reported_as_erased() {
    let slot = Slot::new(3).unwrap();
    let lines = format_header_lines(slot, &SlotHeader::Empty);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "Bitfile is ERASED");

    let v = header_to_value(slot, &SlotHeader::Empty);
    assert_eq!(v.get("slot").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(v.get("empty").and_then(|v| v.as_bool()), Some(true));
    assert!(v.get("filename").is_none());
}

#[test]
fn recorder_counts_frames_and_pages() {
    let mut rec = OperationRecorder::new("store", Some(2));
    rec.observe(&OperationEvent::Erase { slot: 2 });
    rec.observe(&OperationEvent::AddressSet { address: 0xC0000 });
    for field in [
        HeaderField::Size,
        HeaderField::Filename,
        HeaderField::Timestamp,
        HeaderField::Digest,
    ] {
        rec.observe(&OperationEvent::Metadata { field });
    }
    rec.observe(&OperationEvent::AddressSet { address: 0xC0100 });
    for index in 0..3 {
        rec.observe(&OperationEvent::Page {
            index,
            total: 3,
            address: 0xC0100,
            len: 256,
        });
    }
    rec.observe(&OperationEvent::Done);

    let summary = rec.finish(0, None);
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.pages, 3);
    assert!(!summary.verified);

    let v = serde_json::to_value(super::json::operation_summary_to_json(summary)).unwrap();
    assert_eq!(v.get("ok").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(v.get("slot").and_then(|v| v.as_u64()), Some(2));
}

#[test]
fn dry_run_elides_pages_unless_verbose() {
    let mut frames = vec![Frame::new(Command::EraseSlot, vec![2])];
    frames.extend((0..20).map(|_| Frame::new(Command::WriteData, vec![0; 256])));
    let summary = DryRunSummary {
        slot: 2,
        name: "big.rbf".to_string(),
        bytes: 20 * 256,
        pages: 20,
        frames,
    };

    let short = super::human::dry_run_lines(&summary, false);
    assert!(short.last().is_some_and(|l| l.contains("13 more")));

    let full = super::human::dry_run_lines(&summary, true);
    assert_eq!(full.len(), 3 + 21);
}
