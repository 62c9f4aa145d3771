use crate::header::{HeaderField, SlotHeader};
use crate::slot::Slot;

#[derive(Debug, Clone)]
pub enum OperationEvent {
    PortOpen {
        port: String,
    },
    BitfileLoaded {
        name: String,
        bytes: usize,
        pages: usize,
    },

    Erase {
        slot: u8,
    },
    AddressSet {
        address: u32,
    },
    Metadata {
        field: HeaderField,
    },
    Page {
        index: usize,
        total: usize,
        address: u32,
        len: usize,
    },
    VerifyStart {
        slot: u8,
    },
    Verified {
        slot: u8,
    },
    Configure {
        slot: u8,
    },
    Header {
        slot: Slot,
        header: SlotHeader,
    },
    Done,
}
