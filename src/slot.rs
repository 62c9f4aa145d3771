use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::board;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    #[error("invalid slot {0} (expected 1..={})", board::SLOT_COUNT)]
    OutOfRange(u8),

    #[error("address 0x{0:08X} is not aligned to a {} byte page", board::PAGE_SIZE)]
    Unaligned(u32),
}

/// One of the bitfile positions in configuration flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Slot(u8);

impl Slot {
    pub fn new(number: u8) -> Result<Self, SlotError> {
        if (1..=board::SLOT_COUNT).contains(&number) {
            Ok(Self(number))
        } else {
            Err(SlotError::OutOfRange(number))
        }
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=board::SLOT_COUNT).map(Slot)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// First byte of the slot; the header page lives here.
    pub fn base_address(self) -> u32 {
        u32::from(self.0) * board::SLOT_SIZE
    }

    /// First byte after the header page.
    pub fn data_address(self) -> u32 {
        self.base_address() + board::PAGE_SIZE as u32
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn check_page_aligned(address: u32) -> Result<u32, SlotError> {
    if address % board::PAGE_SIZE as u32 == 0 {
        Ok(address)
    } else {
        Err(SlotError::Unaligned(address))
    }
}
