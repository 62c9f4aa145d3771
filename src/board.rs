pub const PREAMBLE: [u8; 3] = [0xAA, 0xBB, 0xCC];

pub const ACK: u8 = 0xDD;
pub const NACK: u8 = 0xEE;
pub const UNKNOWN_COMMAND: u8 = 0xDE;

pub const SLOT_COUNT: u8 = 5;
pub const SLOT_SIZE: u32 = 393_216; // 0x60000
pub const PAGE_SIZE: usize = 256;
pub const MAX_BITFILE_SIZE: usize = SLOT_SIZE as usize - PAGE_SIZE;

// READ takes a single count byte.
pub const READ_CHUNK: usize = 128;

pub const BAUD_RATE: u32 = 115_200;
pub const READ_TIMEOUT_MS: u64 = 10_000;
