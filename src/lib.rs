//! Store FPGA bitfiles in the configuration flash slots of an FPGA board and
//! trigger configuration, over the board's serial command link.

pub mod api;
pub mod bitfile;
pub mod board;
pub mod frame;
pub mod header;
pub mod operation;
pub mod ports;
pub mod protocol;
pub mod slot;
pub mod transport;
