// src/lib.rs
//! Decoder library for ATSC PSIP tables carried in an MPEG-2 transport
//! stream.
//!
//! Section byte streams are reassembled from 188-byte TS packets by
//! [`psi::SectionAssembler`], validated and routed by [`psi::Demux`] to
//! the subtable decoder registered for their `(table_id, extension)`
//! pair, and published as owned tables through a callback. The Virtual
//! Channel Table decoder lives in [`psi::vct`]:
//!
//! ```
//! use atsc_psip::constants::{ATSC_BASE_PID, TVCT_TABLE_ID};
//! use atsc_psip::psi::{vct, Demux, SectionAssembler};
//!
//! let mut demux = Demux::new();
//! vct::attach(&mut demux, TVCT_TABLE_ID, 0x0001, |table| {
//!     for channel in &table.channels {
//!         println!("{} {}-{}", channel.name(), channel.major_number, channel.minor_number);
//!     }
//! }).unwrap();
//!
//! let mut assembler = SectionAssembler::new(ATSC_BASE_PID);
//! # let ts_packets: Vec<Vec<u8>> = Vec::new();
//! for packet in &ts_packets {
//!     assembler.push_packet(&mut demux, packet);
//! }
//! ```

pub mod constants;
pub mod psi;
